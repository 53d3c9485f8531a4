//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, ChorusConfig, LogFormat, LogOutput, LoggingConfig, ModulesConfig};
use chorus_framework::ReactionEmoji;

/// Validates the entire configuration.
pub fn validate_config(config: &ChorusConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    validate_bot(&config.bot)?;
    validate_reactions(&config.reactions)?;
    validate_tracker(config)?;
    validate_modules(&config.modules)?;
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }
    Ok(())
}

fn validate_bot(bot: &BotConfig) -> ConfigResult<()> {
    for (field, value) in [
        ("bot.user_id", &bot.user_id),
        ("bot.log_channel", &bot.log_channel),
        ("bot.private_log_channel", &bot.private_log_channel),
    ] {
        if let Some(value) = value
            && value.trim().is_empty()
        {
            return Err(ConfigError::validation(format!("{field} cannot be empty")));
        }
    }

    let replies = &bot.replies;
    if replies.long_reply_threshold == 0 {
        return Err(ConfigError::validation(
            "bot.replies.long_reply_threshold must be greater than 0",
        ));
    }
    if replies.long_reply_preview > replies.long_reply_threshold {
        return Err(ConfigError::validation(
            "bot.replies.long_reply_preview cannot exceed long_reply_threshold",
        ));
    }
    Ok(())
}

fn validate_reactions(reactions: &ReactionEmoji) -> ConfigResult<()> {
    for (key, emoji) in reactions.entries() {
        if emoji.is_empty() {
            return Err(ConfigError::validation(format!(
                "reactions.{key} cannot be empty"
            )));
        }
        if emoji.contains(':') || emoji.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "reactions.{key} must be a bare emoji name, got '{emoji}'"
            )));
        }
    }
    Ok(())
}

fn validate_tracker(config: &ChorusConfig) -> ConfigResult<()> {
    if config.tracker.retention_secs == 0 {
        return Err(ConfigError::validation(
            "tracker.retention_secs must be greater than 0",
        ));
    }
    if config.tracker.sweep_period_secs == 0 {
        return Err(ConfigError::validation(
            "tracker.sweep_period_secs must be greater than 0",
        ));
    }
    if config.bot.edit_delay_ms / 1000 >= config.tracker.retention_secs {
        return Err(ConfigError::validation(
            "bot.edit_delay_ms must be shorter than tracker.retention_secs",
        ));
    }
    Ok(())
}

fn validate_modules(modules: &ModulesConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for id in &modules.disabled {
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid module id in modules.disabled: '{id}'"
            )));
        }
        if !seen.insert(id) {
            return Err(ConfigError::validation(format!(
                "Module '{id}' is listed twice in modules.disabled"
            )));
        }
    }
    for (id, table) in &modules.tables {
        if !table.is_object() {
            return Err(ConfigError::validation(format!(
                "modules.{id} must be a table"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&ChorusConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_emoji() {
        let mut config = ChorusConfig::default();
        config.reactions.denied = String::new();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("reactions.denied"));
    }

    #[test]
    fn test_validate_colon_wrapped_emoji() {
        let mut config = ChorusConfig::default();
        config.reactions.ok = ":thumbsup:".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retention() {
        let mut config = ChorusConfig::default();
        config.tracker.retention_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ChorusConfig::default();
        config.tracker.sweep_period_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_preview_longer_than_threshold() {
        let mut config = ChorusConfig::default();
        config.bot.replies.long_reply_preview = config.bot.replies.long_reply_threshold + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = ChorusConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("chorus.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_duplicate_disabled_module() {
        let mut config = ChorusConfig::default();
        config.modules.disabled = vec!["echo".into(), "echo".into()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_module_table_shape() {
        let mut config = ChorusConfig::default();
        config
            .modules
            .tables
            .insert("factoid".into(), serde_json::json!(3));
        assert!(validate_config(&config).is_err());
    }
}

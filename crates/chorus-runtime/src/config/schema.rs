//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [bot]
//! log_channel = "C0LOG"
//! edit_delay_ms = 350
//!
//! [bot.replies]
//! long_reply_threshold = 400
//!
//! [reactions]
//! ok = "thumbsup"
//!
//! [tracker]
//! retention_secs = 7200
//!
//! [modules]
//! disabled = ["status"]
//!
//! [modules.factoid]
//! max_length = 500
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chorus_core::ChannelId;
use chorus_framework::{EngineSettings, MemoryStore, ReactionEmoji, ReplyLimits};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChorusConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Identity, audit channels and reply rendering.
    #[serde(default)]
    pub bot: BotConfig,

    /// Emoji per command outcome.
    #[serde(default)]
    pub reactions: ReactionEmoji,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub modules: ModulesConfig,
}

impl ChorusConfig {
    /// Engine tunables derived from the `bot`, `reactions` and `tracker` sections.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            log_channel: self.bot.log_channel.as_deref().map(ChannelId::new),
            private_log_channel: self.bot.private_log_channel.as_deref().map(ChannelId::new),
            edit_delay: Duration::from_millis(self.bot.edit_delay_ms),
            retention: Duration::from_secs(self.tracker.retention_secs),
            sweep_period: Duration::from_secs(self.tracker.sweep_period_secs),
            reactions: self.reactions.clone(),
            limits: self.bot.replies.clone(),
        }
    }

    /// A module store seeded with the `modules.<id>` tables.
    pub fn module_store(&self) -> MemoryStore {
        MemoryStore::from_sections(self.modules.tables.clone())
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration, consumed by [`crate::logging::init_from_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global level; `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include source file and line number.
    pub file_location: bool,
    /// Required when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Per-target levels, e.g. `chorus_framework = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
            filters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature; otherwise rejected by validation.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often file output starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

// =============================================================================
// Bot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// The bot's own user id, for transports that cannot discover it.
    pub user_id: Option<String>,
    /// Audit log for commands from public channels.
    pub log_channel: Option<String>,
    /// Log for commands received by direct message.
    pub private_log_channel: Option<String>,
    /// Wait before processing an edit, so the chat service settles.
    pub edit_delay_ms: u64,
    pub replies: ReplyLimits,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            log_channel: None,
            private_log_channel: None,
            edit_delay_ms: 350,
            replies: ReplyLimits::default(),
        }
    }
}

// =============================================================================
// Tracker
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How long command records stay editable.
    pub retention_secs: u64,
    /// How often expired records are swept.
    pub sweep_period_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_secs: 2 * 60 * 60,
            sweep_period_secs: 30 * 60,
        }
    }
}

// =============================================================================
// Modules
// =============================================================================

/// The `modules` section: a `disabled` list plus one table per module id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModulesConfig {
    /// Module ids that are loaded but never enabled.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Per-module settings, keyed by module id.
    #[serde(flatten)]
    pub tables: HashMap<String, Value>,
}

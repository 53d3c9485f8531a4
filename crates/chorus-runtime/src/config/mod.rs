//! Configuration for the Chorus runtime.
//!
//! [`ChorusConfig`] is assembled by [`ConfigLoader`] from built-in defaults,
//! `chorus.toml` / `chorus.yaml` files and `CHORUS_*` environment variables,
//! then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, ChorusConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    ModulesConfig, SpanEventConfig, TrackerConfig,
};
pub use validation::validate_config;

//! Errors raised while loading or checking `chorus.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// The file extension has no enabled format feature.
    #[error("no enabled config format handles .{0} files")]
    UnsupportedFormat(String),

    /// The merged sources could not be extracted into a [`ChorusConfig`](super::ChorusConfig).
    #[error("malformed configuration: {0}")]
    ParseError(String),

    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    #[error("{field} must be set")]
    MissingField { field: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `run` was called a second time; modules are enabled only once.
    #[error("Runtime has already been started")]
    AlreadyStarted,

    /// The shutdown signal handler could not be installed.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

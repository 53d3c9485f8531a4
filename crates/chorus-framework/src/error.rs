//! Error types for the Chorus framework.

use std::any::Any;

use thiserror::Error;

use crate::module::ModuleState;

/// Errors raised when editing the command tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A node with this name already exists at this level.
    #[error("command '{0}' is already registered")]
    Duplicate(String),

    /// Command names must be a single non-empty token.
    #[error("invalid command name '{0}'")]
    InvalidName(String),
}

/// Why a module was degraded or blocked.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// `load` returned an error or panicked.
    #[error("load failed: {0}")]
    Load(String),

    /// `enable` returned an error or panicked.
    #[error("enable failed: {0}")]
    Enable(String),

    /// A declared dependency is not enabled.
    #[error("dependency '{dependency}' is {state}")]
    DependencyNotEnabled {
        dependency: String,
        state: ModuleState,
    },

    /// The module is part of, or depends on, a dependency cycle.
    #[error("dependency cycle among: {0}")]
    Cycle(String),

    /// The configuration lists this module as disabled.
    #[error("disabled by configuration")]
    DisabledByConfig,
}

/// A panic caught at a call boundary, carried as an ordinary error.
#[derive(Debug, Clone, Error)]
#[error("panicked: {message}")]
pub struct Panicked {
    message: String,
}

impl Panicked {
    /// Extracts a printable message from a panic payload.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for command tree edits.
pub type CommandTreeResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_extraction() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 42)).unwrap_err();
        assert_eq!(Panicked::from_payload(payload).message(), "boom 42");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(Panicked::from_payload(payload).message(), "static");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(
            Panicked::from_payload(payload).message(),
            "non-string panic payload"
        );
    }
}

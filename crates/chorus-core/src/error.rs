//! Error types for the Chorus core.
//!
//! Transport failures are reported to callers but are never fatal to the
//! engine: the layers above log them, and reaction failures are tolerated
//! silently.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors returned by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection to the chat service is not available.
    #[error("transport not connected")]
    NotConnected,

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Message edit failed.
    #[error("failed to edit message: {0}")]
    EditFailed(String),

    /// Adding or removing a reaction failed.
    #[error("reaction call failed: {0}")]
    ReactionFailed(String),

    /// The remote API rejected the call.
    #[error("api error '{code}': {message}")]
    Api {
        /// Error code reported by the service.
        code: String,
        /// Human-readable detail.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl TransportError {
    /// Creates an API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Event Errors
// =============================================================================

/// Errors produced while decoding an inbound event.
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload has no `type` field.
    #[error("event has no 'type' field")]
    MissingType,

    /// The payload does not match the shape expected for its type.
    #[error("malformed '{event_type}' event: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for event decoding.
pub type EventResult<T> = Result<T, EventError>;

//! # Chorus Core
//!
//! The data model and transport contract shared by every Chorus crate.
//!
//! - **Identifiers**: [`UserId`], [`ChannelId`], [`MessageTs`], [`MessageId`]
//! - **Events**: [`Event`] decoded from raw transport JSON
//! - **Transport**: the outbound [`Transport`] trait the engine talks to
//!
//! ```text
//! ┌───────────┐  Event   ┌────────────┐  fan-out  ┌──────────┐
//! │ Transport │─────────▶│ Dispatcher │──────────▶│ Listener │
//! │ (extern)  │◀─────────│ (framework)│           └──────────┘
//! └───────────┘  send/   └────────────┘
//!                react
//! ```

pub mod error;
pub mod event;
pub mod ids;
pub mod transport;

pub use error::{EventError, EventResult, TransportError, TransportResult};
pub use event::{
    Event, EventKind, MESSAGE_CHANGED, MESSAGE_EVENT, MessageChangedEvent, MessageEvent,
};
pub use ids::{ChannelId, MessageId, MessageTs, UserId};
pub use transport::{BoxedTransport, Transport};

/// Prelude for common imports.
pub mod prelude {
    pub use super::event::{Event, EventKind, MessageChangedEvent, MessageEvent};
    pub use super::ids::{ChannelId, MessageId, MessageTs, UserId};
    pub use super::transport::{BoxedTransport, Transport};
}

//! Inbound event model.
//!
//! The transport delivers raw JSON events.  [`Event::from_json`] classifies
//! them by their `type`/`subtype` pair into the handful of shapes the engine
//! understands; everything else is preserved verbatim as [`EventKind::Other`]
//! so that modules can still subscribe to it.
//!
//! ```text
//! {"type":"message", "channel":"C1", "user":"U1", "text":"hi", "ts":"1.000001"}
//!     → EventKind::Message
//! {"type":"message", "subtype":"message_changed", "channel":"C1",
//!  "message":{..}, "previous_message":{..}}
//!     → EventKind::MessageChanged
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EventError, EventResult};
use crate::ids::{ChannelId, MessageId, MessageTs, UserId};

/// Event type string of every chat message event.
pub const MESSAGE_EVENT: &str = "message";

/// Subtype used by the transport for edit notifications.
pub const MESSAGE_CHANGED: &str = "message_changed";

// ============================================================================
// Message payloads
// ============================================================================

/// A chat message as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    /// Channel the message was posted in.
    #[serde(default)]
    pub channel: ChannelId,
    /// Author of the message.  Empty for system messages.
    #[serde(default)]
    pub user: UserId,
    /// Raw message text, including mention markup and code fences.
    #[serde(default)]
    pub text: String,
    /// Transport timestamp; together with the channel it identifies the message.
    pub ts: MessageTs,
    /// Message subtype (`bot_message`, `me_message`, ...), absent for normal messages.
    #[serde(default)]
    pub subtype: Option<String>,
    /// Parent timestamp when the message was posted in a thread.
    #[serde(default)]
    pub thread_ts: Option<MessageTs>,
}

impl MessageEvent {
    /// Creates a normal user message.
    pub fn new(
        channel: ChannelId,
        user: UserId,
        ts: MessageTs,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            user,
            text: text.into(),
            ts,
            subtype: None,
            thread_ts: None,
        }
    }

    /// Identity of this message.
    pub fn id(&self) -> MessageId {
        MessageId::new(self.channel.clone(), self.ts.clone())
    }

    /// Returns `true` when the message was posted in a direct-message channel.
    pub fn is_direct(&self) -> bool {
        self.channel.is_direct()
    }
}

/// Edit notification: the transport reports the new and previous versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChangedEvent {
    /// Channel the edited message lives in.
    pub channel: ChannelId,
    /// Timestamp of the notification itself (not of the edited message).
    pub event_ts: MessageTs,
    /// The message after the edit.  Its `ts` is the original message's.
    pub message: MessageEvent,
    /// The message before the edit, when the transport provides it.
    pub previous: Option<MessageEvent>,
}

impl MessageChangedEvent {
    /// Identity of the edited message.
    pub fn message_id(&self) -> MessageId {
        self.message.id()
    }
}

// ============================================================================
// Event
// ============================================================================

/// The decoded shape of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Connection greeting sent once the transport is ready.
    Hello,
    /// A new message (any subtype other than edit notifications).
    Message(MessageEvent),
    /// An edit of an existing message.
    MessageChanged(MessageChangedEvent),
    /// Any other event, preserved as raw JSON.
    Other {
        event_type: String,
        subtype: Option<String>,
        data: Value,
    },
}

/// An inbound event delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self { kind }
    }

    /// Wraps a message in an event.
    pub fn message(message: MessageEvent) -> Self {
        Self::new(EventKind::Message(message))
    }

    /// Wraps an edit notification in an event.
    pub fn message_changed(changed: MessageChangedEvent) -> Self {
        Self::new(EventKind::MessageChanged(changed))
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn into_kind(self) -> EventKind {
        self.kind
    }

    /// The event's `type` string, used for listener filtering.
    pub fn event_type(&self) -> &str {
        match &self.kind {
            EventKind::Hello => "hello",
            EventKind::Message(_) | EventKind::MessageChanged(_) => MESSAGE_EVENT,
            EventKind::Other { event_type, .. } => event_type,
        }
    }

    /// The event's `subtype` string, if any.
    pub fn subtype(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Hello => None,
            EventKind::Message(msg) => msg.subtype.as_deref(),
            EventKind::MessageChanged(_) => Some(MESSAGE_CHANGED),
            EventKind::Other { subtype, .. } => subtype.as_deref(),
        }
    }

    /// Returns the message payload for plain message events.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.kind {
            EventKind::Message(msg) => Some(msg),
            _ => None,
        }
    }

    /// Returns the payload for edit notifications.
    pub fn as_message_changed(&self) -> Option<&MessageChangedEvent> {
        match &self.kind {
            EventKind::MessageChanged(changed) => Some(changed),
            _ => None,
        }
    }

    /// Decodes a raw transport event.
    pub fn from_json(value: Value) -> EventResult<Self> {
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingType)?
            .to_string();
        let subtype = value
            .get("subtype")
            .and_then(Value::as_str)
            .map(str::to_string);

        let malformed = |source| EventError::Malformed {
            event_type: event_type.clone(),
            source,
        };

        let kind = match (event_type.as_str(), subtype.as_deref()) {
            ("hello", _) => EventKind::Hello,
            (MESSAGE_EVENT, Some(MESSAGE_CHANGED)) => {
                let raw: RawMessageChanged = serde_json::from_value(value).map_err(malformed)?;
                EventKind::MessageChanged(raw.into_event())
            }
            (MESSAGE_EVENT, _) => {
                let msg: MessageEvent = serde_json::from_value(value).map_err(malformed)?;
                EventKind::Message(msg)
            }
            _ => EventKind::Other {
                event_type: event_type.clone(),
                subtype,
                data: value,
            },
        };

        Ok(Self::new(kind))
    }
}

/// Wire shape of an edit notification; the nested messages omit the channel.
#[derive(Deserialize)]
struct RawMessageChanged {
    channel: ChannelId,
    ts: MessageTs,
    message: MessageEvent,
    #[serde(default)]
    previous_message: Option<MessageEvent>,
}

impl RawMessageChanged {
    fn into_event(self) -> MessageChangedEvent {
        let mut message = self.message;
        message.channel = self.channel.clone();
        let previous = self.previous_message.map(|mut prev| {
            prev.channel = self.channel.clone();
            prev
        });
        MessageChangedEvent {
            channel: self.channel,
            event_ts: self.ts,
            message,
            previous,
        }
    }
}

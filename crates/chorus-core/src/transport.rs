//! Outbound transport contract.
//!
//! The transport owns the persistent connection to the chat service.  The
//! engine only needs a narrow slice of its API: sending and editing
//! messages, adding and removing reactions, and opening a direct-message
//! conversation.  Inbound events do not flow through this trait; the runtime
//! receives them as a stream and feeds them to the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::ids::{ChannelId, MessageId, UserId};

/// Outbound API of the chat service.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct Console;
///
/// #[async_trait]
/// impl Transport for Console {
///     fn self_id(&self) -> &UserId { &BOT }
///     async fn send_message(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageId> {
///         println!("[{channel}] {text}");
///         Ok(MessageId::new(channel.clone(), MessageTs::from_system_time(SystemTime::now())))
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The bot's own user identity, used to recognise mentions.
    fn self_id(&self) -> &UserId;

    /// Posts `text` to `channel` and returns the identity of the new message.
    async fn send_message(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageId>;

    /// Replaces the text of a message previously sent by the bot.
    async fn edit_message(&self, message: &MessageId, text: &str) -> TransportResult<()>;

    /// Attaches an emoji reaction to a message.
    async fn add_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()>;

    /// Removes an emoji reaction previously added by the bot.
    async fn remove_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()>;

    /// Opens (or returns the existing) direct-message channel with `user`.
    async fn open_direct(&self, user: &UserId) -> TransportResult<ChannelId>;

    /// Returns a permanent link to `message`, used to point private replies
    /// back at the conversation they answer.
    fn archive_link(&self, message: &MessageId) -> String;
}

/// A shared transport trait object.
pub type BoxedTransport = Arc<dyn Transport>;

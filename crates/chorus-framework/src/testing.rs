//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chorus_core::error::TransportResult;
use chorus_core::{ChannelId, MessageId, MessageTs, Transport, TransportError, UserId};
use parking_lot::Mutex;

pub const BOT: &str = "UBOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { channel: ChannelId, text: String, id: MessageId },
    Edit { message: MessageId, text: String },
    AddReaction { message: MessageId, emoji: String },
    RemoveReaction { message: MessageId, emoji: String },
}

/// A transport that records every outbound call.
pub struct MockTransport {
    self_id: UserId,
    calls: Mutex<Vec<Call>>,
    counter: AtomicU64,
    fail_sends: Mutex<bool>,
    fail_reactions: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            self_id: UserId::new(BOT),
            calls: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
            fail_sends: Mutex::new(false),
            fail_reactions: Mutex::new(false),
        }
    }

    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }

    /// Makes reaction calls fail without being recorded.
    pub fn fail_reactions(&self, fail: bool) {
        *self.fail_reactions.lock() = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// `(channel, text)` of every sent message.
    pub fn sends(&self) -> Vec<(ChannelId, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Send { channel, text, .. } => Some((channel.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn sends_to(&self, channel: &str) -> Vec<String> {
        self.sends()
            .into_iter()
            .filter(|(c, _)| c.as_str() == channel)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Edit { message, text } => Some((message.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn reactions_added(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::AddReaction { emoji, .. } => Some(emoji.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reactions_removed(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::RemoveReaction { emoji, .. } => Some(emoji.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn self_id(&self) -> &UserId {
        &self.self_id
    }

    async fn send_message(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageId> {
        if *self.fail_sends.lock() {
            return Err(TransportError::SendFailed("mock failure".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = MessageId::new(channel.clone(), MessageTs::new(format!("900.{n:06}")));
        self.calls.lock().push(Call::Send {
            channel: channel.clone(),
            text: text.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn edit_message(&self, message: &MessageId, text: &str) -> TransportResult<()> {
        self.calls.lock().push(Call::Edit {
            message: message.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()> {
        if *self.fail_reactions.lock() {
            return Err(TransportError::ReactionFailed("mock failure".into()));
        }
        self.calls.lock().push(Call::AddReaction {
            message: message.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()> {
        if *self.fail_reactions.lock() {
            return Err(TransportError::ReactionFailed("mock failure".into()));
        }
        self.calls.lock().push(Call::RemoveReaction {
            message: message.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn open_direct(&self, user: &UserId) -> TransportResult<ChannelId> {
        Ok(ChannelId::new(format!("D{user}")))
    }

    fn archive_link(&self, message: &MessageId) -> String {
        format!(
            "https://chat.example/archives/{}/p{}",
            message.channel,
            message.ts.as_str().replace('.', "")
        )
    }
}

/// Lets spawned fire-and-forget tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

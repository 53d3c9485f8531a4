//! Turning command results into chat messages.
//!
//! Routing happens in two steps.  [`ReplyRouter::plan`] is pure: it resolves
//! the result's destinations and renders the text for each of the four reply
//! slots.  [`ReplyRouter::apply`] then brings the slots a record has already
//! sent in line with a plan, editing in place where a message exists and
//! sending fresh where it does not.
//!
//! ```text
//! CommandResult ──plan──▶ ReplyPlan { channel, private, private_log, log }
//!                              │
//!                        apply │  (send / edit / "(removed)")
//!                              ▼
//!                         SentReplies
//! ```

use chorus_core::{BoxedTransport, ChannelId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::{CommandArguments, CommandResult, CommandSource, ReplyType, ResultCode};

/// Text a reply is rewritten to when its command is undone.
pub const REMOVED_PLACEHOLDER: &str = "(removed)";

/// Length limits applied while rendering replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyLimits {
    /// In-channel replies longer than this (in characters) are cut short and
    /// delivered in full by private message.
    pub long_reply_threshold: usize,
    /// Characters kept in the in-channel preview of a long reply.
    pub long_reply_preview: usize,
    /// Characters of an error's cause shown in channel.
    pub error_preview: usize,
}

impl Default for ReplyLimits {
    fn default() -> Self {
        Self {
            long_reply_threshold: 400,
            long_reply_preview: 300,
            error_preview: 35,
        }
    }
}

/// One of the four places a command's reply can go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplySlot {
    Channel,
    Private,
    PrivateLog,
    Log,
}

impl ReplySlot {
    pub const ALL: [ReplySlot; 4] = [
        ReplySlot::Channel,
        ReplySlot::Private,
        ReplySlot::PrivateLog,
        ReplySlot::Log,
    ];

    fn index(self) -> usize {
        match self {
            ReplySlot::Channel => 0,
            ReplySlot::Private => 1,
            ReplySlot::PrivateLog => 2,
            ReplySlot::Log => 3,
        }
    }
}

/// Rendered text per slot; `None` means nothing goes there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyPlan {
    slots: [Option<String>; 4],
}

impl ReplyPlan {
    pub fn get(&self, slot: ReplySlot) -> Option<&str> {
        self.slots[slot.index()].as_deref()
    }

    fn set(&mut self, slot: ReplySlot, text: String) {
        self.slots[slot.index()] = Some(text);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReplySlot, &str)> {
        ReplySlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|text| (slot, text)))
    }
}

/// A message the bot sent, with the text it currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub message: MessageId,
    pub text: String,
}

/// The reply messages sent for one command record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentReplies {
    slots: [Option<SentReply>; 4],
}

impl SentReplies {
    pub fn get(&self, slot: ReplySlot) -> Option<&SentReply> {
        self.slots[slot.index()].as_ref()
    }

    fn take(&mut self, slot: ReplySlot) -> Option<SentReply> {
        self.slots[slot.index()].take()
    }

    fn put(&mut self, slot: ReplySlot, reply: Option<SentReply>) {
        self.slots[slot.index()] = reply;
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// Renders and delivers command replies.
pub struct ReplyRouter {
    transport: BoxedTransport,
    log_channel: Option<ChannelId>,
    private_log_channel: Option<ChannelId>,
    limits: ReplyLimits,
}

impl ReplyRouter {
    pub fn new(
        transport: BoxedTransport,
        log_channel: Option<ChannelId>,
        private_log_channel: Option<ChannelId>,
        limits: ReplyLimits,
    ) -> Self {
        Self {
            transport,
            log_channel,
            private_log_channel,
            limits,
        }
    }

    // ─── Planning ───────────────────────────────────────────────────

    /// Decides what goes where for `result`.
    pub fn plan(&self, result: &CommandResult, args: &CommandArguments) -> ReplyPlan {
        let source = &args.source;
        let dest = result.destinations();
        let want_channel = dest.contains(ReplyType::IN_CHANNEL);
        let mut want_private = dest.contains(ReplyType::PRIVATE_MESSAGE);
        let want_log = dest.contains(ReplyType::LOG);

        let full = self.render_full(result, args);
        let mut public = full.clone();
        match result.code {
            ResultCode::Error => public = self.error_preview(result),
            ResultCode::Ok | ResultCode::Failure
                if want_channel && full.chars().count() > self.limits.long_reply_threshold =>
            {
                public = format!(
                    "{}… (full reply sent privately)",
                    truncate_chars(&full, self.limits.long_reply_preview)
                );
                want_private = true;
            }
            _ => {}
        }

        let mut plan = ReplyPlan::default();
        if source.is_direct() {
            // Channel and private are the same conversation.
            if (want_channel || want_private) && !full.is_empty() {
                plan.set(ReplySlot::Channel, full.clone());
            }
        } else {
            if want_channel && !public.is_empty() {
                let text = if dest.contains(ReplyType::OMIT_USERNAME_PREFIX) {
                    public
                } else {
                    format!("{}: {public}", source.user.mention())
                };
                plan.set(ReplySlot::Channel, text);
            }
            if want_private && !full.is_empty() {
                let link = self.transport.archive_link(&source.message_id());
                plan.set(ReplySlot::Private, format!("{full}\n(in reply to {link})"));
            }
        }

        if want_log && !full.is_empty() {
            let entry = log_entry(result, args, &full);
            if source.is_direct() {
                if self.private_log_channel.is_some() {
                    plan.set(ReplySlot::PrivateLog, entry);
                }
            } else if self.log_channel.is_some() {
                plan.set(ReplySlot::Log, entry);
            }
        }

        plan
    }

    fn render_full(&self, result: &CommandResult, args: &CommandArguments) -> String {
        match result.code {
            ResultCode::Error => {
                let lead = if result.message.is_empty() {
                    "Sorry, something went wrong while running that command."
                } else {
                    result.message.as_str()
                };
                match result.error_text() {
                    Some(detail) => format!("{lead}\n```\n{detail}\n```"),
                    None => lead.to_string(),
                }
            }
            ResultCode::NoSuchCommand => {
                let mut text = format!(
                    "I didn't quite understand that, sorry.\nYou said: `{}`\nTry `help` for a list of commands.",
                    args.command_line()
                );
                if !result.message.is_empty() {
                    text.push('\n');
                    text.push_str(&result.message);
                }
                text
            }
            _ => result.message.clone(),
        }
    }

    fn error_preview(&self, result: &CommandResult) -> String {
        let cause = result
            .error_text()
            .unwrap_or_else(|| result.message.clone());
        let preview = truncate_chars(&cause, self.limits.error_preview);
        if preview.len() < cause.len() {
            format!("Error: {preview}… (details sent privately)")
        } else {
            format!("Error: {preview}")
        }
    }

    // ─── Delivery ───────────────────────────────────────────────────

    /// Sends every slot of `plan`.
    pub async fn send(&self, plan: &ReplyPlan, source: &CommandSource) -> SentReplies {
        let mut sent = SentReplies::default();
        self.apply(&mut sent, plan, source).await;
        sent
    }

    /// Brings `sent` in line with `plan`.
    ///
    /// Slots with new text are edited in place, slots the plan no longer
    /// uses are rewritten to [`REMOVED_PLACEHOLDER`], and new slots are sent
    /// fresh.  Unchanged slots cost nothing.
    pub async fn apply(&self, sent: &mut SentReplies, plan: &ReplyPlan, source: &CommandSource) {
        for slot in ReplySlot::ALL {
            let next = match (sent.take(slot), plan.get(slot)) {
                (Some(prev), Some(text)) => Some(self.rewrite(prev, text).await),
                (Some(prev), None) => Some(self.rewrite(prev, REMOVED_PLACEHOLDER).await),
                (None, Some(text)) => self.post(slot, source, text).await,
                (None, None) => None,
            };
            sent.put(slot, next);
        }
    }

    /// Rewrites every sent reply to [`REMOVED_PLACEHOLDER`].
    pub async fn remove_all(&self, sent: &mut SentReplies) {
        for slot in ReplySlot::ALL {
            if let Some(prev) = sent.take(slot) {
                let next = self.rewrite(prev, REMOVED_PLACEHOLDER).await;
                sent.put(slot, Some(next));
            }
        }
    }

    /// Sends an untracked private notice to `user`.
    pub async fn notify(&self, user: &UserId, text: &str) {
        let channel = match self.transport.open_direct(user).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to open direct message");
                return;
            }
        };
        if let Err(e) = self.transport.send_message(&channel, text).await {
            warn!(user = %user, error = %e, "Failed to send private notice");
        }
    }

    async fn rewrite(&self, mut prev: SentReply, text: &str) -> SentReply {
        if prev.text == text {
            return prev;
        }
        match self.transport.edit_message(&prev.message, text).await {
            Ok(()) => prev.text = text.to_string(),
            Err(e) => warn!(message = %prev.message, error = %e, "Failed to edit reply"),
        }
        prev
    }

    async fn post(&self, slot: ReplySlot, source: &CommandSource, text: &str) -> Option<SentReply> {
        let channel = match slot {
            ReplySlot::Channel => source.channel.clone(),
            ReplySlot::Log => self.log_channel.clone()?,
            ReplySlot::PrivateLog => self.private_log_channel.clone()?,
            ReplySlot::Private => match self.transport.open_direct(&source.user).await {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(user = %source.user, error = %e, "Failed to open direct message");
                    return None;
                }
            },
        };
        match self.transport.send_message(&channel, text).await {
            Ok(message) => Some(SentReply {
                message,
                text: text.to_string(),
            }),
            Err(e) => {
                warn!(channel = %channel, slot = ?slot, error = %e, "Failed to send reply");
                None
            }
        }
    }
}

fn log_entry(result: &CommandResult, args: &CommandArguments, full: &str) -> String {
    format!(
        "{} in <#{}> ran `{}` ({})\n{full}",
        args.source.user.mention(),
        args.source.channel,
        args.command_line(),
        result.code,
    )
}

/// The longest prefix of `s` with at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

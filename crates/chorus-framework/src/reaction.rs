//! Reactions the bot attaches to command messages.
//!
//! A record stores the reactions it has applied as a [`ReactionSet`].  To
//! move to a new set, [`reconcile`] computes the difference, fires one
//! transport call per change, and replaces the stored set wholesale.  The
//! calls are fire-and-forget: a failed reaction is logged and otherwise
//! ignored.

use chorus_core::{BoxedTransport, MessageId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::ResultCode;

/// An emoji attached to a specific message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reaction {
    pub message: MessageId,
    pub emoji: String,
}

impl Reaction {
    pub fn new(message: MessageId, emoji: impl Into<String>) -> Self {
        Self {
            message,
            emoji: emoji.into(),
        }
    }
}

/// Insertion-ordered set of reactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet {
    items: Vec<Reaction>,
}

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `reaction`.  Returns `false` if it was already present.
    pub fn insert(&mut self, reaction: Reaction) -> bool {
        if self.contains(&reaction) {
            return false;
        }
        self.items.push(reaction);
        true
    }

    pub fn contains(&self, reaction: &Reaction) -> bool {
        self.items.contains(reaction)
    }

    pub fn remove(&mut self, reaction: &Reaction) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r != reaction);
        self.items.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Changes needed to go from `self` to `desired`.
    pub fn diff(&self, desired: &ReactionSet) -> ReactionDiff {
        ReactionDiff {
            remove: self
                .iter()
                .filter(|r| !desired.contains(r))
                .cloned()
                .collect(),
            add: desired
                .iter()
                .filter(|r| !self.contains(r))
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<Reaction> for ReactionSet {
    fn from_iter<I: IntoIterator<Item = Reaction>>(iter: I) -> Self {
        let mut set = ReactionSet::new();
        for reaction in iter {
            set.insert(reaction);
        }
        set
    }
}

/// Removals and additions between two reaction sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionDiff {
    pub remove: Vec<Reaction>,
    pub add: Vec<Reaction>,
}

impl ReactionDiff {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Moves `current` to `desired`, issuing transport calls for the difference.
///
/// Each call runs in its own task; the function returns as soon as they are
/// spawned.  Must be called within a tokio runtime.
pub fn reconcile(
    transport: &BoxedTransport,
    current: &mut ReactionSet,
    desired: ReactionSet,
) -> ReactionDiff {
    let diff = current.diff(&desired);
    for reaction in diff.remove.iter().cloned() {
        let transport = transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport
                .remove_reaction(&reaction.message, &reaction.emoji)
                .await
            {
                debug!(message = %reaction.message, emoji = %reaction.emoji, error = %e, "Failed to remove reaction");
            }
        });
    }
    for reaction in diff.add.iter().cloned() {
        let transport = transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport
                .add_reaction(&reaction.message, &reaction.emoji)
                .await
            {
                debug!(message = %reaction.message, emoji = %reaction.emoji, error = %e, "Failed to add reaction");
            }
        });
    }
    *current = desired;
    diff
}

// ============================================================================
// Emoji table
// ============================================================================

/// Emoji used to acknowledge messages, keyed by outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionEmoji {
    /// Bare mention.
    pub hello: String,
    pub ok: String,
    pub failure: String,
    pub error: String,
    /// No such command.
    pub unknown: String,
    pub usage: String,
    pub help: String,
    /// Refused edit or undo.
    pub denied: String,
}

impl Default for ReactionEmoji {
    fn default() -> Self {
        Self {
            hello: "wave".into(),
            ok: "white_check_mark".into(),
            failure: "no_entry_sign".into(),
            error: "warning".into(),
            unknown: "question".into(),
            usage: "grey_question".into(),
            help: "information_source".into(),
            denied: "x".into(),
        }
    }
}

impl ReactionEmoji {
    pub fn for_code(&self, code: ResultCode) -> &str {
        match code {
            ResultCode::Ok => &self.ok,
            ResultCode::Failure => &self.failure,
            ResultCode::Error => &self.error,
            ResultCode::NoSuchCommand => &self.unknown,
            ResultCode::PrintUsage => &self.usage,
            ResultCode::PrintHelp => &self.help,
        }
    }

    /// Every configured emoji with its key, for validation.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("hello", &self.hello),
            ("ok", &self.ok),
            ("failure", &self.failure),
            ("error", &self.error),
            ("unknown", &self.unknown),
            ("usage", &self.usage),
            ("help", &self.help),
            ("denied", &self.denied),
        ]
    }
}

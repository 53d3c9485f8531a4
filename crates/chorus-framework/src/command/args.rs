use std::collections::VecDeque;

use chorus_core::{ChannelId, MessageId, MessageTs, UserId};

use super::result::CommandResult;

/// Who issued a command, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSource {
    pub user: UserId,
    pub channel: ChannelId,
    /// Timestamp of the triggering message.
    pub ts: MessageTs,
}

impl CommandSource {
    pub fn new(user: UserId, channel: ChannelId, ts: MessageTs) -> Self {
        Self { user, channel, ts }
    }

    /// Identity of the triggering message.
    pub fn message_id(&self) -> MessageId {
        MessageId::new(self.channel.clone(), self.ts.clone())
    }

    pub fn is_direct(&self) -> bool {
        self.channel.is_direct()
    }
}

/// Arguments handed to a command handler.
///
/// The tree pops the command path off the front while resolving, so a leaf
/// sees only its own arguments in [`remaining`](Self::remaining).  The full
/// token vector stays available through [`original`](Self::original).
#[derive(Debug, Clone)]
pub struct CommandArguments {
    pub source: CommandSource,
    remaining: VecDeque<String>,
    original: Vec<String>,
    /// Result of the previous run when this invocation re-runs an edited message.
    pub previous_result: Option<CommandResult>,
    pub is_edit: bool,
    pub is_undo: bool,
}

impl CommandArguments {
    pub fn new(source: CommandSource, args: Vec<String>) -> Self {
        Self {
            source,
            remaining: args.iter().cloned().collect(),
            original: args,
            previous_result: None,
            is_edit: false,
            is_undo: false,
        }
    }

    /// Marks the invocation as a re-run after an edit.
    pub fn edited(mut self, previous: CommandResult) -> Self {
        self.previous_result = Some(previous);
        self.is_edit = true;
        self
    }

    /// Marks the invocation as an undo request.
    pub fn undoing(mut self, previous: CommandResult) -> Self {
        self.previous_result = Some(previous);
        self.is_undo = true;
        self
    }

    /// Removes and returns the next argument.
    pub fn pop(&mut self) -> Option<String> {
        self.remaining.pop_front()
    }

    pub fn peek(&self) -> Option<&str> {
        self.remaining.front().map(String::as_str)
    }

    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.remaining.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// The remaining arguments joined by single spaces.
    pub fn rest(&self) -> String {
        self.remaining().collect::<Vec<_>>().join(" ")
    }

    /// All tokens as parsed, including the ones already popped.
    pub fn original(&self) -> &[String] {
        &self.original
    }

    /// The tokens popped so far (the resolved command path, for a leaf).
    pub fn consumed(&self) -> &[String] {
        &self.original[..self.original.len() - self.remaining.len()]
    }

    /// The original command line, re-joined.
    pub fn command_line(&self) -> String {
        self.original.join(" ")
    }
}

use chorus_core::{MessageEvent, MessageId};

use crate::command::{CommandArguments, CommandResult, CommandSource};
use crate::mention::ParseOutcome;
use crate::reaction::ReactionSet;
use crate::reply::SentReplies;

/// Where a tracked message is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Recorded, not yet run.
    Pending,
    /// A wave; acknowledged with a reaction only.
    Acknowledged,
    Executed,
    /// Re-run after an edit.
    Edited,
    /// Undone after the message stopped being a command.
    Reverted,
    /// An undo was refused.
    UndoFailed,
}

/// Everything the tracker keeps about one command message.
#[derive(Debug, Clone)]
pub struct FinishedCommand {
    pub original: MessageEvent,
    pub latest_edit: Option<MessageEvent>,
    /// Parse of the text the current result belongs to.
    pub parsed: ParseOutcome,
    pub command_found: bool,
    pub args: Option<CommandArguments>,
    pub result: Option<CommandResult>,
    /// Set once an undo was refused, so later edits stay quiet.
    pub undo_failed: bool,
    pub reactions: ReactionSet,
    pub replies: SentReplies,
    pub state: RecordState,
}

impl FinishedCommand {
    pub fn new(original: MessageEvent, parsed: ParseOutcome) -> Self {
        Self {
            original,
            latest_edit: None,
            parsed,
            command_found: false,
            args: None,
            result: None,
            undo_failed: false,
            reactions: ReactionSet::new(),
            replies: SentReplies::default(),
            state: RecordState::Pending,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.original.id()
    }

    pub fn source(&self) -> CommandSource {
        CommandSource::new(
            self.original.user.clone(),
            self.original.channel.clone(),
            self.original.ts.clone(),
        )
    }

    /// The command line of the current result, for notices.
    pub fn command_line(&self) -> String {
        self.args
            .as_ref()
            .map(CommandArguments::command_line)
            .unwrap_or_default()
    }
}

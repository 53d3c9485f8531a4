//! Command outcomes and the policy attached to them.
//!
//! Every handler returns a [`CommandResult`].  Its [`ResultCode`] decides the
//! default reply destinations and whether later edits or an undo of the
//! triggering message are honoured; the result may widen the destinations
//! and override both permissions.
//!
//! | Code            | Default replies  | Edit  | Undo   |
//! |-----------------|------------------|-------|--------|
//! | `Ok`            | in channel       | deny  | deny   |
//! | `Failure`       | in channel + log | allow | simple |
//! | `Error`         | in channel + log | deny  | deny   |
//! | `NoSuchCommand` | private + log    | allow | simple |
//! | `PrintUsage`    | private          | allow | simple |
//! | `PrintHelp`     | in channel       | allow | simple |

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

/// Outcome category of a command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// The command did what was asked.
    Ok,
    /// The command ran but could not do what was asked (bad input, missing data).
    Failure,
    /// The command hit an internal error or panicked.
    Error,
    /// No command matched the arguments.
    NoSuchCommand,
    /// The arguments did not fit the command; the message is its usage string.
    PrintUsage,
    /// The user asked for help; the message is the help text.
    PrintHelp,
}

impl ResultCode {
    /// Destinations used when the result does not ask for more.
    pub fn default_reply(self) -> ReplyType {
        match self {
            Self::Ok | Self::PrintHelp => ReplyType::IN_CHANNEL,
            Self::Failure | Self::Error => ReplyType::IN_CHANNEL | ReplyType::LOG,
            Self::NoSuchCommand => ReplyType::PRIVATE_MESSAGE | ReplyType::LOG,
            Self::PrintUsage => ReplyType::PRIVATE_MESSAGE,
        }
    }

    /// Whether an edit of the triggering message may re-run the command.
    pub fn default_can_edit(self) -> bool {
        !matches!(self, Self::Ok | Self::Error)
    }

    /// How an undo of the triggering message is handled by default.
    pub fn default_undo(self) -> UndoAction {
        match self {
            Self::Ok | Self::Error => UndoAction::Deny,
            _ => UndoAction::Simple,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::NoSuchCommand => "no-such-command",
            Self::PrintUsage => "usage",
            Self::PrintHelp => "help",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of reply destinations, plus the username-prefix flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReplyType(u8);

impl ReplyType {
    pub const NONE: Self = Self(0);
    /// A private message to the command's author.
    pub const PRIVATE_MESSAGE: Self = Self(1);
    /// A reply in the channel the command came from.
    pub const IN_CHANNEL: Self = Self(1 << 1);
    /// An entry in the configured log channel.
    pub const LOG: Self = Self(1 << 2);
    /// Do not prefix the in-channel reply with the author's mention.
    pub const OMIT_USERNAME_PREFIX: Self = Self(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ReplyType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ReplyType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ReplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ReplyType, &str); 4] = [
            (ReplyType::PRIVATE_MESSAGE, "PRIVATE_MESSAGE"),
            (ReplyType::IN_CHANNEL, "IN_CHANNEL"),
            (ReplyType::LOG, "LOG"),
            (ReplyType::OMIT_USERNAME_PREFIX, "OMIT_USERNAME_PREFIX"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("ReplyType(NONE)")
        } else {
            write!(f, "ReplyType({})", set.join(" | "))
        }
    }
}

/// Per-result override of a default permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Use the default for the result code.
    #[default]
    Default,
    Allow,
    Deny,
}

/// How an undo request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    /// Refuse the undo and tell the user.
    Deny,
    /// Remove the acknowledgement reactions and blank the replies.
    Simple,
    /// Ask the command's own undo handler to compensate first.
    Custom,
}

/// What a command handler reports back to the engine.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub code: ResultCode,
    /// Human-readable reply text.
    pub message: String,
    /// Underlying error for [`ResultCode::Error`].
    pub error: Option<Arc<anyhow::Error>>,
    /// Destinations requested on top of the code's defaults.
    pub reply: ReplyType,
    pub can_edit: Permission,
    pub can_undo: Permission,
}

impl CommandResult {
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            error: None,
            reply: ReplyType::NONE,
            can_edit: Permission::Default,
            can_undo: Permission::Default,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Ok, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Failure, message)
    }

    /// An internal error; the error's display chain is reported to the user.
    pub fn error(error: impl Into<anyhow::Error>) -> Self {
        let mut result = Self::new(ResultCode::Error, String::new());
        result.error = Some(Arc::new(error.into()));
        result
    }

    /// An internal error with a custom lead-in message.
    pub fn error_with(message: impl Into<String>, error: impl Into<anyhow::Error>) -> Self {
        let mut result = Self::error(error);
        result.message = message.into();
        result
    }

    pub fn no_such_command() -> Self {
        Self::new(ResultCode::NoSuchCommand, String::new())
    }

    pub fn usage(usage: impl Into<String>) -> Self {
        Self::new(ResultCode::PrintUsage, usage)
    }

    pub fn help(text: impl Into<String>) -> Self {
        Self::new(ResultCode::PrintHelp, text)
    }

    /// Adds destinations to the code's defaults.
    pub fn with_reply(mut self, reply: ReplyType) -> Self {
        self.reply |= reply;
        self
    }

    /// Sends the in-channel reply without the `@user:` prefix.
    pub fn omit_username(self) -> Self {
        self.with_reply(ReplyType::OMIT_USERNAME_PREFIX)
    }

    pub fn with_edit(mut self, permission: Permission) -> Self {
        self.can_edit = permission;
        self
    }

    pub fn with_undo(mut self, permission: Permission) -> Self {
        self.can_undo = permission;
        self
    }

    /// Effective destinations: code defaults plus requested extras.
    pub fn destinations(&self) -> ReplyType {
        self.code.default_reply() | self.reply
    }

    /// Whether a later edit of the triggering message may re-run the command.
    pub fn edit_allowed(&self) -> bool {
        match self.can_edit {
            Permission::Default => self.code.default_can_edit(),
            Permission::Allow => true,
            Permission::Deny => false,
        }
    }

    /// How an undo of the triggering message is handled.
    ///
    /// An explicit allow delegates to the command's own undo handler.
    pub fn undo_action(&self) -> UndoAction {
        match self.can_undo {
            Permission::Default => self.code.default_undo(),
            Permission::Allow => UndoAction::Custom,
            Permission::Deny => UndoAction::Deny,
        }
    }

    /// The error chain rendered on one line, if any.
    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|e| format!("{e:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_destinations() {
        assert_eq!(CommandResult::ok("x").destinations(), ReplyType::IN_CHANNEL);
        assert_eq!(
            CommandResult::no_such_command().destinations(),
            ReplyType::PRIVATE_MESSAGE | ReplyType::LOG
        );
        assert_eq!(
            CommandResult::error(anyhow::anyhow!("x")).destinations(),
            ReplyType::IN_CHANNEL | ReplyType::LOG
        );
        assert_eq!(
            CommandResult::usage("u").destinations(),
            ReplyType::PRIVATE_MESSAGE
        );
    }

    #[test]
    fn test_extra_destinations_are_additive() {
        let result = CommandResult::ok("x")
            .with_reply(ReplyType::LOG)
            .omit_username();
        let dest = result.destinations();
        assert!(dest.contains(ReplyType::IN_CHANNEL));
        assert!(dest.contains(ReplyType::LOG));
        assert!(dest.contains(ReplyType::OMIT_USERNAME_PREFIX));
        assert!(!dest.contains(ReplyType::PRIVATE_MESSAGE));
    }

    #[test]
    fn test_edit_permissions() {
        assert!(!CommandResult::ok("x").edit_allowed());
        assert!(CommandResult::failure("x").edit_allowed());
        assert!(CommandResult::no_such_command().edit_allowed());
        assert!(!CommandResult::error(anyhow::anyhow!("x")).edit_allowed());
        assert!(CommandResult::ok("x").with_edit(Permission::Allow).edit_allowed());
        assert!(!CommandResult::usage("x").with_edit(Permission::Deny).edit_allowed());
    }

    #[test]
    fn test_undo_actions() {
        assert_eq!(CommandResult::ok("x").undo_action(), UndoAction::Deny);
        assert_eq!(CommandResult::help("x").undo_action(), UndoAction::Simple);
        assert_eq!(
            CommandResult::error(anyhow::anyhow!("x")).undo_action(),
            UndoAction::Deny
        );
        assert_eq!(
            CommandResult::failure("x").with_undo(Permission::Allow).undo_action(),
            UndoAction::Custom
        );
        assert_eq!(
            CommandResult::ok("x").with_undo(Permission::Allow).undo_action(),
            UndoAction::Custom
        );
        assert_eq!(
            CommandResult::failure("x").with_undo(Permission::Deny).undo_action(),
            UndoAction::Deny
        );
    }

    #[test]
    fn test_error_text_includes_chain() {
        let err = anyhow::anyhow!("disk full").context("saving factoid");
        let result = CommandResult::error(err);
        assert_eq!(result.error_text().unwrap(), "saving factoid: disk full");
    }

    #[test]
    fn test_reply_type_debug() {
        assert_eq!(format!("{:?}", ReplyType::NONE), "ReplyType(NONE)");
        assert_eq!(
            format!("{:?}", ReplyType::IN_CHANNEL | ReplyType::LOG),
            "ReplyType(IN_CHANNEL | LOG)"
        );
    }
}

//! Commands: arguments, results and the command tree.

mod args;
mod result;
mod tree;

pub use args::{CommandArguments, CommandSource};
pub use result::{CommandResult, Permission, ReplyType, ResultCode, UndoAction};
pub use tree::{Command, CommandHandler, CommandTree, HELP_COMMAND};

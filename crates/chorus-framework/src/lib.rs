//! # Chorus Framework
//!
//! The command processing engine of the Chorus chat bot.
//!
//! This layer provides:
//! - Event fan-out to listeners, each in its own panic-guarded task
//! - Modules with dependency-ordered lifecycle and typed capability slots
//! - A hierarchical command tree with help listings
//! - Mention parsing with code-block references
//! - Reply routing to channel, private message and log channels
//! - Edit and undo tracking of command messages
//!
//! [`Engine`] composes these into the message-listening service; the
//! `chorus-runtime` crate adds configuration, logging and the event pump.

pub mod command;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod layer;
pub mod mention;
pub mod module;
pub mod reaction;
pub mod reply;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use command::{
    Command, CommandArguments, CommandHandler, CommandResult, CommandSource, CommandTree,
    Permission, ReplyType, ResultCode, UndoAction,
};
pub use dispatcher::{BoxedListener, EventDispatcher, EventFilter, SubtypeFilter};
pub use engine::{ENGINE_OWNER, Engine, EngineSettings};
pub use error::{CommandError, CommandTreeResult, ModuleError, Panicked};
pub use layer::{CatchPanicLayer, CatchPanicService};
pub use mention::{ParseError, ParseOutcome, ParsedCommand, parse_message};
pub use module::{
    ConfigStore, DependStatus, LoadContext, MemoryStore, Module, ModuleConfig, ModuleContext,
    ModuleEnv, ModuleManager, ModuleRegistry, ModuleSlot, ModuleState, ModuleStatus,
};
pub use reaction::{Reaction, ReactionEmoji, ReactionSet};
pub use reply::{ReplyLimits, ReplyRouter};
pub use tracker::{EditTracker, FinishedCommand, RecordState, TrackerSettings};

/// Prelude for module authors.
pub mod prelude {
    pub use crate::command::{
        Command, CommandArguments, CommandResult, CommandTree, Permission, ReplyType, ResultCode,
    };
    pub use crate::dispatcher::EventFilter;
    pub use crate::module::{
        DependStatus, LoadContext, Module, ModuleConfig, ModuleContext, ModuleRegistry, ModuleSlot,
    };
    pub use async_trait::async_trait;
}

//! # Chorus
//!
//! A modular chat bot engine.  Users address the bot with a mention
//! (`@bot remember lunch noon`), modules contribute commands to a shared
//! tree, and the bot keeps watching each command message: editing it re-runs
//! the command, and deleting the command text undoes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐ events ┌────────────────┐     ┌──────────────────────────┐
//! │ Transport │───────▶│ ChorusRuntime  │────▶│ EventDispatcher          │
//! │ (yours)   │        │ (event pump)   │     │  ├─ EditTracker ──▶ tree │
//! └───────────┘        └────────────────┘     │  └─ module listeners     │
//!       ▲                                      └────────────┬─────────────┘
//!       └────────────── replies, reactions ─────────────────┘
//! ```
//!
//! - **Transport**: your chat service client, implementing [`core::Transport`]
//! - **Modules**: units of functionality with dependencies and capabilities
//! - **Commands**: async handlers in a hierarchical tree with help listings
//! - **Tracker**: correlates edits with earlier commands within a retention window
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chorus::prelude::*;
//!
//! #[derive(Default)]
//! struct Ping;
//!
//! #[async_trait]
//! impl Module for Ping {
//!     fn identifier(&self) -> &str { "ping" }
//!
//!     async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
//!         ctx.register_command("ping", Command::new("Replies with pong.", |_args| async {
//!             Ok(CommandResult::ok("pong"))
//!         }))?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(MyTransport::connect().await?);
//!     let runtime = ChorusRuntime::builder()
//!         .modules(|registry| {
//!             registry.register_default::<Ping>();
//!         })
//!         .build(transport.clone())?;
//!     runtime.run(transport.events()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `builtin`: echo, factoid and status modules (default)
//! - `toml-config`: `chorus.toml` configuration files (default)
//! - `yaml-config`: `chorus.yaml` configuration files
//! - `json-log`: JSON log output

pub use chorus_core as core;
pub use chorus_framework as framework;
pub use chorus_runtime as runtime;

#[cfg(feature = "builtin")]
pub use chorus_framework::module::builtin::register_builtin;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use chorus::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use chorus_runtime::{ChorusConfig, ChorusRuntime};

    // Transport contract and identifiers
    pub use chorus_core::{
        BoxedTransport, ChannelId, Event, MessageEvent, MessageId, MessageTs, Transport,
        TransportError, TransportResult, UserId,
    };

    // Modules and commands
    pub use chorus_framework::prelude::*;

    #[cfg(feature = "builtin")]
    pub use chorus_framework::module::builtin::register_builtin;
}

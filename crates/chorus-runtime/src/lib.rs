//! Chorus Runtime - the process around the command engine.
//!
//! This crate provides:
//! - Configuration loading from files and `CHORUS_*` variables (`config`)
//! - Logging setup over `tracing-subscriber` (`logging`)
//! - The event pump and signal handling (`ChorusRuntime`)
//!
//! ```ignore
//! use chorus_runtime::ChorusRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(MyTransport::connect().await?);
//!     let runtime = ChorusRuntime::builder()
//!         .modules(|registry| {
//!             register_builtin(registry);
//!         })
//!         .build(transport.clone())?;
//!
//!     // Run until Ctrl+C or until the transport's event stream closes.
//!     runtime.run(transport.events()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ChorusConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ChorusRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the logging macros (`trace!` to `error!`), `span`,
/// `instrument` and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

//! Built-in modules shipped with Chorus.
//!
//! Enabled by the `builtin` feature flag (on by default).
//!
//! | Module | Identifier | Commands |
//! |--------|------------|----------|
//! | [`EchoModule`] | `"echo"` | `echo` |
//! | [`FactoidModule`] | `"factoid"` | `remember`, `recall`, `forget` |
//! | [`StatusModule`] | `"status"` | `modules` |
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! register_builtin(&mut registry);
//! ```

mod echo;
mod factoid;
mod status;

pub use echo::EchoModule;
pub use factoid::{FACTOID_MODULE_ID, FactoidApi, FactoidError, FactoidModule, FactoidStore};
pub use status::StatusModule;

use super::ModuleRegistry;

/// Adds every built-in module to `registry`.
pub fn register_builtin(registry: &mut ModuleRegistry) -> &mut ModuleRegistry {
    registry
        .register_default::<EchoModule>()
        .register_default::<FactoidModule>()
        .register_default::<StatusModule>()
}

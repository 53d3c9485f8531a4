//! Modules: units of bot functionality with a managed lifecycle.
//!
//! A module is constructed from a [`ModuleRegistry`], declares its
//! dependencies in [`Module::load`], and registers commands and listeners in
//! [`Module::enable`].  The [`ModuleManager`] runs these passes in dependency
//! order and patches [`ModuleSlot`]s as modules come and go.

#[cfg(feature = "builtin")]
pub mod builtin;
mod config;
mod lifecycle;
mod manager;
mod registry;
mod slot;

pub use config::{ConfigStore, MemoryStore, ModuleConfig};
pub use lifecycle::{
    DependStatus, LoadContext, Module, ModuleContext, ModuleEnv, ModuleState, ModuleStatus,
};
pub use manager::ModuleManager;
pub use registry::ModuleRegistry;
pub use slot::{Capabilities, CapabilityArc, ModuleSlot};

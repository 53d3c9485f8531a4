//! Named snippets of text users can store and recall.
//!
//! Factoids live in the module's configuration namespace under
//! `fact.<lowercased name>`.  Other modules reach them through the
//! [`FactoidApi`] capability:
//!
//! ```rust,ignore
//! struct Greeter { factoids: ModuleSlot<dyn FactoidApi> }
//!
//! async fn load(&self, ctx: &LoadContext<'_>) -> anyhow::Result<()> {
//!     ctx.depend_module(FACTOID_MODULE_ID, &self.factoids);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [modules.factoid]
//! max_length = 2000
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{Command, CommandArguments, CommandResult, Permission};
use crate::module::{LoadContext, Module, ModuleConfig, ModuleContext};

pub const FACTOID_MODULE_ID: &str = "factoid";

const KEY_PREFIX: &str = "fact.";
const LEGACY_KEY: &str = "factoids";
const DEFAULT_MAX_LENGTH: usize = 2000;

#[derive(Debug, Error)]
pub enum FactoidError {
    #[error("factoid names must be a single word")]
    InvalidName,

    #[error("that is {len} characters long; factoids are limited to {max}")]
    TooLong { len: usize, max: usize },

    #[error("failed to store factoid: {0}")]
    Storage(#[from] serde_json::Error),
}

// ─── FactoidApi trait ───────────────────────────────────────────────────────

/// Capability published by the factoid module.
pub trait FactoidApi: Send + Sync + 'static {
    fn lookup(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`.  Returns the value it replaced.
    fn remember(&self, name: &str, value: &str) -> Result<Option<String>, FactoidError>;

    /// Deletes `name`.  Returns the value it had.
    fn forget(&self, name: &str) -> Option<String>;

    /// Every stored name, sorted.
    fn names(&self) -> Vec<String>;
}

// ─── FactoidStore ───────────────────────────────────────────────────────────

/// [`FactoidApi`] backed by a [`ModuleConfig`].
pub struct FactoidStore {
    config: ModuleConfig,
    /// Forgotten factoids, kept so `forget` can be undone.
    trash: Mutex<HashMap<String, String>>,
}

impl FactoidStore {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config: config.with_default("max_length", DEFAULT_MAX_LENGTH),
            trash: Mutex::new(HashMap::new()),
        }
    }

    fn key(name: &str) -> Result<String, FactoidError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(FactoidError::InvalidName);
        }
        Ok(format!("{KEY_PREFIX}{}", name.to_lowercase()))
    }

    pub fn max_length(&self) -> usize {
        match self.config.get_as::<usize>("max_length") {
            Ok(Some(max)) => max,
            Ok(None) => DEFAULT_MAX_LENGTH,
            Err(e) => {
                warn!(error = %e, "Invalid factoid max_length; using default");
                DEFAULT_MAX_LENGTH
            }
        }
    }

    /// Puts back the last value `forget` removed for `name`.
    pub fn restore(&self, name: &str) -> Result<bool, FactoidError> {
        let key = Self::key(name)?;
        let Some(value) = self.trash.lock().remove(&key) else {
            return Ok(false);
        };
        self.config.set(&key, value)?;
        Ok(true)
    }
}

impl FactoidApi for FactoidStore {
    fn lookup(&self, name: &str) -> Option<String> {
        let key = Self::key(name).ok()?;
        match self.config.get(&key)? {
            Value::String(value) => Some(value),
            other => {
                warn!(factoid = %name, value = %other, "Stored factoid is not text");
                None
            }
        }
    }

    fn remember(&self, name: &str, value: &str) -> Result<Option<String>, FactoidError> {
        let key = Self::key(name)?;
        let max = self.max_length();
        let len = value.chars().count();
        if len > max {
            return Err(FactoidError::TooLong { len, max });
        }
        let previous = self.lookup(name);
        self.config.set(&key, value)?;
        Ok(previous)
    }

    fn forget(&self, name: &str) -> Option<String> {
        let key = Self::key(name).ok()?;
        let value = self.lookup(name)?;
        self.config.remove(&key);
        self.trash.lock().insert(key, value.clone());
        Some(value)
    }

    fn names(&self) -> Vec<String> {
        self.config
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect()
    }
}

/// Moves factoids stored under the old single `factoids` table to one key each.
fn migrate_legacy_table(config: &ModuleConfig) -> anyhow::Result<()> {
    let Some(legacy) = config.get(LEGACY_KEY) else {
        return Ok(());
    };
    let Value::Object(entries) = legacy else {
        anyhow::bail!("`{LEGACY_KEY}` is not a table");
    };
    for (name, value) in entries {
        config.set(&format!("{KEY_PREFIX}{}", name.to_lowercase()), value)?;
    }
    config.remove(LEGACY_KEY);
    Ok(())
}

// ─── Commands ───────────────────────────────────────────────────────────────

async fn remember(store: Arc<FactoidStore>, mut args: CommandArguments) -> anyhow::Result<CommandResult> {
    let Some(name) = args.pop() else {
        return Ok(CommandResult::usage("Usage: `remember <name> <text>`"));
    };
    if args.is_empty() {
        return Ok(CommandResult::usage("Usage: `remember <name> <text>`"));
    }
    match store.remember(&name, &args.rest()) {
        Ok(None) => Ok(CommandResult::ok(format!("OK, I'll remember `{name}`."))),
        Ok(Some(_)) => Ok(CommandResult::ok(format!("OK, `{name}` is updated."))),
        Err(e @ (FactoidError::InvalidName | FactoidError::TooLong { .. })) => {
            Ok(CommandResult::failure(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn recall(store: Arc<FactoidStore>, mut args: CommandArguments) -> anyhow::Result<CommandResult> {
    let Some(name) = args.pop() else {
        return Ok(CommandResult::usage("Usage: `recall <name>`"));
    };
    Ok(match store.lookup(&name) {
        Some(value) => CommandResult::ok(value),
        None => CommandResult::failure(format!("I don't know anything about `{name}`.")),
    })
}

async fn forget(store: Arc<FactoidStore>, mut args: CommandArguments) -> anyhow::Result<CommandResult> {
    let Some(name) = args.pop() else {
        return Ok(CommandResult::usage("Usage: `forget <name>`"));
    };
    Ok(match store.forget(&name) {
        Some(_) => {
            debug!(factoid = %name, "Factoid forgotten");
            CommandResult::ok(format!("OK, I forgot `{name}`.")).with_undo(Permission::Allow)
        }
        None => CommandResult::failure(format!("I don't know anything about `{name}`.")),
    })
}

async fn undo_forget(store: Arc<FactoidStore>, mut args: CommandArguments) -> anyhow::Result<CommandResult> {
    let Some(name) = args.pop() else {
        return Ok(CommandResult::failure("Nothing to restore."));
    };
    Ok(if store.restore(&name)? {
        CommandResult::ok(format!("Restored `{name}`."))
    } else {
        CommandResult::failure(format!("`{name}` cannot be restored any more."))
    })
}

/// Binds a store to a command function.
fn with_store<F, Fut>(
    store: &Arc<FactoidStore>,
    f: F,
) -> impl Fn(CommandArguments) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<FactoidStore>, CommandArguments) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<CommandResult>> + Send + 'static,
{
    let store = Arc::clone(store);
    move |args: CommandArguments| f(Arc::clone(&store), args)
}

// ─── Module ─────────────────────────────────────────────────────────────────

/// Provides `remember`, `recall` and `forget`.
#[derive(Default)]
pub struct FactoidModule {
    store: OnceLock<Arc<FactoidStore>>,
}

impl FactoidModule {
    pub fn store(&self) -> Option<&Arc<FactoidStore>> {
        self.store.get()
    }
}

#[async_trait]
impl Module for FactoidModule {
    fn identifier(&self) -> &str {
        FACTOID_MODULE_ID
    }

    async fn load(&self, ctx: &LoadContext<'_>) -> anyhow::Result<()> {
        let config = ctx.module_config();
        config.apply_migration(1, migrate_legacy_table)?;

        let store = self
            .store
            .get_or_init(|| Arc::new(FactoidStore::new(config)));
        ctx.provide::<dyn FactoidApi>(store.clone());
        Ok(())
    }

    async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        let Some(store) = self.store.get() else {
            anyhow::bail!("factoid store was not loaded");
        };
        ctx.register_command(
            "remember",
            Command::new("Remembers a fact: `remember <name> <text>`.", with_store(store, remember)),
        )?;
        ctx.register_command(
            "recall",
            Command::new("Recalls a fact: `recall <name>`.", with_store(store, recall)),
        )?;
        ctx.register_command(
            "forget",
            Command::new("Forgets a fact: `forget <name>`.", with_store(store, forget))
                .with_undo(with_store(store, undo_forget)),
        )?;
        Ok(())
    }
}

//! Per-module configuration storage.
//!
//! The engine persists module settings through the [`ConfigStore`] trait.
//! [`MemoryStore`] keeps everything in memory and is seeded from the
//! `modules.<id>` tables of the runtime configuration file.  Modules see
//! their own namespace through [`ModuleConfig`], which layers declared
//! defaults over the store and runs one-shot migrations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Raw key/value storage, namespaced by module identifier.
pub trait ConfigStore: Send + Sync + 'static {
    fn get(&self, module: &str, key: &str) -> Option<Value>;

    fn set(&self, module: &str, key: &str, value: Value);

    fn remove(&self, module: &str, key: &str) -> Option<Value>;

    /// Keys stored for `module`, sorted.
    fn keys(&self, module: &str) -> Vec<String>;

    /// Records that migration `version` of `module` is running.
    ///
    /// Returns `false` if it was already recorded, in which case the caller
    /// must not run it.
    fn claim_migration(&self, module: &str, version: u32) -> bool;

    /// Forgets a claim whose migration failed, so it is retried next time.
    fn release_migration(&self, module: &str, version: u32);
}

/// In-memory [`ConfigStore`].
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Map<String, Value>>>,
    migrations: Mutex<HashSet<(String, u32)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from `(module, table)` pairs.  Non-table values are skipped.
    pub fn from_sections(sections: impl IntoIterator<Item = (String, Value)>) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.write();
            for (module, section) in sections {
                match section {
                    Value::Object(map) => {
                        values.insert(module, map);
                    }
                    other => {
                        warn!(module = %module, value = %other, "Module configuration is not a table; ignored");
                    }
                }
            }
        }
        store
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, module: &str, key: &str) -> Option<Value> {
        self.values.read().get(module)?.get(key).cloned()
    }

    fn set(&self, module: &str, key: &str, value: Value) {
        self.values
            .write()
            .entry(module.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn remove(&self, module: &str, key: &str) -> Option<Value> {
        self.values.write().get_mut(module)?.remove(key)
    }

    fn keys(&self, module: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .read()
            .get(module)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn claim_migration(&self, module: &str, version: u32) -> bool {
        self.migrations.lock().insert((module.to_string(), version))
    }

    fn release_migration(&self, module: &str, version: u32) {
        self.migrations.lock().remove(&(module.to_string(), version));
    }
}

/// One module's view of the configuration store.
#[derive(Clone)]
pub struct ModuleConfig {
    module: Arc<str>,
    store: Arc<dyn ConfigStore>,
    defaults: HashMap<String, Value>,
}

impl ModuleConfig {
    pub fn new(module: impl Into<Arc<str>>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            module: module.into(),
            store,
            defaults: HashMap::new(),
        }
    }

    /// Declares the value returned for `key` when the store has none.
    pub fn with_default(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Stored value of `key`, falling back to its declared default.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store
            .get(&self.module, key)
            .or_else(|| self.defaults.get(key).cloned())
    }

    /// Typed [`get`](Self::get).  `Ok(None)` when the key is unset.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.get(key).map(serde_json::from_value).transpose()
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.module, key, value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.store.remove(&self.module, key)
    }

    /// Stored keys (declared defaults are not included).
    pub fn keys(&self) -> Vec<String> {
        self.store.keys(&self.module)
    }

    /// Runs `migrate` unless migration `version` already ran for this module.
    ///
    /// Returns `Ok(true)` when the migration ran now.  A failed migration is
    /// not recorded.
    pub fn apply_migration<F>(&self, version: u32, migrate: F) -> anyhow::Result<bool>
    where
        F: FnOnce(&ModuleConfig) -> anyhow::Result<()>,
    {
        if !self.store.claim_migration(&self.module, version) {
            return Ok(false);
        }
        match migrate(self) {
            Ok(()) => {
                info!(module = %self.module, version, "Configuration migration applied");
                Ok(true)
            }
            Err(e) => {
                self.store.release_migration(&self.module, version);
                Err(e.context(format!(
                    "migration {version} of module '{}' failed",
                    self.module
                )))
            }
        }
    }
}

impl std::fmt::Debug for ModuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleConfig")
            .field("module", &self.module)
            .field("defaults", &self.defaults)
            .finish()
    }
}

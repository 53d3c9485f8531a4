//! Module lifecycle management.
//!
//! [`ModuleManager`] owns every module instance.  It:
//!
//! - Runs the constructors of a [`ModuleRegistry`], excluding modules whose
//!   constructor fails or panics.
//! - Calls `load` on each module, capturing the dependencies it declares and
//!   the capabilities it publishes.
//! - Orders modules with Kahn's algorithm so that a module is enabled only
//!   after the modules it depends on, and enables them in that order.
//! - Fills dependents' slots whenever a module is enabled and clears them
//!   when it is disabled.
//! - Disables enabled modules in reverse order on shutdown, releasing their
//!   commands and listeners.
//!
//! Every hook call is guarded: a panic becomes a degrade reason, never a
//! crash.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = ModuleManager::new(engine.module_env(), ["legacy"]);
//! manager.enable_all(registry).await;
//! // …later…
//! manager.disable_all().await;
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use super::lifecycle::{
    Dependency, LoadContext, Module, ModuleContext, ModuleEnv, ModuleState, ModuleStatus,
    reason_text,
};
use super::registry::ModuleRegistry;
use super::slot::Capabilities;
use crate::error::{ModuleError, Panicked};

// =============================================================================
// Topological sort utility
// =============================================================================

/// Enable order computed by [`topological_layers`].
struct EnableOrder {
    /// Each layer only depends on earlier layers.
    layers: Vec<Vec<usize>>,
    /// Entries that could not be ordered: cycle members and their dependents.
    blocked: Vec<usize>,
}

/// Computes the enable order as **layers** via Kahn's algorithm.
///
/// An edge **A → B** means "A must be enabled before B" and exists when B
/// declared a dependency on A.
fn topological_layers(entries: &[ModuleEntry]) -> EnableOrder {
    let n = entries.len();
    let index: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.as_str(), i))
        .collect();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, entry) in entries.iter().enumerate() {
        for dep in &entry.deps {
            match index.get(dep.target.as_str()) {
                Some(&target) if target != i => {
                    dependents[target].push(i);
                    in_degree[i] += 1;
                }
                _ => {
                    warn!(module = %entry.id, dependency = %dep.target, "Unresolvable dependency edge ignored");
                }
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        layers.push(current);
        current = next;
    }

    let blocked = (0..n).filter(|&i| in_degree[i] > 0).collect();
    EnableOrder { layers, blocked }
}

/// Drops dependencies on modules that failed to load.
///
/// A dependent loaded before its target saw `Pending`; once the target ends
/// `ErrorLoading` the declaration is treated as if `depend_module` had
/// answered `Degraded`, so registration order does not change the outcome.
fn forget_failed_dependencies(entries: &mut [ModuleEntry]) {
    let failed: HashSet<String> = entries
        .iter()
        .filter(|e| e.state == ModuleState::ErrorLoading)
        .map(|e| e.id.clone())
        .collect();
    if failed.is_empty() {
        return;
    }
    for entry in entries.iter_mut() {
        let id = &entry.id;
        entry.deps.retain(|dep| {
            let keep = !failed.contains(&dep.target);
            if !keep {
                warn!(module = %id, dependency = %dep.target, "Dependency failed to load; dropped");
            }
            keep
        });
    }
}

// =============================================================================
// Hook guards
// =============================================================================

async fn guarded<F>(fut: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Panicked::from_payload(payload).into()),
    }
}

async fn guarded_disable(module: &Arc<dyn Module>, ctx: &ModuleContext) {
    let result = AssertUnwindSafe(module.disable(ctx)).catch_unwind().await;
    if let Err(payload) = result {
        error!(
            module = %ctx.id(),
            error = %Panicked::from_payload(payload),
            "Module panicked while disabling"
        );
    }
}

// =============================================================================
// ModuleEntry (internal)
// =============================================================================

pub(crate) struct ModuleEntry {
    id: String,
    module: Arc<dyn Module>,
    ctx: ModuleContext,
    state: ModuleState,
    reason: Option<ModuleError>,
    deps: Vec<Dependency>,
    capabilities: Capabilities,
}

// =============================================================================
// ModuleManager
// =============================================================================

/// Central owner of module instances and their lifecycle.
pub struct ModuleManager {
    env: ModuleEnv,
    entries: RwLock<Vec<ModuleEntry>>,
    /// Enable order of the last `enable_all`, reversed by `disable_all`.
    order: RwLock<Vec<usize>>,
    /// Modules to leave disabled after loading.
    disabled: HashSet<String>,
}

impl ModuleManager {
    pub fn new<I, S>(env: ModuleEnv, disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            env,
            entries: RwLock::new(Vec::new()),
            order: RwLock::new(Vec::new()),
            disabled: disabled.into_iter().map(Into::into).collect(),
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// State of the module `id`, or `None` if there is no such module.
    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.entries
            .read()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.state)
    }

    pub(crate) fn capabilities(&self, id: &str) -> Option<Capabilities> {
        self.entries
            .read()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.capabilities.clone())
    }

    /// `(id, state, reason)` of every module, in registration order.
    pub fn statuses(&self) -> Vec<ModuleStatus> {
        self.entries
            .read()
            .iter()
            .map(|e| ModuleStatus {
                id: e.id.clone(),
                state: e.state,
                reason: reason_text(&e.reason),
            })
            .collect()
    }

    pub fn module_count(&self) -> usize {
        self.entries.read().len()
    }

    fn publish(&self) {
        self.env.directory.publish(self.statuses());
    }

    fn set_state(&self, index: usize, state: ModuleState, reason: Option<ModuleError>) {
        let mut entries = self.entries.write();
        entries[index].state = state;
        entries[index].reason = reason;
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Constructs, loads and enables every module of `registry`.
    pub async fn enable_all(&self, registry: ModuleRegistry) {
        self.construct_all(registry);
        self.load_all().await;
        self.enable_in_order().await;
        self.publish();

        let statuses = self.statuses();
        let enabled = statuses
            .iter()
            .filter(|s| s.state == ModuleState::Enabled)
            .count();
        info!(total = statuses.len(), enabled, "Modules started");
    }

    /// Pass 1: run constructors.
    fn construct_all(&self, registry: ModuleRegistry) {
        for (type_label, constructor) in registry.into_constructors() {
            let module = match std::panic::catch_unwind(AssertUnwindSafe(constructor)) {
                Ok(Ok(module)) => module,
                Ok(Err(e)) => {
                    error!(module = type_label, error = %format!("{e:#}"), "Module constructor failed; module excluded");
                    continue;
                }
                Err(payload) => {
                    error!(module = type_label, error = %Panicked::from_payload(payload), "Module constructor panicked; module excluded");
                    continue;
                }
            };

            let id = module.identifier().to_string();
            let mut entries = self.entries.write();
            if entries.iter().any(|e| e.id == id) {
                error!(module = %id, "Duplicate module identifier; module excluded");
                continue;
            }
            entries.push(ModuleEntry {
                ctx: ModuleContext::new(&id, self.env.clone()),
                id,
                module: Arc::from(module),
                state: ModuleState::Constructed,
                reason: None,
                deps: Vec::new(),
                capabilities: Capabilities::default(),
            });
        }
    }

    /// Pass 2: call `load` and capture dependency declarations.
    async fn load_all(&self) {
        let count = self.entries.read().len();
        for i in 0..count {
            let (id, module, ctx) = {
                let entries = self.entries.read();
                let e = &entries[i];
                if e.state != ModuleState::Constructed {
                    continue;
                }
                (e.id.clone(), Arc::clone(&e.module), e.ctx.clone())
            };

            let load_ctx = LoadContext::new(ctx, self);
            let outcome = guarded(module.load(&load_ctx)).await;
            let (deps, capabilities) = load_ctx.into_parts();

            let mut entries = self.entries.write();
            let entry = &mut entries[i];
            entry.deps = deps;
            entry.capabilities = capabilities;
            match outcome {
                Ok(()) if self.disabled.contains(&id) => {
                    entry.state = ModuleState::Disabled;
                    entry.reason = Some(ModuleError::DisabledByConfig);
                    info!(module = %id, "Module loaded and left disabled by configuration");
                }
                Ok(()) => {
                    entry.state = ModuleState::Loaded;
                    info!(module = %id, dependencies = entry.deps.len(), "Module loaded");
                }
                Err(e) => {
                    let detail = format!("{e:#}");
                    error!(module = %id, error = %detail, "Module failed to load");
                    entry.state = ModuleState::ErrorLoading;
                    entry.reason = Some(ModuleError::Load(detail));
                }
            }
        }
    }

    /// Pass 3: enable in dependency order.
    async fn enable_in_order(&self) {
        let order = {
            let mut entries = self.entries.write();
            forget_failed_dependencies(&mut entries);
            let EnableOrder { layers, blocked } = topological_layers(&entries);
            if !blocked.is_empty() {
                let names: Vec<&str> = blocked.iter().map(|&i| entries[i].id.as_str()).collect();
                let cycle = names.join(", ");
                error!(modules = %cycle, "Module dependency cycle detected");
                for &i in &blocked {
                    if entries[i].state == ModuleState::Loaded {
                        entries[i].state = ModuleState::ErrorEnabling;
                        entries[i].reason = Some(ModuleError::Cycle(cycle.clone()));
                    }
                }
            }
            layers.into_iter().flatten().collect::<Vec<_>>()
        };
        *self.order.write() = order.clone();

        for i in order {
            let (id, module, ctx, blocked_by) = {
                let entries = self.entries.read();
                let e = &entries[i];
                if e.state != ModuleState::Loaded {
                    continue;
                }
                let blocked_by = e.deps.iter().find_map(|dep| {
                    let state = entries.iter().find(|t| t.id == dep.target)?.state;
                    (state != ModuleState::Enabled).then(|| ModuleError::DependencyNotEnabled {
                        dependency: dep.target.clone(),
                        state,
                    })
                });
                (e.id.clone(), Arc::clone(&e.module), e.ctx.clone(), blocked_by)
            };

            if let Some(reason) = blocked_by {
                warn!(module = %id, reason = %reason, "Module not enabled");
                self.set_state(i, ModuleState::ErrorEnabling, Some(reason));
                continue;
            }

            match guarded(module.enable(&ctx)).await {
                Ok(()) => {
                    self.set_state(i, ModuleState::Enabled, None);
                    self.patch_dependents(&id, true);
                    info!(module = %id, "Module enabled");
                }
                Err(e) => {
                    let detail = format!("{e:#}");
                    error!(module = %id, error = %detail, "Module failed to enable; unwinding");
                    self.set_state(i, ModuleState::ErrorEnabling, Some(ModuleError::Enable(detail)));
                    guarded_disable(&module, &ctx).await;
                    ctx.release();
                }
            }
        }
    }

    /// Disables every enabled module in reverse enable order.
    pub async fn disable_all(&self) {
        let order = self.order.read().clone();
        for &i in order.iter().rev() {
            let (id, module, ctx) = {
                let entries = self.entries.read();
                let e = &entries[i];
                if e.state != ModuleState::Enabled {
                    continue;
                }
                (e.id.clone(), Arc::clone(&e.module), e.ctx.clone())
            };

            guarded_disable(&module, &ctx).await;
            ctx.release();
            self.set_state(i, ModuleState::Disabled, None);
            self.patch_dependents(&id, false);
            info!(module = %id, "Module disabled");
        }
        self.publish();
    }

    /// Refills (or clears) the slots of every module depending on `target`.
    fn patch_dependents(&self, target: &str, enabled: bool) {
        let entries = self.entries.read();
        let capabilities = entries
            .iter()
            .find(|e| e.id == target)
            .map(|e| &e.capabilities);
        for entry in entries.iter() {
            for dep in entry.deps.iter().filter(|d| d.target == target) {
                (dep.fill)(if enabled { capabilities } else { None });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandArguments, CommandResult, CommandTree};
    use crate::dispatcher::{EventDispatcher, EventFilter};
    use crate::module::{MemoryStore, ModuleSlot};
    use crate::testing::MockTransport;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn env() -> ModuleEnv {
        ModuleEnv::new(
            Arc::new(MockTransport::new()),
            Arc::new(CommandTree::new("root")),
            Arc::new(EventDispatcher::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed(u64);

    impl Clock for Fixed {
        fn now(&self) -> u64 {
            self.0
        }
    }

    /// Configurable test module that logs its hook calls.
    #[derive(Default)]
    struct Probe {
        id: String,
        depends_on: Vec<String>,
        provides_clock: bool,
        fail_load: bool,
        panic_enable: bool,
        log: Arc<Mutex<Vec<String>>>,
        clock: ModuleSlot<dyn Clock>,
        statuses: Arc<Mutex<Vec<crate::module::DependStatus>>>,
    }

    impl Probe {
        fn new(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                id: id.to_string(),
                log: log.clone(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Module for Probe {
        fn identifier(&self) -> &str {
            &self.id
        }

        async fn load(&self, ctx: &LoadContext<'_>) -> anyhow::Result<()> {
            self.log.lock().push(format!("load {}", self.id));
            if self.fail_load {
                anyhow::bail!("missing credentials");
            }
            for dep in &self.depends_on {
                let status = ctx.depend_module(dep, &self.clock);
                self.statuses.lock().push(status);
            }
            if self.provides_clock {
                ctx.provide::<dyn Clock>(Arc::new(Fixed(42)));
            }
            Ok(())
        }

        async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
            if self.panic_enable {
                panic!("enable exploded");
            }
            self.log.lock().push(format!("enable {}", self.id));
            ctx.register_command(
                &self.id,
                Command::new("probe", |_a: CommandArguments| async { Ok(CommandResult::ok("")) }),
            )?;
            ctx.on_event(EventFilter::any(), |_e| async { Ok(()) });
            Ok(())
        }

        async fn disable(&self, _ctx: &ModuleContext) {
            self.log.lock().push(format!("disable {}", self.id));
        }
    }

    #[tokio::test]
    async fn test_enable_follows_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        // Registered dependent-first on purpose.
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                depends_on: vec!["b".into()],
                ..Probe::new("a", &l)
            })
        });
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                depends_on: vec!["c".into()],
                provides_clock: true,
                ..Probe::new("b", &l)
            })
        });
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                provides_clock: true,
                ..Probe::new("c", &l)
            })
        });

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;

        let enables: Vec<String> = log
            .lock()
            .iter()
            .filter(|l| l.starts_with("enable"))
            .cloned()
            .collect();
        assert_eq!(enables, ["enable c", "enable b", "enable a"]);
        assert!(
            manager
                .statuses()
                .iter()
                .all(|s| s.state == ModuleState::Enabled)
        );
    }

    #[tokio::test]
    async fn test_slot_filled_on_enable_and_cleared_on_disable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dependent = Probe {
            depends_on: vec!["clock".into()],
            ..Probe::new("user", &log)
        };
        let slot = dependent.clock.clone();
        let statuses = dependent.statuses.clone();

        let mut registry = ModuleRegistry::new();
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                provides_clock: true,
                ..Probe::new("clock", &l)
            })
        });
        registry.register(move || Ok(dependent));

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;

        assert_eq!(*statuses.lock(), [crate::module::DependStatus::Pending]);
        assert_eq!(slot.get().unwrap().now(), 42);

        manager.disable_all().await;
        assert!(!slot.is_filled());
        let disables: Vec<String> = log
            .lock()
            .iter()
            .filter(|l| l.starts_with("disable"))
            .cloned()
            .collect();
        assert_eq!(disables, ["disable user", "disable clock"]);
    }

    #[tokio::test]
    async fn test_depend_on_failed_module_is_degraded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dependent = Probe {
            depends_on: vec!["broken".into()],
            ..Probe::new("user", &log)
        };
        let statuses = dependent.statuses.clone();

        let mut registry = ModuleRegistry::new();
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                fail_load: true,
                ..Probe::new("broken", &l)
            })
        });
        registry.register(move || Ok(dependent));

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;

        assert_eq!(*statuses.lock(), [crate::module::DependStatus::Degraded]);
        assert_eq!(crate::module::DependStatus::Degraded.code(), -2);
        assert_eq!(manager.state("broken"), Some(ModuleState::ErrorLoading));
        // A degraded dependency is not recorded, so the dependent still runs.
        assert_eq!(manager.state("user"), Some(ModuleState::Enabled));

        let broken = manager
            .statuses()
            .into_iter()
            .find(|s| s.id == "broken")
            .unwrap();
        assert!(broken.reason.unwrap().contains("missing credentials"));
    }

    async fn run_broken_pair(dependent_first: bool) -> (ModuleManager, ModuleSlot<dyn Clock>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dependent = Probe {
            depends_on: vec!["broken".into()],
            ..Probe::new("user", &log)
        };
        let slot = dependent.clock.clone();
        let broken = Probe {
            fail_load: true,
            provides_clock: true,
            ..Probe::new("broken", &log)
        };

        let mut registry = ModuleRegistry::new();
        if dependent_first {
            registry.register(move || Ok(dependent));
            registry.register(move || Ok(broken));
        } else {
            registry.register(move || Ok(broken));
            registry.register(move || Ok(dependent));
        }

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;
        (manager, slot)
    }

    #[tokio::test]
    async fn test_failed_load_outcome_ignores_registration_order() {
        for dependent_first in [false, true] {
            let (manager, slot) = run_broken_pair(dependent_first).await;
            assert_eq!(manager.state("broken"), Some(ModuleState::ErrorLoading));
            assert_eq!(
                manager.state("user"),
                Some(ModuleState::Enabled),
                "dependent_first = {dependent_first}"
            );
            assert!(!slot.is_filled());
        }
    }

    #[tokio::test]
    async fn test_unknown_dependency() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dependent = Probe {
            depends_on: vec!["ghost".into()],
            ..Probe::new("user", &log)
        };
        let statuses = dependent.statuses.clone();
        let mut registry = ModuleRegistry::new();
        registry.register(move || Ok(dependent));

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;
        assert_eq!(*statuses.lock(), [crate::module::DependStatus::Unknown]);
        assert_eq!(manager.state("user"), Some(ModuleState::Enabled));
    }

    #[tokio::test]
    async fn test_disabled_dependency_blocks_dependent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        let l = log.clone();
        registry.register(move || Ok(Probe::new("base", &l)));
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                depends_on: vec!["base".into()],
                ..Probe::new("user", &l)
            })
        });

        let manager = ModuleManager::new(env(), ["base"]);
        manager.enable_all(registry).await;

        assert_eq!(manager.state("base"), Some(ModuleState::Disabled));
        assert_eq!(manager.state("user"), Some(ModuleState::ErrorEnabling));
        let user = manager
            .statuses()
            .into_iter()
            .find(|s| s.id == "user")
            .unwrap();
        assert_eq!(user.reason.as_deref(), Some("dependency 'base' is disabled"));
    }

    #[tokio::test]
    async fn test_cycle_members_are_not_enabled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        for (id, dep) in [("x", "y"), ("y", "x")] {
            let l = log.clone();
            registry.register(move || {
                Ok(Probe {
                    depends_on: vec![dep.into()],
                    ..Probe::new(id, &l)
                })
            });
        }
        let l = log.clone();
        registry.register(move || Ok(Probe::new("free", &l)));

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;

        assert_eq!(manager.state("x"), Some(ModuleState::ErrorEnabling));
        assert_eq!(manager.state("y"), Some(ModuleState::ErrorEnabling));
        assert_eq!(manager.state("free"), Some(ModuleState::Enabled));
    }

    #[tokio::test]
    async fn test_enable_panic_unwinds_module() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let env = env();
        let mut registry = ModuleRegistry::new();
        let l = log.clone();
        registry.register(move || {
            Ok(Probe {
                panic_enable: true,
                ..Probe::new("crashy", &l)
            })
        });
        let l = log.clone();
        registry.register(move || Ok(Probe::new("steady", &l)));

        let manager = ModuleManager::new(env.clone(), Vec::<String>::new());
        manager.enable_all(registry).await;

        assert_eq!(manager.state("crashy"), Some(ModuleState::ErrorEnabling));
        assert_eq!(manager.state("steady"), Some(ModuleState::Enabled));
        assert!(log.lock().contains(&"disable crashy".to_string()));
        assert!(!env.commands.contains("crashy"));
    }

    #[tokio::test]
    async fn test_failing_constructors_are_excluded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(|| -> anyhow::Result<Probe> { anyhow::bail!("no config") });
        registry.register(|| -> anyhow::Result<Probe> { panic!("constructor bug") });
        let l = log.clone();
        registry.register(move || Ok(Probe::new("ok", &l)));
        let l = log.clone();
        registry.register(move || Ok(Probe::new("ok", &l)));

        let manager = ModuleManager::new(env(), Vec::<String>::new());
        manager.enable_all(registry).await;
        assert_eq!(manager.module_count(), 1);
        assert_eq!(manager.state("ok"), Some(ModuleState::Enabled));
    }

    #[tokio::test]
    async fn test_disable_all_releases_commands_and_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let env = env();
        let mut registry = ModuleRegistry::new();
        let l = log.clone();
        registry.register(move || Ok(Probe::new("probe", &l)));

        let manager = ModuleManager::new(env.clone(), Vec::<String>::new());
        manager.enable_all(registry).await;
        assert!(env.commands.contains("probe"));
        assert_eq!(env.events.listener_count(), 1);

        manager.disable_all().await;
        assert!(!env.commands.contains("probe"));
        assert_eq!(env.events.listener_count(), 0);
        assert_eq!(manager.state("probe"), Some(ModuleState::Disabled));
    }
}

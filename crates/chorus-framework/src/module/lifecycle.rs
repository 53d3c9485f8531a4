use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chorus_core::{BoxedTransport, Event, MessageEvent};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::config::{ConfigStore, ModuleConfig};
use super::manager::ModuleManager;
use super::slot::{Capabilities, ModuleSlot};
use crate::command::{Command, CommandTree};
use crate::dispatcher::{EventDispatcher, EventFilter};
use crate::error::{CommandTreeResult, ModuleError};

// ─── Module trait ───────────────────────────────────────────────────────────

/// A unit of bot functionality with a managed lifecycle.
///
/// ```text
/// construct ──▶ load ──▶ enable ──▶ … ──▶ disable
///                 │         │
///                 ▼         ▼
///           ErrorLoading  ErrorEnabling
/// ```
///
/// `load` declares dependencies and publishes capabilities; `enable`
/// registers commands and listeners.  Commands registered through the
/// context and every listener owned by the module are removed automatically
/// after `disable`.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Unique key of this module.
    fn identifier(&self) -> &str;

    async fn load(&self, _ctx: &LoadContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()>;

    async fn disable(&self, _ctx: &ModuleContext) {}
}

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Constructed,
    Loaded,
    Enabled,
    Disabled,
    ErrorLoading,
    ErrorEnabling,
}

impl ModuleState {
    /// `true` for the two error states.
    pub fn is_degraded(self) -> bool {
        matches!(self, ModuleState::ErrorLoading | ModuleState::ErrorEnabling)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleState::Constructed => "constructed",
            ModuleState::Loaded => "loaded",
            ModuleState::Enabled => "enabled",
            ModuleState::Disabled => "disabled",
            ModuleState::ErrorLoading => "error-loading",
            ModuleState::ErrorEnabling => "error-enabling",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to [`LoadContext::depend_module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependStatus {
    /// The target is enabled; the slot is filled already.
    Enabled,
    /// The slot will be filled once the target is enabled.
    Pending,
    /// No such module.
    Unknown,
    /// The target failed and will not be enabled.
    Degraded,
}

impl DependStatus {
    pub fn code(self) -> i32 {
        match self {
            DependStatus::Enabled => 1,
            DependStatus::Pending => 0,
            DependStatus::Unknown => -1,
            DependStatus::Degraded => -2,
        }
    }
}

/// Point-in-time status of one module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleStatus {
    pub id: String,
    pub state: ModuleState,
    pub reason: Option<String>,
}

// ─── Shared environment ─────────────────────────────────────────────────────

/// Snapshot of module statuses, published by the manager after every pass.
#[derive(Clone, Default)]
pub(crate) struct ModuleDirectory(Arc<RwLock<Vec<ModuleStatus>>>);

impl ModuleDirectory {
    pub(crate) fn publish(&self, statuses: Vec<ModuleStatus>) {
        *self.0.write() = statuses;
    }

    pub(crate) fn snapshot(&self) -> Vec<ModuleStatus> {
        self.0.read().clone()
    }
}

/// Engine handles shared by every module.
#[derive(Clone)]
pub struct ModuleEnv {
    pub transport: BoxedTransport,
    pub commands: Arc<CommandTree>,
    pub events: Arc<EventDispatcher>,
    pub store: Arc<dyn ConfigStore>,
    pub(crate) directory: ModuleDirectory,
}

impl ModuleEnv {
    pub fn new(
        transport: BoxedTransport,
        commands: Arc<CommandTree>,
        events: Arc<EventDispatcher>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            transport,
            commands,
            events,
            store,
            directory: ModuleDirectory::default(),
        }
    }
}

// ─── ModuleContext ──────────────────────────────────────────────────────────

/// A module's handle to the engine.
#[derive(Clone)]
pub struct ModuleContext {
    id: Arc<str>,
    env: ModuleEnv,
    owned_commands: Arc<Mutex<Vec<String>>>,
}

impl ModuleContext {
    pub(crate) fn new(id: &str, env: ModuleEnv) -> Self {
        Self {
            id: Arc::from(id),
            env,
            owned_commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Identifier of the module this context belongs to.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.env.transport
    }

    /// The root command tree.
    pub fn commands(&self) -> &Arc<CommandTree> {
        &self.env.commands
    }

    /// Registers a top-level command owned by this module.
    pub fn register_command(&self, name: &str, command: Command) -> CommandTreeResult<()> {
        self.env.commands.register(name, command)?;
        self.owned_commands.lock().push(name.to_string());
        Ok(())
    }

    /// Registers a top-level command group owned by this module.
    pub fn register_tree(&self, name: &str, tree: Arc<CommandTree>) -> CommandTreeResult<()> {
        self.env.commands.register_tree(name, tree)?;
        self.owned_commands.lock().push(name.to_string());
        Ok(())
    }

    pub fn unregister_command(&self, name: &str) -> bool {
        self.owned_commands.lock().retain(|n| n != name);
        self.env.commands.unregister(name)
    }

    /// Subscribes to events matching `filter`.
    pub fn on_event<F, Fut>(&self, filter: EventFilter, callback: F)
    where
        F: Fn(Arc<Event>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.env.events.on_event(&self.id, filter, callback);
    }

    /// Subscribes to plain user messages.
    pub fn on_normal_message<F, Fut>(&self, callback: F)
    where
        F: Fn(MessageEvent) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.env.events.on_normal_message(&self.id, callback);
    }

    /// Removes every listener this module registered.
    pub fn off_all_events(&self) -> usize {
        self.env.events.off_all_events(&self.id)
    }

    /// This module's configuration namespace.
    pub fn module_config(&self) -> ModuleConfig {
        ModuleConfig::new(Arc::clone(&self.id), Arc::clone(&self.env.store))
    }

    /// Statuses of every module as of the last lifecycle pass.
    pub fn modules(&self) -> Vec<ModuleStatus> {
        self.env.directory.snapshot()
    }

    /// Drops the commands and listeners this module registered.
    pub(crate) fn release(&self) {
        let names: Vec<String> = std::mem::take(&mut *self.owned_commands.lock());
        for name in names {
            self.env.commands.unregister(&name);
        }
        let removed = self.off_all_events();
        debug!(module = %self.id, listeners = removed, "Module resources released");
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext").field("id", &self.id).finish()
    }
}

// ─── LoadContext ────────────────────────────────────────────────────────────

/// A declared dependency: target id plus the closure that fills its slot.
pub(crate) struct Dependency {
    pub(crate) target: String,
    pub(crate) fill: Arc<dyn Fn(Option<&Capabilities>) + Send + Sync>,
}

/// Context passed to [`Module::load`].
///
/// Dereferences to [`ModuleContext`]; additionally records dependency
/// declarations and published capabilities.
pub struct LoadContext<'a> {
    ctx: ModuleContext,
    manager: &'a ModuleManager,
    deps: Mutex<Vec<Dependency>>,
    provided: Mutex<Capabilities>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(ctx: ModuleContext, manager: &'a ModuleManager) -> Self {
        Self {
            ctx,
            manager,
            deps: Mutex::new(Vec::new()),
            provided: Mutex::new(Capabilities::default()),
        }
    }

    /// Declares a dependency on module `target`, to be reached through `slot`.
    ///
    /// Only `Enabled` and `Pending` record the dependency; a module with a
    /// recorded dependency is enabled after its target, and not at all if
    /// the target is disabled or fails to enable.  A target that fails to
    /// load is treated as `Degraded` whether it loaded before or after.
    pub fn depend_module<T>(&self, target: &str, slot: &ModuleSlot<T>) -> DependStatus
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if target == self.ctx.id() {
            warn!(module = %self.ctx.id(), "Module declared a dependency on itself; ignored");
            return DependStatus::Unknown;
        }
        let Some(state) = self.manager.state(target) else {
            warn!(module = %self.ctx.id(), dependency = target, "Dependency on unknown module");
            return DependStatus::Unknown;
        };
        if state.is_degraded() {
            warn!(module = %self.ctx.id(), dependency = target, state = %state, "Dependency is degraded");
            return DependStatus::Degraded;
        }

        let slot = slot.clone();
        let dependency = target.to_string();
        let fill = Arc::new(move |caps: Option<&Capabilities>| match caps {
            None => slot.fill(None),
            Some(caps) => {
                let capability = caps.get::<T>();
                if capability.is_none() {
                    warn!(
                        dependency = %dependency,
                        capability = type_name::<T>(),
                        "Dependency provides no capability of the requested type"
                    );
                }
                slot.fill(capability);
            }
        });

        let status = if state == ModuleState::Enabled {
            fill(self.manager.capabilities(target).as_ref());
            DependStatus::Enabled
        } else {
            DependStatus::Pending
        };
        self.deps.lock().push(Dependency {
            target: target.to_string(),
            fill,
        });
        debug!(module = %self.ctx.id(), dependency = target, status = ?status, "Dependency declared");
        status
    }

    /// Publishes a capability other modules can reach through a slot of `T`.
    pub fn provide<T>(&self, capability: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if self.provided.lock().insert::<T>(capability) {
            warn!(module = %self.ctx.id(), capability = type_name::<T>(), "Capability provided twice; last one wins");
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Dependency>, Capabilities) {
        (self.deps.into_inner(), self.provided.into_inner())
    }
}

impl Deref for LoadContext<'_> {
    type Target = ModuleContext;

    fn deref(&self) -> &ModuleContext {
        &self.ctx
    }
}

/// Why a module is in its current state, for status reports.
pub(crate) fn reason_text(reason: &Option<ModuleError>) -> Option<String> {
    reason.as_ref().map(ToString::to_string)
}

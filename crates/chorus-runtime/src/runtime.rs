//! Runtime orchestration: configuration, modules and the event pump.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chorus_runtime::ChorusRuntime;
//!
//! let runtime = ChorusRuntime::builder()
//!     .config_file("config/chorus.toml")
//!     .modules(|registry| {
//!         register_builtin(registry);
//!     })
//!     .build(transport)?;
//!
//! // Runs until Ctrl+C, SIGTERM or the end of the event stream.
//! runtime.run(events).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chorus_core::{BoxedTransport, Event};
use chorus_framework::{Engine, ModuleManager, ModuleRegistry, ModuleStatus};
use futures::future::join_all;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ChorusConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// How long in-flight listeners may run after the event stream stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The Chorus runtime: owns the engine, the module manager and the modules
/// waiting to be enabled.
pub struct ChorusRuntime {
    config: ChorusConfig,
    engine: Engine,
    manager: ModuleManager,
    registry: Mutex<Option<ModuleRegistry>>,
}

impl ChorusRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration, installs the global log subscriber and
    /// seeds the module store from the `modules.<id>` tables.
    pub fn from_config(config: &ChorusConfig, transport: BoxedTransport) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        let engine = Engine::new(
            transport,
            config.engine_settings(),
            Arc::new(config.module_store()),
        );
        let manager = ModuleManager::new(engine.module_env(), config.modules.disabled.clone());

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            bot = %engine.transport().self_id(),
            disabled_modules = config.modules.disabled.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            engine,
            manager,
            registry: Mutex::new(Some(ModuleRegistry::new())),
        })
    }

    pub fn config(&self) -> &ChorusConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    /// Adds module constructors.  They take effect when the runtime starts.
    pub fn register_modules<F>(&self, register: F) -> RuntimeResult<()>
    where
        F: FnOnce(&mut ModuleRegistry),
    {
        let mut guard = self.registry.lock();
        let registry = guard.as_mut().ok_or(RuntimeError::AlreadyStarted)?;
        register(registry);
        Ok(())
    }

    pub fn module_statuses(&self) -> Vec<ModuleStatus> {
        self.manager.statuses()
    }

    /// Whether modules have been enabled.
    pub fn is_started(&self) -> bool {
        self.registry.lock().is_none()
    }

    /// Runs until Ctrl+C, SIGTERM or the end of `events`.
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Event> + Send,
    {
        let signal = shutdown_signal()?;
        info!("Chorus runtime is now running. Press Ctrl+C to stop.");
        self.run_until(events, signal).await
    }

    /// Runs until `shutdown` resolves or `events` ends.
    ///
    /// Enables every registered module, starts the record janitor, feeds each
    /// event to the dispatcher, then stops the janitor and disables the
    /// modules in reverse order.
    pub async fn run_until<S, F>(&self, events: S, shutdown: F) -> RuntimeResult<()>
    where
        S: Stream<Item = Event> + Send,
        F: Future<Output = ()> + Send,
    {
        let registry = self
            .registry
            .lock()
            .take()
            .ok_or(RuntimeError::AlreadyStarted)?;

        info!(modules = registry.len(), "Starting Chorus runtime");
        self.manager.enable_all(registry).await;

        let token = CancellationToken::new();
        let janitor = self.engine.spawn_janitor(token.child_token());

        let dispatched = self.pump(events, shutdown).await;

        token.cancel();
        if let Err(e) = janitor.await {
            warn!(error = %e, "Record janitor ended abnormally");
        }

        info!(events = dispatched, "Stopping Chorus runtime");
        self.manager.disable_all().await;
        info!("Runtime stopped");
        Ok(())
    }

    /// Feeds events to the dispatcher until the stream ends or `shutdown`
    /// resolves, then waits briefly for listeners still running.
    async fn pump<S, F>(&self, events: S, shutdown: F) -> usize
    where
        S: Stream<Item = Event> + Send,
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(events);
        tokio::pin!(shutdown);

        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        let mut dispatched = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => {
                        debug!(event = %event.event_type(), "Dispatching event");
                        in_flight.retain(|handle| !handle.is_finished());
                        in_flight.extend(self.engine.dispatch(event));
                        dispatched += 1;
                    }
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                }
            }
        }

        in_flight.retain(|handle| !handle.is_finished());
        if !in_flight.is_empty() {
            debug!(pending = in_flight.len(), "Waiting for running listeners");
            if tokio::time::timeout(SHUTDOWN_GRACE, join_all(in_flight))
                .await
                .is_err()
            {
                warn!("Listeners still running after shutdown grace period");
            }
        }
        dispatched
    }
}

/// Resolves on Ctrl+C or SIGTERM.
fn shutdown_signal() -> RuntimeResult<impl Future<Output = ()> + Send> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        Ok(async move {
            tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Received Ctrl+C, shutting down");
                        return;
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
                },
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    return;
                }
            }
            sigterm.recv().await;
            info!("Received SIGTERM, shutting down");
        })
    }

    #[cfg(not(unix))]
    {
        Ok(async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }
        })
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`ChorusRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    registry: ModuleRegistry,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            registry: ModuleRegistry::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: ChorusConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Adds module constructors.
    pub fn modules<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut ModuleRegistry),
    {
        register(&mut self.registry);
        self
    }

    /// Loads the configuration and builds the runtime around `transport`.
    pub fn build(self, transport: BoxedTransport) -> RuntimeResult<ChorusRuntime> {
        let config = self.config_loader.load()?;
        let runtime = ChorusRuntime::from_config(&config, transport)?;
        *runtime.registry.lock() = Some(self.registry);
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

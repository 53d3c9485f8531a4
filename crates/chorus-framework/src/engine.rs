//! The message-listening service that ties the framework together.
//!
//! ```text
//!            ┌─────────────────────── Engine ───────────────────────┐
//! Event ───▶ │ EventDispatcher ──▶ EditTracker ──▶ CommandTree      │
//!            │        │                 │                           │
//!            │        ▼                 ▼                           │
//!            │  module listeners   ReplyRouter ──▶ Transport        │
//!            └──────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chorus_core::{
    BoxedTransport, ChannelId, Event, MESSAGE_CHANGED, MESSAGE_EVENT, MessageEvent,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::{CommandArguments, CommandResult, CommandTree};
use crate::dispatcher::{EventDispatcher, EventFilter};
use crate::module::{ConfigStore, ModuleEnv};
use crate::reaction::ReactionEmoji;
use crate::reply::{ReplyLimits, ReplyRouter};
use crate::tracker::{EditTracker, TrackerSettings};

/// Listener owner id used for the engine's own subscriptions.
pub const ENGINE_OWNER: &str = "chorus.engine";

/// Engine tunables, usually built from the runtime configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Audit log for commands from public channels.
    pub log_channel: Option<ChannelId>,
    /// Log for commands sent by direct message.
    pub private_log_channel: Option<ChannelId>,
    pub edit_delay: Duration,
    /// How long command records are kept for edit tracking.
    pub retention: Duration,
    /// How often expired records are swept.
    pub sweep_period: Duration,
    pub reactions: ReactionEmoji,
    pub limits: ReplyLimits,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let tracker = TrackerSettings::default();
        Self {
            log_channel: None,
            private_log_channel: None,
            edit_delay: tracker.edit_delay,
            retention: tracker.retention,
            sweep_period: Duration::from_secs(30 * 60),
            reactions: tracker.emoji,
            limits: ReplyLimits::default(),
        }
    }
}

/// The command processing engine.
pub struct Engine {
    commands: Arc<CommandTree>,
    events: Arc<EventDispatcher>,
    router: Arc<ReplyRouter>,
    tracker: Arc<EditTracker>,
    env: ModuleEnv,
    settings: EngineSettings,
}

impl Engine {
    /// Builds the engine and subscribes it to message and edit events.
    pub fn new(
        transport: BoxedTransport,
        settings: EngineSettings,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        let commands = Arc::new(CommandTree::new("Chorus commands"));
        let events = Arc::new(EventDispatcher::new());
        let router = Arc::new(ReplyRouter::new(
            transport.clone(),
            settings.log_channel.clone(),
            settings.private_log_channel.clone(),
            settings.limits.clone(),
        ));
        let tracker = Arc::new(EditTracker::new(
            transport.clone(),
            commands.clone(),
            router.clone(),
            TrackerSettings {
                edit_delay: settings.edit_delay,
                retention: settings.retention,
                emoji: settings.reactions.clone(),
            },
        ));
        let env = ModuleEnv::new(transport, commands.clone(), events.clone(), store);

        let engine = Self {
            commands,
            events,
            router,
            tracker,
            env,
            settings,
        };
        engine.subscribe();
        engine
    }

    fn subscribe(&self) {
        let tracker = Arc::clone(&self.tracker);
        self.events
            .on_normal_message(ENGINE_OWNER, move |message: MessageEvent| {
                let tracker = tracker.clone();
                async move {
                    tracker.handle_message(message).await;
                    Ok(())
                }
            });

        let tracker = Arc::clone(&self.tracker);
        self.events.on_event(
            ENGINE_OWNER,
            EventFilter::event(MESSAGE_EVENT).with_subtype(MESSAGE_CHANGED),
            move |event: Arc<Event>| {
                let tracker = tracker.clone();
                async move {
                    if let Some(changed) = event.as_message_changed() {
                        tracker.handle_edit(changed.clone()).await;
                    }
                    Ok(())
                }
            },
        );
        debug!(listeners = self.events.listener_count(), "Engine subscribed");
    }

    /// Handles for modules: transport, command tree, dispatcher, store.
    pub fn module_env(&self) -> ModuleEnv {
        self.env.clone()
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.env.transport
    }

    pub fn commands(&self) -> &Arc<CommandTree> {
        &self.commands
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn router(&self) -> &Arc<ReplyRouter> {
        &self.router
    }

    pub fn tracker(&self) -> &Arc<EditTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs a command directly, bypassing mention parsing and tracking.
    pub async fn dispatch_command(&self, args: CommandArguments) -> CommandResult {
        self.commands.dispatch(args).await
    }

    /// Delivers an inbound event to every matching listener.
    pub fn dispatch(&self, event: Event) -> Vec<JoinHandle<()>> {
        self.events.dispatch(event)
    }

    /// Starts the periodic sweep of expired command records.
    pub fn spawn_janitor(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.tracker
            .spawn_janitor(self.settings.sweep_period, shutdown)
    }
}

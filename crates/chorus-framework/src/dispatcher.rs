//! Fan-out of inbound events to registered listeners.
//!
//! Listeners are tower services keyed by an owner id (a module identifier)
//! and an [`EventFilter`].  [`EventDispatcher::dispatch`] runs every matching
//! listener in its own task, wrapped in a [`CatchPanicLayer`], so one slow or
//! panicking listener never affects the others.
//!
//! ```text
//! Event ──▶ EventDispatcher ─┬─ filter ✓ ─▶ spawn(CatchPanic(listener A))
//!                            ├─ filter ✗
//!                            └─ filter ✓ ─▶ spawn(CatchPanic(listener C))
//! ```

use std::future::Future;
use std::sync::Arc;

use chorus_core::{Event, MESSAGE_EVENT, MessageEvent};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, ServiceBuilder, ServiceExt, service_fn};
use tracing::{Instrument, Level, error, span, warn};

use crate::error::Panicked;
use crate::layer::CatchPanicLayer;

/// A type-erased listener service.
pub type BoxedListener = BoxCloneSyncService<Arc<Event>, (), BoxError>;

/// How a listener filters on the event subtype.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubtypeFilter {
    /// Any subtype, including none.
    #[default]
    Any,
    /// Only events without a subtype.
    None,
    /// Only events with exactly this subtype.
    Exact(String),
}

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventFilter {
    /// `None` matches every event type.
    pub event_type: Option<String>,
    pub subtype: SubtypeFilter,
}

impl EventFilter {
    /// Matches every event.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches events of `event_type`, any subtype.
    pub fn event(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            subtype: SubtypeFilter::Any,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = SubtypeFilter::Exact(subtype.into());
        self
    }

    pub fn without_subtype(mut self) -> Self {
        self.subtype = SubtypeFilter::None;
        self
    }

    /// Plain user messages: type `message`, no subtype.
    pub fn normal_message() -> Self {
        Self::event(MESSAGE_EVENT).without_subtype()
    }

    pub fn matches(&self, event: &Event) -> bool {
        if self
            .event_type
            .as_deref()
            .is_some_and(|ty| ty != event.event_type())
        {
            return false;
        }
        match &self.subtype {
            SubtypeFilter::Any => true,
            SubtypeFilter::None => event.subtype().is_none(),
            SubtypeFilter::Exact(expected) => event.subtype() == Some(expected.as_str()),
        }
    }
}

struct Listener {
    owner: String,
    filter: EventFilter,
    service: BoxedListener,
}

/// Broadcasts events to listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Listener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener service for events matching `filter`.
    pub fn add_listener(&self, owner: &str, filter: EventFilter, service: BoxedListener) {
        self.listeners.write().push(Listener {
            owner: owner.to_string(),
            filter,
            service,
        });
    }

    /// Registers an async callback for events matching `filter`.
    pub fn on_event<F, Fut>(&self, owner: &str, filter: EventFilter, callback: F)
    where
        F: Fn(Arc<Event>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let service = ServiceBuilder::new()
            .layer(CatchPanicLayer)
            .service(service_fn(move |event: Arc<Event>| {
                let callback = callback.clone();
                async move { callback(event).await.map_err(BoxError::from) }
            }));
        self.add_listener(owner, filter, BoxCloneSyncService::new(service));
    }

    /// Registers a callback for plain user messages (no subtype).
    pub fn on_normal_message<F, Fut>(&self, owner: &str, callback: F)
    where
        F: Fn(MessageEvent) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_event(owner, EventFilter::normal_message(), move |event: Arc<Event>| {
            let callback = callback.clone();
            async move {
                match event.as_message() {
                    Some(message) => callback(message.clone()).await,
                    None => Ok(()),
                }
            }
        });
    }

    /// Removes every listener registered by `owner`.  Returns how many were removed.
    pub fn off_all_events(&self, owner: &str) -> usize {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.owner != owner);
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers `event` to every matching listener, each in its own task.
    ///
    /// Returns the task handles; callers are free to drop them.
    pub fn dispatch(&self, event: Event) -> Vec<JoinHandle<()>> {
        let matching: Vec<(String, BoxedListener)> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.filter.matches(&event))
            .map(|l| (l.owner.clone(), l.service.clone()))
            .collect();

        let event_type = event.event_type().to_string();
        let event = Arc::new(event);
        matching
            .into_iter()
            .map(|(owner, service)| {
                let event = Arc::clone(&event);
                let span = span!(Level::DEBUG, "dispatch", event = %event_type, owner = %owner);
                tokio::spawn(
                    async move {
                        if let Err(e) = service.oneshot(event).await {
                            if let Some(panicked) = e.downcast_ref::<Panicked>() {
                                error!(owner = %owner, error = %panicked, "Listener panicked");
                            } else {
                                warn!(owner = %owner, error = %e, "Listener failed");
                            }
                        }
                    }
                    .instrument(span),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{ChannelId, MessageTs, UserId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(text: &str) -> Event {
        Event::message(MessageEvent::new(
            ChannelId::new("C1"),
            UserId::new("U1"),
            MessageTs::new("1.0"),
            text,
        ))
    }

    fn counter(dispatcher: &EventDispatcher, owner: &str, filter: EventFilter) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        dispatcher.on_event(owner, filter, move |_event: Arc<Event>| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        hits
    }

    async fn run(dispatcher: &EventDispatcher, event: Event) {
        for handle in dispatcher.dispatch(event) {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_filters() {
        let edit = Event::from_json(json!({
            "type": "message", "subtype": "message_changed", "channel": "C1", "ts": "2.0",
            "message": {"user": "U1", "text": "x", "ts": "1.0"}
        }))
        .unwrap();

        assert!(EventFilter::normal_message().matches(&message("hi")));
        assert!(!EventFilter::normal_message().matches(&edit));
        assert!(EventFilter::event("message").with_subtype("message_changed").matches(&edit));
        assert!(EventFilter::any().matches(&edit));
        assert!(!EventFilter::event("hello").matches(&edit));
    }

    #[tokio::test]
    async fn test_dispatch_reaches_matching_listeners_only() {
        let dispatcher = EventDispatcher::new();
        let all = counter(&dispatcher, "a", EventFilter::any());
        let hello = counter(&dispatcher, "b", EventFilter::event("hello"));

        run(&dispatcher, message("hi")).await;
        run(&dispatcher, Event::new(chorus_core::EventKind::Hello)).await;

        assert_eq!(all.load(Ordering::SeqCst), 2);
        assert_eq!(hello.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_affect_others() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on_event("bad", EventFilter::any(), |_event: Arc<Event>| async move {
            if true {
                panic!("listener bug");
            }
            Ok(())
        });
        let good = counter(&dispatcher, "good", EventFilter::any());

        run(&dispatcher, message("hi")).await;
        run(&dispatcher, message("again")).await;
        assert_eq!(good.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_on_normal_message_receives_payload() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        dispatcher.on_normal_message("m", move |msg: MessageEvent| {
            let s = s.clone();
            async move {
                s.lock().push(msg.text);
                Ok(())
            }
        });

        run(&dispatcher, message("first")).await;
        assert_eq!(*seen.lock(), vec!["first".to_string()]);
    }

    #[test]
    fn test_off_all_events() {
        let dispatcher = EventDispatcher::new();
        counter(&dispatcher, "a", EventFilter::any());
        counter(&dispatcher, "a", EventFilter::event("hello"));
        counter(&dispatcher, "b", EventFilter::any());

        assert_eq!(dispatcher.off_all_events("a"), 2);
        assert_eq!(dispatcher.listener_count(), 1);
        assert_eq!(dispatcher.off_all_events("a"), 0);
    }
}

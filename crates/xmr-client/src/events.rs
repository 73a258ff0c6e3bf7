//! Event bus for XMR notifications.
//!
//! Handlers are registered per [`EventKind`] and run synchronously, in
//! registration order, on the task that emits the event. Async hosts can
//! also take a broadcast receiver carrying every event.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::trace;
use xmr_protocol::{CriteriaUpdate, InboundCommand};

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Names of the events a client publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    StatusChange,
    CollectNow,
    ScreenShot,
    LicenceCheck,
    ShowStatusWindow,
    #[serde(rename = "forceUpdateChromeOS")]
    ForceUpdateChromeOS,
    CriteriaUpdate,
    CurrentGeoLocation,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 11] = [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Error,
        EventKind::StatusChange,
        EventKind::CollectNow,
        EventKind::ScreenShot,
        EventKind::LicenceCheck,
        EventKind::ShowStatusWindow,
        EventKind::ForceUpdateChromeOS,
        EventKind::CriteriaUpdate,
        EventKind::CurrentGeoLocation,
    ];

    /// The wire-compatible event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Error => "error",
            EventKind::StatusChange => "statusChange",
            EventKind::CollectNow => "collectNow",
            EventKind::ScreenShot => "screenShot",
            EventKind::LicenceCheck => "licenceCheck",
            EventKind::ShowStatusWindow => "showStatusWindow",
            EventKind::ForceUpdateChromeOS => "forceUpdateChromeOS",
            EventKind::CriteriaUpdate => "criteriaUpdate",
            EventKind::CurrentGeoLocation => "currentGeoLocation",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum XmrEvent {
    /// The init frame went out on a freshly opened transport.
    Connected,
    /// The transport closed.
    Disconnected,
    /// Something went wrong; the message is for display only.
    Error(String),
    /// A frame arrived; carries the RFC 3339 receive time.
    StatusChange(String),
    CollectNow,
    ScreenShot,
    LicenceCheck,
    /// Show the status window for this many seconds.
    ShowStatusWindow(u64),
    ForceUpdateChromeOS,
    CriteriaUpdate(Vec<CriteriaUpdate>),
    CurrentGeoLocation,
}

impl XmrEvent {
    /// The kind handlers subscribe to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            XmrEvent::Connected => EventKind::Connected,
            XmrEvent::Disconnected => EventKind::Disconnected,
            XmrEvent::Error(_) => EventKind::Error,
            XmrEvent::StatusChange(_) => EventKind::StatusChange,
            XmrEvent::CollectNow => EventKind::CollectNow,
            XmrEvent::ScreenShot => EventKind::ScreenShot,
            XmrEvent::LicenceCheck => EventKind::LicenceCheck,
            XmrEvent::ShowStatusWindow(_) => EventKind::ShowStatusWindow,
            XmrEvent::ForceUpdateChromeOS => EventKind::ForceUpdateChromeOS,
            XmrEvent::CriteriaUpdate(_) => EventKind::CriteriaUpdate,
            XmrEvent::CurrentGeoLocation => EventKind::CurrentGeoLocation,
        }
    }
}

impl From<InboundCommand> for XmrEvent {
    fn from(command: InboundCommand) -> Self {
        match command {
            InboundCommand::CollectNow => XmrEvent::CollectNow,
            InboundCommand::ScreenShot => XmrEvent::ScreenShot,
            InboundCommand::LicenceCheck => XmrEvent::LicenceCheck,
            InboundCommand::ShowStatusWindow { timeout_seconds } => {
                XmrEvent::ShowStatusWindow(timeout_seconds)
            }
            InboundCommand::ForceUpdateChromeOS => XmrEvent::ForceUpdateChromeOS,
            InboundCommand::CurrentGeoLocation => XmrEvent::CurrentGeoLocation,
            InboundCommand::CriteriaUpdate(updates) => XmrEvent::CriteriaUpdate(updates),
        }
    }
}

type Handler = Arc<dyn Fn(&XmrEvent) + Send + Sync>;

struct Registry {
    handlers: DashMap<EventKind, Vec<(u64, Handler)>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let removed = match self.handlers.get_mut(&kind) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|(handler_id, _)| *handler_id != id);
                entry.len() != before
            }
            None => false,
        };

        if removed {
            self.handlers.remove_if(&kind, |_, handlers| handlers.is_empty());
        }
        removed
    }
}

/// Typed publish/subscribe hub.
///
/// Cloning is cheap; clones share the same handlers and broadcast stream.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    sender: broadcast::Sender<XmrEvent>,
}

impl EventBus {
    /// Create a new bus with the default broadcast capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a new bus with a specific broadcast capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: Arc::new(Registry {
                handlers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
            sender,
        }
    }

    /// Register a handler for one kind of event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&XmrEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        trace!(event = %kind, handler = id, "Handler registered");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Register a handler for `error` events.
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let XmrEvent::Error(message) = event {
                handler(message);
            }
        })
    }

    /// Register a handler for `statusChange` events.
    pub fn on_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::StatusChange, move |event| {
            if let XmrEvent::StatusChange(at) = event {
                handler(at);
            }
        })
    }

    /// Register a handler for `showStatusWindow` events.
    pub fn on_show_status_window<F>(&self, handler: F) -> Subscription
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.on(EventKind::ShowStatusWindow, move |event| {
            if let XmrEvent::ShowStatusWindow(timeout) = event {
                handler(*timeout);
            }
        })
    }

    /// Register a handler for `criteriaUpdate` events.
    pub fn on_criteria_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[CriteriaUpdate]) + Send + Sync + 'static,
    {
        self.on(EventKind::CriteriaUpdate, move |event| {
            if let XmrEvent::CriteriaUpdate(updates) = event {
                handler(updates);
            }
        })
    }

    /// Receive every event asynchronously.
    ///
    /// A receiver that falls more than the bus capacity behind skips the
    /// oldest events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<XmrEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of handlers that ran.
    pub fn emit(&self, event: XmrEvent) -> usize {
        let kind = event.kind();

        // Snapshot so handlers can (un)subscribe while running.
        let handlers: Vec<Handler> = self
            .registry
            .handlers
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(&event);
        }

        trace!(event = %kind, handlers = handlers.len(), "Event emitted");

        // No receivers is fine.
        let _ = self.sender.send(event);

        handlers.len()
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry
            .handlers
            .get(&kind)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.registry.handlers.len())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::on`]; removes the handler when asked.
#[must_use = "dropping a Subscription keeps the handler registered; call unsubscribe() to remove it"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// The event kind this handler listens to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler.
    ///
    /// Returns `false` if it was already gone or the bus no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.kind, self.id),
            None => false,
        }
    }
}

//! Connection manager.
//!
//! [`ConnectionManager`] owns the one transport a client may have, the
//! connection target and the liveness state. It is a plain state machine:
//! every method runs to completion, and transport activity is fed back in
//! through [`ConnectionManager::handle_transport_event`]. Driving it from a
//! single task is what keeps transitions from interleaving.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use xmr_protocol::{decode, encode, Decoded, OutboundFrame};
use xmr_transport::{
    event_channel, ConnectionId, Connector, EventSink, ReadyState, Transport, TransportEvent,
    TransportEventReceiver, TransportEventSender,
};

use crate::channel::{validate_channel, ConnectionTarget, DISABLED_URL};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::events::{EventBus, XmrEvent};

/// Error message published when a transport cannot be opened.
pub const CONNECT_FAILED: &str = "Failed to connect";

/// Error message published when the transport reports an error.
pub const TRANSPORT_ERROR: &str = "error";

/// Error message published when the init frame cannot be sent.
pub const INIT_FAILED: &str = "Failed to initialise";

/// Credential the watchdog uses when none was ever given.
pub const FALLBACK_CREDENTIAL: &str = "n/a";

/// Liveness state of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// The host asked for a connection.
    pub connection_wanted: bool,
    /// The transport is open and the init frame went out.
    pub connected: bool,
    /// When the last frame, heartbeats included, arrived.
    pub last_message_at: DateTime<Utc>,
}

impl ConnectionState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            connection_wanted: false,
            connected: false,
            // A year back, so a fresh client is never active.
            last_message_at: now - TimeDelta::days(365),
        }
    }
}

/// A read-only view of a manager, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub channel: String,
    pub url: Option<String>,
    pub connection_wanted: bool,
    pub connected: bool,
    pub active: bool,
    pub last_message_at: DateTime<Utc>,
}

/// Owns the transport and its lifecycle.
pub struct ConnectionManager {
    channel: String,
    target: ConnectionTarget,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    connector: Arc<dyn Connector>,
    events: TransportEventSender,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    liveness_window: TimeDelta,
}

impl ConnectionManager {
    /// Create a manager for `channel`.
    ///
    /// The returned receiver carries the events of every transport this
    /// manager opens; feed them back through
    /// [`handle_transport_event`](Self::handle_transport_event).
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        connector: Arc<dyn Connector>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> (Self, TransportEventReceiver) {
        let (events, receiver) = event_channel();
        let state = ConnectionState::new(clock.now());

        let manager = Self {
            channel: channel.into(),
            target: ConnectionTarget::default(),
            state,
            transport: None,
            connector,
            events,
            bus,
            clock,
            liveness_window: config.liveness_window(),
        };

        (manager, receiver)
    }

    /// The channel this client serves.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The last requested target.
    #[must_use]
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Current liveness state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The bus events are published on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Whether a transport currently exists.
    #[must_use]
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Connected, and traffic arrived within the liveness window.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.connected && self.clock.now() - self.state.last_message_at < self.liveness_window
    }

    /// Snapshot for status reporting.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            channel: self.channel.clone(),
            url: self.target.url.clone(),
            connection_wanted: self.state.connection_wanted,
            connected: self.state.connected,
            active: self.is_active(),
            last_message_at: self.state.last_message_at,
        }
    }

    /// Ask for a connection to `url`, authenticating with `credential`.
    ///
    /// `url == "DISABLED"` withdraws the request instead. A repeat call for
    /// the URL of an active connection only swaps the credential.
    pub fn start(&mut self, url: &str, credential: &str) {
        if let Err(reason) = validate_channel(&self.channel) {
            error!(channel = %self.channel, reason, "Channel unknown, XMR will be disabled");
            return;
        }

        if url == DISABLED_URL {
            info!(channel = %self.channel, "XMR disabled");
            self.state.connection_wanted = false;
            if self.transport.is_some() {
                self.stop();
            }
            return;
        }

        self.state.connection_wanted = true;

        if self.is_active() && self.target.url.as_deref() == Some(url) {
            debug!(channel = %self.channel, url = %url, "Already connected to this URL");
            self.target.credential = Some(credential.to_string());
            return;
        }

        if self.transport.is_some() {
            debug!(
                channel = %self.channel,
                connected = self.state.connected,
                "Replacing transport: not active, or a different URL"
            );
            self.stop();
        } else {
            debug!(channel = %self.channel, "Not connected yet");
        }

        self.target = ConnectionTarget {
            url: Some(url.to_string()),
            credential: Some(credential.to_string()),
        };

        let id = ConnectionId::generate();
        debug!(channel = %self.channel, url = %url, connection = %id, "Connecting");

        match self
            .connector
            .connect(url, EventSink::new(id, self.events.clone()))
        {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => {
                debug!(channel = %self.channel, url = %url, error = %e, "Failed connecting");
                self.bus.emit(XmrEvent::Error(CONNECT_FAILED.to_string()));
            }
        }
    }

    /// Close the transport, if there is one. Safe to call repeatedly.
    pub fn stop(&mut self) {
        debug!(channel = %self.channel, "Stop");

        if let Some(mut transport) = self.transport.take() {
            debug!(connection = %transport.id(), "Closing active transport");
            transport.close();

            // The retired transport's own close event will be ignored.
            if std::mem::replace(&mut self.state.connected, false) {
                self.bus.emit(XmrEvent::Disconnected);
            }
        }
    }

    /// Periodic supervision: reconnect if a wanted connection is not active.
    ///
    /// Returns `true` if a reconnect was attempted.
    pub fn watchdog_tick(&mut self) -> bool {
        if !self.state.connection_wanted || self.is_active() {
            trace!(channel = %self.channel, "Watchdog: nothing to do");
            return false;
        }

        debug!(channel = %self.channel, "Watchdog: should be active");

        let url = self
            .target
            .url
            .clone()
            .unwrap_or_else(|| DISABLED_URL.to_string());
        let credential = self
            .target
            .credential
            .clone()
            .unwrap_or_else(|| FALLBACK_CREDENTIAL.to_string());

        self.start(&url, &credential);
        true
    }

    /// Apply one event reported by a transport.
    ///
    /// Events from any transport other than the current one are dropped.
    pub fn handle_transport_event(&mut self, id: ConnectionId, event: TransportEvent) {
        let current = self
            .transport
            .as_ref()
            .is_some_and(|transport| transport.id() == &id);

        if !current {
            trace!(connection = %id, ?event, "Ignoring event from retired transport");
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Close => self.on_close(),
            TransportEvent::Error(message) => self.on_error(&message),
            TransportEvent::Message(text) => self.on_message(&text),
        }
    }

    fn on_open(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        debug!(connection = %transport.id(), "open");

        if transport.ready_state() != ReadyState::Open {
            info!(connection = %transport.id(), "open: not open yet");
            return;
        }

        let frame = OutboundFrame::init(self.target.credential.clone(), self.channel.clone());
        let sent = encode(&frame)
            .map_err(|e| e.to_string())
            .and_then(|text| transport.send_text(text).map_err(|e| e.to_string()));

        if let Err(e) = sent {
            warn!(channel = %self.channel, error = %e, "Failed to send init frame");
            self.bus.emit(XmrEvent::Error(INIT_FAILED.to_string()));
            return;
        }

        self.state.connected = true;
        self.bus.emit(XmrEvent::Connected);
    }

    fn on_close(&mut self) {
        debug!(channel = %self.channel, "close");

        self.transport = None;
        self.state.connected = false;
        self.bus.emit(XmrEvent::Disconnected);
    }

    fn on_error(&mut self, message: &str) {
        debug!(channel = %self.channel, error = %message, "error");

        self.bus.emit(XmrEvent::Error(TRANSPORT_ERROR.to_string()));
    }

    fn on_message(&mut self, text: &str) {
        let now = self.clock.now();
        self.state.last_message_at = now;
        self.bus.emit(XmrEvent::StatusChange(
            now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ));

        match decode(text, now) {
            Ok(Decoded::Heartbeat) => {
                debug!(channel = %self.channel, "Heartbeat...");
            }
            Ok(Decoded::Expired { action, expires_at }) => {
                debug!(action = %action, %expires_at, "Message expired");
            }
            Ok(Decoded::Command(command)) => {
                debug!(action = command.name(), "Dispatching command");
                self.bus.emit(command.into());
            }
            Ok(Decoded::Unknown { action }) => {
                error!(action = %action, "Unknown action");
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Dropping malformed message");
            }
        }
    }
}

//! Transport abstraction traits for XMR.
//!
//! A [`Connector`] opens a [`Transport`] to a relay URL. Opening is
//! fire-and-forget: the outcome, and everything that happens afterwards,
//! arrives as [`TransportEvent`]s on the [`EventSink`] handed to the
//! connector, tagged with the transport's [`ConnectionId`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc;

/// Per-process counter so IDs stay unique within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{}", timestamp, counter))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a transport, mirroring the WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    /// Decode a state stored as its `u8` discriminant.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport finished connecting.
    Open,
    /// The transport closed, cleanly or not.
    Close,
    /// The transport reported an error. A `Close` usually follows.
    Error(String),
    /// A text frame arrived.
    Message(String),
}

/// Sending half of the shared transport event channel.
pub type TransportEventSender = mpsc::UnboundedSender<(ConnectionId, TransportEvent)>;

/// Receiving half of the shared transport event channel.
pub type TransportEventReceiver = mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>;

/// Create the channel every transport of one client reports into.
#[must_use]
pub fn event_channel() -> (TransportEventSender, TransportEventReceiver) {
    mpsc::unbounded_channel()
}

/// Where one transport reports its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ConnectionId,
    tx: TransportEventSender,
}

impl EventSink {
    /// Create a sink that tags every event with `id`.
    #[must_use]
    pub fn new(id: ConnectionId, tx: TransportEventSender) -> Self {
        Self { id, tx }
    }

    /// The transport this sink belongs to.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Report an event. Returns `false` once nobody is listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.id.clone(), event)).is_ok()
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay URL cannot be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The transport is not open.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// No async runtime to drive the transport.
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Opens transports to a relay.
pub trait Connector: Send + Sync {
    /// Start opening a transport to `url`.
    ///
    /// Returns as soon as the attempt is underway; `Open`, `Error` and
    /// `Close` are reported later through `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt cannot even be started, e.g. the
    /// URL is malformed. No events are emitted in that case.
    fn connect(&self, url: &str, sink: EventSink) -> Result<Box<dyn Transport>, TransportError>;

    /// Get the connector name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;
}

/// An open or opening transport owned by a single client.
pub trait Transport: Send {
    /// Get the transport's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Queue a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is not open.
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start closing the transport. Safe to call more than once.
    fn close(&mut self);

    /// Check if the transport is open.
    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_ready_state_roundtrip() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closing,
            ReadyState::Closed,
        ] {
            assert_eq!(ReadyState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_event_sink_tags_events() {
        let (tx, mut rx) = event_channel();
        let sink = EventSink::new("conn-a".into(), tx);

        assert!(sink.emit(TransportEvent::Open));
        assert_eq!(
            rx.try_recv().unwrap(),
            (ConnectionId::from("conn-a"), TransportEvent::Open)
        );

        drop(rx);
        assert!(!sink.emit(TransportEvent::Close));
    }
}

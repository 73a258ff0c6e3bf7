//! In-memory transport.
//!
//! [`MemoryConnector`] never touches the network. Every connect attempt
//! creates a [`MemoryPeer`] which plays the relay's side: it decides when
//! the transport opens, pushes frames, raises errors and closes, and it
//! records what the client sent.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::traits::{
    Connector, ConnectionId, EventSink, ReadyState, Transport, TransportError, TransportEvent,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ConnectorState {
    peers: Vec<MemoryPeer>,
    refuse: bool,
}

/// A connector whose transports are driven by the caller.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<Mutex<ConnectorState>>,
}

impl MemoryConnector {
    /// Create a new connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connect attempts fail synchronously.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.inner).refuse = refuse;
    }

    /// Number of transports created so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        lock(&self.inner).peers.len()
    }

    /// All peers, oldest first.
    #[must_use]
    pub fn peers(&self) -> Vec<MemoryPeer> {
        lock(&self.inner).peers.clone()
    }

    /// The most recently created peer.
    #[must_use]
    pub fn last_peer(&self) -> Option<MemoryPeer> {
        lock(&self.inner).peers.last().cloned()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str, sink: EventSink) -> Result<Box<dyn Transport>, TransportError> {
        let mut inner = lock(&self.inner);
        if inner.refuse {
            return Err(TransportError::Other(format!("refused: {}", url)));
        }

        let shared = Arc::new(PeerShared {
            state: AtomicU8::new(ReadyState::Connecting as u8),
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        });

        inner.peers.push(MemoryPeer {
            url: url.to_string(),
            sink: sink.clone(),
            shared: shared.clone(),
        });

        Ok(Box::new(MemoryTransport { sink, shared }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
struct PeerShared {
    state: AtomicU8,
    sent: Mutex<Vec<String>>,
    close_calls: AtomicUsize,
}

impl PeerShared {
    fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// The relay side of one in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    url: String,
    sink: EventSink,
    shared: Arc<PeerShared>,
}

impl MemoryPeer {
    /// The transport's ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        self.sink.id()
    }

    /// The URL the client connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Frames the client sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        lock(&self.shared.sent).clone()
    }

    /// How many times the client called `close`.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }

    /// Current state as seen by the client.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Complete the connection.
    pub fn open(&self) {
        self.shared.set_state(ReadyState::Open);
        self.sink.emit(TransportEvent::Open);
    }

    /// Push a text frame to the client.
    pub fn message(&self, text: impl Into<String>) {
        self.sink.emit(TransportEvent::Message(text.into()));
    }

    /// Raise a transport error.
    pub fn error(&self, message: impl Into<String>) {
        self.sink.emit(TransportEvent::Error(message.into()));
    }

    /// Close from the relay side.
    pub fn close(&self) {
        self.shared.set_state(ReadyState::Closed);
        self.sink.emit(TransportEvent::Close);
    }

    /// Emit an arbitrary event without touching the state.
    pub fn emit(&self, event: TransportEvent) {
        self.sink.emit(event);
    }
}

/// The client side of an in-memory transport.
struct MemoryTransport {
    sink: EventSink,
    shared: Arc<PeerShared>,
}

impl Transport for MemoryTransport {
    fn id(&self) -> &ConnectionId {
        self.sink.id()
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.shared.state() != ReadyState::Open {
            return Err(TransportError::ConnectionClosed);
        }
        lock(&self.shared.sent).push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.state() != ReadyState::Closed {
            self.shared.set_state(ReadyState::Closed);
            self.sink.emit(TransportEvent::Close);
        }
    }
}

//! # xmr-transport
//!
//! Client transport layer for the XMR push channel.
//!
//! - **WebSocket** - tokio-tungstenite client, the production transport
//! - **Memory** - caller-driven transport for tests and embedding
//!
//! ## Transport Abstraction
//!
//! Opening a transport never blocks. Everything a transport does is
//! reported as a [`TransportEvent`] tagged with its [`ConnectionId`], so one
//! owner can serialise the events of every transport it ever opened.
//!
//! ```rust,ignore
//! use xmr_transport::{event_channel, ConnectionId, Connector, EventSink, WebSocketConnector};
//!
//! let (tx, mut rx) = event_channel();
//! let sink = EventSink::new(ConnectionId::generate(), tx);
//! let transport = WebSocketConnector::default().connect("ws://relay:9505", sink)?;
//!
//! while let Some((id, event)) = rx.recv().await {
//!     // React to Open / Message / Error / Close
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use memory::{MemoryConnector, MemoryPeer};
pub use traits::{
    event_channel, Connector, ConnectionId, EventSink, ReadyState, Transport, TransportError,
    TransportEvent, TransportEventReceiver, TransportEventSender,
};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector};

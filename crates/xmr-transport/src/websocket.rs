//! WebSocket client transport implementation.
//!
//! This module provides a WebSocket-based transport using tokio-tungstenite.
//! Each transport runs in its own task and only talks to its owner through
//! the [`EventSink`] and an outbound queue.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as TungsteniteConfig;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, warn};

use crate::traits::{
    Connector, ConnectionId, EventSink, ReadyState, Transport, TransportError, TransportEvent,
};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// How long the TCP + WebSocket handshake may take.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64 KB
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens WebSocket transports.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Create a new connector.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

/// Check that `url` names a WebSocket endpoint.
///
/// # Errors
///
/// Returns an error for any scheme other than `ws` or `wss`.
pub fn validate_url(url: &str) -> Result<(), TransportError> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(TransportError::InvalidUrl(format!(
            "{}: expected ws:// or wss://",
            url
        )))
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str, sink: EventSink) -> Result<Box<dyn Transport>, TransportError> {
        validate_url(url)?;
        let request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let runtime = Handle::try_current().map_err(|e| TransportError::Runtime(e.to_string()))?;

        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        debug!(connection = %sink.id(), url = %url, "Opening WebSocket");

        let task = runtime.spawn(run_connection(
            request,
            sink.clone(),
            state.clone(),
            outbound_rx,
            self.config.clone(),
        ));

        Ok(Box::new(WebSocketTransport {
            sink,
            state,
            outbound: outbound_tx,
            task,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Work queued for the connection task.
enum Outbound {
    Text(String),
    Close,
}

/// A WebSocket client transport.
pub struct WebSocketTransport {
    sink: EventSink,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl Transport for WebSocketTransport {
    fn id(&self) -> &ConnectionId {
        self.sink.id()
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::ConnectionClosed);
        }

        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::SendFailed("connection task has ended".into()))
    }

    fn close(&mut self) {
        match self.ready_state() {
            ReadyState::Connecting => {
                // Nothing to hand-shake yet; cancel the connect attempt.
                self.task.abort();
                self.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
                self.sink.emit(TransportEvent::Close);
            }
            ReadyState::Open => {
                self.state.store(ReadyState::Closing as u8, Ordering::SeqCst);
                let _ = self.outbound.send(Outbound::Close);
            }
            ReadyState::Closing | ReadyState::Closed => {}
        }
    }
}

/// Drive one WebSocket connection until it closes.
async fn run_connection(
    request: Request,
    sink: EventSink,
    state: Arc<AtomicU8>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    config: WebSocketConfig,
) {
    let mut ws_config = TungsteniteConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);

    let connect = connect_async_with_config(request, Some(ws_config), false);
    let stream = match tokio::time::timeout(config.connect_timeout, connect).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            debug!(connection = %sink.id(), error = %e, "WebSocket connect failed");
            fail(&sink, &state, e.to_string());
            return;
        }
        Err(_) => {
            debug!(connection = %sink.id(), "WebSocket connect timed out");
            fail(&sink, &state, "Connection timed out".to_string());
            return;
        }
    };

    state.store(ReadyState::Open as u8, Ordering::SeqCst);
    sink.emit(TransportEvent::Open);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!(connection = %sink.id(), error = %e, "Failed to send frame");
                        fail(&sink, &state, e.to_string());
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!(connection = %sink.id(), "Closing WebSocket");
                    let _ = write.close().await;
                    state.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    sink.emit(TransportEvent::Close);
                    break;
                }
            },

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        sink.emit(TransportEvent::Message(text));
                    }
                    Err(_) => {
                        warn!(connection = %sink.id(), "Dropping non-UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        warn!(connection = %sink.id(), error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    debug!(connection = %sink.id(), "Received close frame");
                    state.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    sink.emit(TransportEvent::Close);
                    break;
                }
                Some(Err(WsError::ConnectionClosed)) | None => {
                    debug!(connection = %sink.id(), "WebSocket stream ended");
                    state.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    sink.emit(TransportEvent::Close);
                    break;
                }
                Some(Err(e)) => {
                    error!(connection = %sink.id(), error = %e, "WebSocket error");
                    fail(&sink, &state, e.to_string());
                    break;
                }
            },
        }
    }
}

/// Report an error followed by a close, the way browsers do.
fn fail(sink: &EventSink, state: &AtomicU8, message: String) {
    state.store(ReadyState::Closed as u8, Ordering::SeqCst);
    sink.emit(TransportEvent::Error(message));
    sink.emit(TransportEvent::Close);
}

//! Async client handle.
//!
//! [`XmrClient`] runs a [`ConnectionManager`] and its [`Watchdog`] on one
//! tokio task. Host calls, transport events and watchdog ticks all funnel
//! into that task's `select!` loop, so state transitions never overlap.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use xmr_transport::{Connector, TransportEventReceiver};

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::events::{EventBus, EventKind, Subscription, XmrEvent};
use crate::manager::{ConnectionManager, StatusSnapshot};
use crate::watchdog::Watchdog;

/// Host command queue depth.
const COMMAND_CAPACITY: usize = 64;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client task has shut down.
    #[error("Client has shut down")]
    Closed,
}

/// Requests from the host to the client task.
#[derive(Debug)]
enum Command {
    Start { url: String, credential: String },
    Stop,
    IsActive(oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<StatusSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running XMR client.
///
/// Dropping the handle aborts the client task, its watchdog included.
pub struct XmrClient {
    commands: mpsc::Sender<Command>,
    bus: EventBus,
    task: Option<JoinHandle<()>>,
}

impl XmrClient {
    /// Spawn a client for `channel` on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        channel: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Self {
        Self::spawn_with_clock(channel, connector, config, Arc::new(SystemClock))
    }

    /// Spawn a client that reads time from `clock`.
    #[must_use]
    pub fn spawn_with_clock(
        channel: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let channel = channel.into();
        let bus = EventBus::with_capacity(config.event_capacity);
        let (manager, transport_events) =
            ConnectionManager::new(channel.clone(), connector, bus.clone(), clock, &config);

        let (tick_tx, tick_rx) = mpsc::channel(1);
        let watchdog = Watchdog::spawn(config.watchdog_interval(), tick_tx);

        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        info!(
            channel = %channel,
            watchdog_secs = config.watchdog_interval().as_secs(),
            "Starting XMR client"
        );

        let task = tokio::spawn(run(manager, command_rx, transport_events, tick_rx, watchdog));

        Self {
            commands,
            bus,
            task: Some(task),
        }
    }

    /// Request a connection to `url`. See [`ConnectionManager::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the client has shut down.
    pub async fn start(
        &self,
        url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::Start {
            url: url.into(),
            credential: credential.into(),
        })
        .await
    }

    /// Close the current transport. The watchdog keeps running.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has shut down.
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.send(Command::Stop).await
    }

    /// Whether the connection is up and has seen recent traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has shut down.
    pub async fn is_active(&self) -> Result<bool, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::IsActive(tx)).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Current connection status.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has shut down.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// The event bus this client publishes on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Register a handler. Shorthand for `events().on(..)`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&XmrEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, handler)
    }

    /// Cancel the watchdog, close the transport and end the client task.
    ///
    /// # Errors
    ///
    /// Returns an error if the client had already shut down.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }
}

impl Drop for XmrClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The client event loop.
async fn run(
    mut manager: ConnectionManager,
    mut commands: mpsc::Receiver<Command>,
    mut transport_events: TransportEventReceiver,
    mut ticks: mpsc::Receiver<()>,
    watchdog: Watchdog,
) {
    let mut shutdown_ack = None;

    loop {
        tokio::select! {
            biased;

            // Transport events first, so a host query sees every event
            // that was already queued.
            Some((id, event)) = transport_events.recv() => {
                manager.handle_transport_event(id, event);
            }

            Some(()) = ticks.recv() => {
                manager.watchdog_tick();
            }

            command = commands.recv() => match command {
                Some(Command::Start { url, credential }) => manager.start(&url, &credential),
                Some(Command::Stop) => manager.stop(),
                Some(Command::IsActive(reply)) => {
                    let _ = reply.send(manager.is_active());
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(manager.snapshot());
                }
                Some(Command::Shutdown(reply)) => {
                    shutdown_ack = Some(reply);
                    break;
                }
                None => break,
            },
        }
    }

    watchdog.cancel();
    manager.stop();
    debug!(channel = %manager.channel(), "XMR client stopped");

    if let Some(reply) = shutdown_ack {
        let _ = reply.send(());
    }
}

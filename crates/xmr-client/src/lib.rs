//! # xmr-client
//!
//! Persistent push-channel client for the XMR relay.
//!
//! This crate provides the moving parts of a client:
//!
//! - **EventBus** - Typed publish/subscribe for host notifications
//! - **ConnectionManager** - Transport lifecycle and liveness state
//! - **Watchdog** - Periodic re-check that revives stale connections
//! - **XmrClient** - Async handle running all of the above on one task
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ start/stop ┌───────────────────┐  connect  ┌─────────────┐
//! │    Host     │───────────▶│ ConnectionManager │──────────▶│  Transport  │
//! └─────────────┘            └───────────────────┘◀──────────└─────────────┘
//!        ▲                      ▲            │       events
//!        │                 tick │            │ decoded commands
//!        │               ┌──────────┐        ▼
//!        └───────────────│ Watchdog │   ┌──────────┐
//!           on(..)       └──────────┘   │ EventBus │
//!                                       └──────────┘
//! ```

pub mod channel;
pub mod client;
pub mod clock;
pub mod config;
pub mod events;
pub mod manager;
pub mod watchdog;

pub use channel::{ConnectionTarget, DISABLED_URL, UNKNOWN_CHANNEL};
pub use client::{ClientError, XmrClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use events::{EventBus, EventKind, Subscription, XmrEvent};
pub use manager::{ConnectionManager, ConnectionState, StatusSnapshot};
pub use watchdog::Watchdog;

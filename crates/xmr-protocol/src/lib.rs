//! # xmr-protocol
//!
//! Wire protocol definitions for the XMR push channel.
//!
//! The relay pushes JSON envelopes and a bare `"H"` heartbeat over a text
//! transport. This crate defines those frames, the outbound `init` frame,
//! and the decoder that turns a frame into an [`InboundCommand`].
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use xmr_protocol::{decode, Decoded, InboundCommand};
//!
//! let frame = format!(
//!     r#"{{"action":"collectNow","createdDt":"{}","ttl":60}}"#,
//!     Utc::now().to_rfc3339()
//! );
//! let decoded = decode(&frame, Utc::now()).unwrap();
//! assert_eq!(decoded, Decoded::Command(InboundCommand::CollectNow));
//! ```

pub mod codec;
pub mod command;
pub mod decoder;
pub mod frames;

pub use codec::{encode, ProtocolError};
pub use command::InboundCommand;
pub use decoder::{decode, Decoded};
pub use frames::{CriteriaUpdate, OutboundFrame, RawEnvelope, Ttl, HEARTBEAT};

//! Codec for XMR text frames.
//!
//! Frames are JSON documents carried in WebSocket text messages.

use thiserror::Error;

use crate::frames::{OutboundFrame, RawEnvelope, HEARTBEAT};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required envelope field is missing.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// `createdDt` could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// `ttl` is not a number of seconds.
    #[error("Invalid ttl: {0}")]
    InvalidTtl(String),

    /// `criteriaUpdates` does not have the expected shape.
    #[error("Invalid criteria updates: {0}")]
    InvalidCriteria(serde_json::Error),
}

/// Encode an outbound frame to its JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(frame: &OutboundFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Check whether a text frame is the heartbeat marker.
#[must_use]
pub fn is_heartbeat(text: &str) -> bool {
    text == HEARTBEAT
}

/// Parse a text frame into a raw envelope.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object of the envelope shape.
pub fn parse_envelope(text: &str) -> Result<RawEnvelope, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

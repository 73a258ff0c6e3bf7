//! Frame types for the XMR protocol.
//!
//! Everything on the wire is a JSON text frame, except the heartbeat which
//! is the bare string [`HEARTBEAT`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Literal heartbeat frame sent by the relay.
pub const HEARTBEAT: &str = "H";

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    /// Initialisation frame sent as soon as the transport opens.
    #[serde(rename = "init")]
    Init {
        /// Credential authenticating the channel.
        key: Option<String>,
        /// The channel this client listens on.
        channel: String,
    },
}

impl OutboundFrame {
    /// Create a new Init frame.
    #[must_use]
    pub fn init(key: Option<String>, channel: impl Into<String>) -> Self {
        OutboundFrame::Init {
            key,
            channel: channel.into(),
        }
    }
}

/// Time-to-live as sent by the relay.
///
/// Some relays send the TTL as a number, others as a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ttl {
    Number(serde_json::Number),
    Text(String),
}

impl Ttl {
    /// TTL in whole seconds, if it can be read as an integer.
    ///
    /// Fractional values are truncated and strings are read up to the first
    /// non-digit, so `"300s"` yields 300.
    #[must_use]
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Ttl::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Ttl::Text(s) => leading_integer(s),
        }
    }
}

/// One entry of a `criteriaUpdate` envelope.
///
/// Entries are handed to the host as sent: `value` keeps its JSON type and
/// keys other than the three known ones are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaUpdate {
    /// Metric name.
    pub metric: String,
    /// New value for the metric, string or number.
    pub value: Value,
    /// How long the value stays valid, in seconds.
    pub ttl: Ttl,
    /// Any other keys of the entry.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CriteriaUpdate {
    /// Create an entry with no extra keys.
    #[must_use]
    pub fn new(metric: impl Into<String>, value: impl Into<Value>, ttl_seconds: i64) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
            ttl: Ttl::Number(ttl_seconds.into()),
            extra: Map::new(),
        }
    }
}

/// An inbound command envelope before decoding.
///
/// All fields are optional at this level; the decoder decides which
/// missing fields are fatal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    /// Action name.
    #[serde(default)]
    pub action: Option<String>,
    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub created_dt: Option<String>,
    /// Seconds after `created_dt` at which the message expires.
    #[serde(default)]
    pub ttl: Option<Ttl>,
    /// Pipe-delimited command code for `commandAction` envelopes.
    #[serde(default)]
    pub command_code: Option<String>,
    /// Criteria list, only read for `criteriaUpdate` envelopes.
    #[serde(default)]
    pub criteria_updates: Option<serde_json::Value>,
}

impl RawEnvelope {
    /// The action name, or an empty string when absent.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or_default()
    }
}

/// Read the integer at the start of `s`, ignoring leading whitespace.
pub(crate) fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_frame_shape() {
        let frame = OutboundFrame::init(Some("secret".into()), "player-1");
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "init", "key": "secret", "channel": "player-1"})
        );
    }

    #[test]
    fn test_init_frame_without_key() {
        let frame = OutboundFrame::init(None, "player-1");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["key"], serde_json::Value::Null);
    }

    #[test]
    fn test_ttl_variants() {
        let ttl: Ttl = serde_json::from_str("120").unwrap();
        assert_eq!(ttl.seconds(), Some(120));

        let ttl: Ttl = serde_json::from_str("12.9").unwrap();
        assert_eq!(ttl.seconds(), Some(12));

        let ttl: Ttl = serde_json::from_str("\"300s\"").unwrap();
        assert_eq!(ttl.seconds(), Some(300));

        let ttl: Ttl = serde_json::from_str("\"never\"").unwrap();
        assert_eq!(ttl.seconds(), None);
    }

    #[test]
    fn test_criteria_update_keeps_value_type_and_extra_keys() {
        let update: CriteriaUpdate = serde_json::from_str(
            r#"{"metric":"temp","value":20,"ttl":"60","unit":"C"}"#,
        )
        .unwrap();
        assert_eq!(update.value, serde_json::json!(20));
        assert_eq!(update.ttl.seconds(), Some(60));
        assert_eq!(update.extra["unit"], "C");

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"metric": "temp", "value": 20, "ttl": "60", "unit": "C"})
        );
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("45"), Some(45));
        assert_eq!(leading_integer("  7abc"), Some(7));
        assert_eq!(leading_integer("-3"), Some(-3));
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("abc"), None);
    }

    #[test]
    fn test_envelope_camel_case() {
        let env: RawEnvelope = serde_json::from_str(
            r#"{"action":"commandAction","createdDt":"2024-01-01T00:00:00Z","ttl":60,"commandCode":"showStatusWindow|10"}"#,
        )
        .unwrap();
        assert_eq!(env.action(), "commandAction");
        assert_eq!(env.command_code.as_deref(), Some("showStatusWindow|10"));
        assert!(env.criteria_updates.is_none());
    }
}

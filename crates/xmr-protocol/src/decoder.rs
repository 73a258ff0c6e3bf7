//! Inbound frame decoding.
//!
//! Turns one text frame into a [`Decoded`] outcome: a heartbeat, a command,
//! or a reason the frame produced nothing. Expired envelopes never yield a
//! command, whatever their action.

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::codec::{self, ProtocolError};
use crate::command::{actions, command_codes, InboundCommand, DEFAULT_STATUS_WINDOW_TIMEOUT};
use crate::frames::{leading_integer, CriteriaUpdate, RawEnvelope};

/// Timestamp layouts accepted besides RFC 3339. Naive layouts are read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// The outcome of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The relay heartbeat.
    Heartbeat,
    /// A well-formed envelope whose TTL has elapsed.
    Expired {
        action: String,
        expires_at: DateTime<Utc>,
    },
    /// A command to dispatch.
    Command(InboundCommand),
    /// A live envelope with an action this client does not handle.
    Unknown { action: String },
}

/// Decode a text frame received at `now`.
///
/// # Errors
///
/// Returns an error if the frame is not valid JSON, lacks a usable
/// `createdDt` or `ttl`, or carries a malformed criteria list.
pub fn decode(frame: &str, now: DateTime<Utc>) -> Result<Decoded, ProtocolError> {
    if codec::is_heartbeat(frame) {
        return Ok(Decoded::Heartbeat);
    }

    let envelope = codec::parse_envelope(frame)?;
    let expires_at = expires_at(&envelope)?;

    if expires_at < now {
        return Ok(Decoded::Expired {
            action: envelope.action().to_string(),
            expires_at,
        });
    }

    let action = envelope.action().to_string();
    Ok(match dispatch(envelope)? {
        Some(command) => Decoded::Command(command),
        None => Decoded::Unknown { action },
    })
}

/// Compute `createdDt + ttl` for an envelope.
///
/// # Errors
///
/// Returns an error if either field is missing or unreadable.
pub fn expires_at(envelope: &RawEnvelope) -> Result<DateTime<Utc>, ProtocolError> {
    // A frame whose expiry cannot be computed is never dispatched.
    let created = envelope
        .created_dt
        .as_deref()
        .ok_or(ProtocolError::MissingField("createdDt"))?;
    let created = parse_timestamp(created)?;

    let ttl = envelope
        .ttl
        .as_ref()
        .ok_or(ProtocolError::MissingField("ttl"))?;
    let seconds = ttl
        .seconds()
        .ok_or_else(|| ProtocolError::InvalidTtl(format!("{:?}", ttl)))?;

    TimeDelta::try_seconds(seconds)
        .and_then(|delta| created.checked_add_signed(delta))
        .ok_or_else(|| ProtocolError::InvalidTtl(seconds.to_string()))
}

/// Parse an ISO 8601 timestamp as sent in `createdDt`.
///
/// # Errors
///
/// Returns an error if no accepted layout matches.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ProtocolError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ProtocolError::InvalidTimestamp(s.to_string()))
}

/// Map a live envelope to its command. First match wins.
fn dispatch(envelope: RawEnvelope) -> Result<Option<InboundCommand>, ProtocolError> {
    let code = envelope.command_code.as_deref().unwrap_or_default();

    let command = match envelope.action() {
        actions::COLLECT_NOW => Some(InboundCommand::CollectNow),
        actions::SCREEN_SHOT => Some(InboundCommand::ScreenShot),
        actions::LICENCE_CHECK => Some(InboundCommand::LicenceCheck),
        actions::COMMAND_ACTION if code.starts_with(command_codes::SHOW_STATUS_WINDOW) => {
            Some(InboundCommand::ShowStatusWindow {
                timeout_seconds: status_window_timeout(code),
            })
        }
        actions::COMMAND_ACTION if code.starts_with(command_codes::FORCE_UPDATE_CHROME_OS) => {
            Some(InboundCommand::ForceUpdateChromeOS)
        }
        actions::COMMAND_ACTION if code.starts_with(command_codes::CURRENT_GEO_LOCATION) => {
            Some(InboundCommand::CurrentGeoLocation)
        }
        actions::CRITERIA_UPDATE => Some(InboundCommand::CriteriaUpdate(criteria_updates(
            envelope.criteria_updates,
        )?)),
        _ => None,
    };

    Ok(command)
}

/// Timeout argument of a `showStatusWindow|<seconds>` command code.
fn status_window_timeout(code: &str) -> u64 {
    code.split('|')
        .nth(1)
        .and_then(leading_integer)
        .filter(|n| *n > 0)
        .map_or(DEFAULT_STATUS_WINDOW_TIMEOUT, |n| n as u64)
}

fn criteria_updates(value: Option<serde_json::Value>) -> Result<Vec<CriteriaUpdate>, ProtocolError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(ProtocolError::InvalidCriteria),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-03-01T12:00:00Z").unwrap()
    }

    fn envelope(extra: serde_json::Value) -> String {
        let mut base = json!({"createdDt": "2025-03-01T11:59:00Z", "ttl": 300});
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base.to_string()
    }

    fn command(extra: serde_json::Value) -> InboundCommand {
        match decode(&envelope(extra), now()).unwrap() {
            Decoded::Command(cmd) => cmd,
            other => panic!("Expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_heartbeat() {
        assert_eq!(decode("H", now()).unwrap(), Decoded::Heartbeat);
    }

    #[test]
    fn test_simple_actions() {
        assert_eq!(command(json!({"action": "collectNow"})), InboundCommand::CollectNow);
        assert_eq!(command(json!({"action": "screenShot"})), InboundCommand::ScreenShot);
        assert_eq!(command(json!({"action": "licenceCheck"})), InboundCommand::LicenceCheck);
    }

    #[test]
    fn test_show_status_window_timeout() {
        let cmd = command(json!({"action": "commandAction", "commandCode": "showStatusWindow|45"}));
        assert_eq!(cmd, InboundCommand::ShowStatusWindow { timeout_seconds: 45 });

        let cmd = command(json!({"action": "commandAction", "commandCode": "showStatusWindow"}));
        assert_eq!(cmd, InboundCommand::ShowStatusWindow { timeout_seconds: 60 });

        let cmd = command(json!({"action": "commandAction", "commandCode": "showStatusWindow|soon"}));
        assert_eq!(cmd, InboundCommand::ShowStatusWindow { timeout_seconds: 60 });

        let cmd = command(json!({"action": "commandAction", "commandCode": "showStatusWindow|0"}));
        assert_eq!(cmd, InboundCommand::ShowStatusWindow { timeout_seconds: 60 });
    }

    #[test]
    fn test_command_action_prefixes() {
        let cmd = command(json!({"action": "commandAction", "commandCode": "forceUpdateChromeOS|now"}));
        assert_eq!(cmd, InboundCommand::ForceUpdateChromeOS);

        let cmd = command(json!({"action": "commandAction", "commandCode": "currentGeoLocation"}));
        assert_eq!(cmd, InboundCommand::CurrentGeoLocation);
    }

    #[test]
    fn test_criteria_update_verbatim() {
        let cmd = command(json!({
            "action": "criteriaUpdate",
            "criteriaUpdates": [{"metric": "temp", "value": "20", "ttl": 60}]
        }));
        assert_eq!(
            cmd,
            InboundCommand::CriteriaUpdate(vec![CriteriaUpdate::new("temp", "20", 60)])
        );
    }

    #[test]
    fn test_criteria_update_numeric_value_and_extra_keys() {
        let cmd = command(json!({
            "action": "criteriaUpdate",
            "criteriaUpdates": [
                {"metric": "temp", "value": 20, "ttl": 60},
                {"metric": "zone", "value": "north", "ttl": 30, "source": "sensor-4"}
            ]
        }));
        let InboundCommand::CriteriaUpdate(updates) = cmd else {
            panic!("Expected criteria update, got {:?}", cmd);
        };
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], CriteriaUpdate::new("temp", 20, 60));
        assert_eq!(updates[1].value, json!("north"));
        assert_eq!(updates[1].extra["source"], "sensor-4");
    }

    #[test]
    fn test_criteria_update_without_list() {
        let cmd = command(json!({"action": "criteriaUpdate"}));
        assert_eq!(cmd, InboundCommand::CriteriaUpdate(Vec::new()));
    }

    #[test]
    fn test_expired_message_never_dispatches() {
        let frame = json!({
            "action": "collectNow",
            "createdDt": "2025-03-01T11:00:00Z",
            "ttl": 60
        })
        .to_string();

        match decode(&frame, now()).unwrap() {
            Decoded::Expired { action, expires_at } => {
                assert_eq!(action, "collectNow");
                assert_eq!(expires_at, parse_timestamp("2025-03-01T11:01:00Z").unwrap());
            }
            other => panic!("Expected Expired, got {:?}", other),
        }
    }

    #[test]
    fn test_expiry_boundary_is_live() {
        let frame = json!({
            "action": "screenShot",
            "createdDt": "2025-03-01T11:59:00Z",
            "ttl": "60"
        })
        .to_string();
        assert_eq!(
            decode(&frame, now()).unwrap(),
            Decoded::Command(InboundCommand::ScreenShot)
        );
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            decode(&envelope(json!({"action": "rekeyAction"})), now()).unwrap(),
            Decoded::Unknown {
                action: "rekeyAction".into()
            }
        );
        // Action names are case-sensitive.
        assert!(matches!(
            decode(&envelope(json!({"action": "CollectNow"})), now()).unwrap(),
            Decoded::Unknown { .. }
        ));
        // commandAction without a code matches nothing.
        assert!(matches!(
            decode(&envelope(json!({"action": "commandAction"})), now()).unwrap(),
            Decoded::Unknown { .. }
        ));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode("{oops", now()), Err(ProtocolError::Json(_))));
        assert!(matches!(
            decode(r#"{"action":"collectNow","ttl":60}"#, now()),
            Err(ProtocolError::MissingField("createdDt"))
        ));
        assert!(matches!(
            decode(r#"{"action":"collectNow","createdDt":"yesterday","ttl":60}"#, now()),
            Err(ProtocolError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            decode(
                r#"{"action":"collectNow","createdDt":"2025-03-01T11:59:00Z","ttl":"forever"}"#,
                now()
            ),
            Err(ProtocolError::InvalidTtl(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = parse_timestamp("2025-03-01T10:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2025-03-01T11:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T11:00:00.000+0100").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01 10:00:00").unwrap(), expected);
    }
}

//! Channel identity and connection target.

use serde::{Deserialize, Serialize};

/// Channel name that marks a client as unconfigured.
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// Relay URL that means "do not connect".
pub const DISABLED_URL: &str = "DISABLED";

/// Validate a channel name.
///
/// # Errors
///
/// Returns an error message if the client cannot use this channel.
pub fn validate_channel(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Channel name cannot be empty");
    }
    if name == UNKNOWN_CHANNEL {
        return Err("Channel is unknown");
    }
    Ok(())
}

/// Where the client connects and how it authenticates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Relay URL, or [`DISABLED_URL`].
    pub url: Option<String>,
    /// Credential sent in the init frame.
    pub credential: Option<String>,
}

impl ConnectionTarget {
    /// Check whether this target disables the connection.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.url.as_deref() == Some(DISABLED_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_channel() {
        assert!(validate_channel("player-7").is_ok());
        assert!(validate_channel("").is_err());
        assert!(validate_channel("unknown").is_err());
        // Only the exact sentinel is rejected.
        assert!(validate_channel("Unknown").is_ok());
    }

    #[test]
    fn test_disabled_target() {
        let target = ConnectionTarget {
            url: Some(DISABLED_URL.into()),
            credential: None,
        };
        assert!(target.is_disabled());
        assert!(!ConnectionTarget::default().is_disabled());
    }
}

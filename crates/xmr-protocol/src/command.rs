//! Commands carried by inbound envelopes.

use crate::frames::CriteriaUpdate;

/// Default status window timeout in seconds.
pub const DEFAULT_STATUS_WINDOW_TIMEOUT: u64 = 60;

/// Action names recognised on the wire.
pub mod actions {
    pub const COLLECT_NOW: &str = "collectNow";
    pub const SCREEN_SHOT: &str = "screenShot";
    pub const LICENCE_CHECK: &str = "licenceCheck";
    pub const COMMAND_ACTION: &str = "commandAction";
    pub const CRITERIA_UPDATE: &str = "criteriaUpdate";
}

/// Command code prefixes for `commandAction` envelopes.
pub mod command_codes {
    pub const SHOW_STATUS_WINDOW: &str = "showStatusWindow";
    pub const FORCE_UPDATE_CHROME_OS: &str = "forceUpdateChromeOS";
    pub const CURRENT_GEO_LOCATION: &str = "currentGeoLocation";
}

/// A decoded, non-expired command for the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    /// Collect from the CMS now.
    CollectNow,
    /// Take a screenshot.
    ScreenShot,
    /// Re-check the licence.
    LicenceCheck,
    /// Show the status window for the given number of seconds.
    ShowStatusWindow { timeout_seconds: u64 },
    /// Force a ChromeOS update.
    ForceUpdateChromeOS,
    /// Report the current geo location.
    CurrentGeoLocation,
    /// Update display criteria.
    CriteriaUpdate(Vec<CriteriaUpdate>),
}

impl InboundCommand {
    /// The event name this command is published under.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            InboundCommand::CollectNow => "collectNow",
            InboundCommand::ScreenShot => "screenShot",
            InboundCommand::LicenceCheck => "licenceCheck",
            InboundCommand::ShowStatusWindow { .. } => "showStatusWindow",
            InboundCommand::ForceUpdateChromeOS => "forceUpdateChromeOS",
            InboundCommand::CurrentGeoLocation => "currentGeoLocation",
            InboundCommand::CriteriaUpdate(_) => "criteriaUpdate",
        }
    }
}

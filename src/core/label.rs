//! Event labels emitted by detectors and their display strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default text shown when neither the label lookup nor the policy supplies one.
pub const DEFAULT_DISPLAY_TEXT: &str = "Protected Content";

/// Identifier naming which detector pattern fired.
///
/// The set is closed: every detector emits one of these and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLabel {
    Devtools,
    Screenshot,
    AiScreenshot,
    Clipboard,
    Ghosting,
    KeystrokeTamper,
    VpnDetected,
    InspectKey,
    InspectKeyCombo,
    ViewSourceAttempt,
    ContextMenuBlocked,
    MobileLongPressInspect,
    ZoomDevtoolsDetected,
}

impl EventLabel {
    /// Every label, in declaration order.
    pub const ALL: [EventLabel; 13] = [
        EventLabel::Devtools,
        EventLabel::Screenshot,
        EventLabel::AiScreenshot,
        EventLabel::Clipboard,
        EventLabel::Ghosting,
        EventLabel::KeystrokeTamper,
        EventLabel::VpnDetected,
        EventLabel::InspectKey,
        EventLabel::InspectKeyCombo,
        EventLabel::ViewSourceAttempt,
        EventLabel::ContextMenuBlocked,
        EventLabel::MobileLongPressInspect,
        EventLabel::ZoomDevtoolsDetected,
    ];

    /// Wire name of the label.
    pub fn as_str(self) -> &'static str {
        match self {
            EventLabel::Devtools => "devtools",
            EventLabel::Screenshot => "screenshot",
            EventLabel::AiScreenshot => "ai_screenshot",
            EventLabel::Clipboard => "clipboard",
            EventLabel::Ghosting => "ghosting",
            EventLabel::KeystrokeTamper => "keystroke_tamper",
            EventLabel::VpnDetected => "vpn_detected",
            EventLabel::InspectKey => "inspect_key",
            EventLabel::InspectKeyCombo => "inspect_key_combo",
            EventLabel::ViewSourceAttempt => "view_source_attempt",
            EventLabel::ContextMenuBlocked => "context_menu_blocked",
            EventLabel::MobileLongPressInspect => "mobile_long_press_inspect",
            EventLabel::ZoomDevtoolsDetected => "zoom_devtools_detected",
        }
    }

    /// Fixed display string for this label, if the lookup table has one.
    ///
    /// Inspect-family labels are intentionally absent and fall back to the
    /// configured watermark text.
    pub fn display_text(self) -> Option<&'static str> {
        match self {
            EventLabel::Screenshot => Some("Screenshot detected — Protected content"),
            EventLabel::AiScreenshot => Some("AI Screenshot Detection Triggered"),
            EventLabel::Devtools => Some("DevTools Detected"),
            EventLabel::Clipboard => Some("Copy Attempt Blocked"),
            EventLabel::Ghosting => Some("Ghost Keystroke Detected"),
            EventLabel::KeystrokeTamper => Some("Keystroke Tampering Detected"),
            EventLabel::VpnDetected => Some("VPN/Proxy Connection Identified"),
            _ => None,
        }
    }

    /// Human-readable form used in the lock message.
    ///
    /// Only the first underscore becomes a space (`keystroke tamper`,
    /// `inspect key_combo`).
    pub fn humanized(self) -> String {
        self.as_str().replacen('_', " ", 1)
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a string that is not a known label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event label: {}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for EventLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

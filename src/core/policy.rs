//! Security levels, their presets, and the override-wins policy merge.
//!
//! A [`Policy`] is always complete: every recognized flag carries a concrete
//! value. Callers express intent through a [`PartialPolicy`] whose present
//! keys replace the preset's keys one for one. Keys the schema does not know
//! are kept in `extras` for the presentation layer and never interpreted here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Named strictness level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl SecurityLevel {
    pub const ALL: [SecurityLevel; 3] = [SecurityLevel::Low, SecurityLevel::Medium, SecurityLevel::High];

    /// Resolve a level name, falling back to `Medium` for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "low" => SecurityLevel::Low,
            "medium" => SecurityLevel::Medium,
            "high" => SecurityLevel::High,
            other => {
                tracing::debug!(level = other, "unrecognized security level, using medium");
                SecurityLevel::Medium
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Low => "low",
            SecurityLevel::Medium => "medium",
            SecurityLevel::High => "high",
        }
    }

    /// The fixed preset for this level.
    pub fn preset(self) -> Policy {
        let strict = !matches!(self, SecurityLevel::Low);
        Policy {
            block_dev_tools: true,
            block_screenshot: strict,
            block_copy: strict,
            lock_on_suspicious: strict,
            auto_logout: self == SecurityLevel::High,
            noise_overlay: self == SecurityLevel::High,
            show_lock_overlay: strict,
            enable_watermark: strict,
            detect_vpn: strict,
            detect_keystroke_tamper: strict,
            block_inspect: false,
            detect_context_menu: true,
            detect_mobile: true,
            detect_zoom: true,
            show_unlock_button: true,
            watermark_text: None,
            extras: BTreeMap::new(),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved capability flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub block_dev_tools: bool,
    pub block_screenshot: bool,
    pub block_copy: bool,
    pub lock_on_suspicious: bool,
    pub auto_logout: bool,
    pub noise_overlay: bool,
    pub show_lock_overlay: bool,
    pub enable_watermark: bool,
    #[serde(rename = "detectVPN")]
    pub detect_vpn: bool,
    pub detect_keystroke_tamper: bool,
    /// Keyboard-shortcut, context-menu, long-press and zoom inspection intercepts
    pub block_inspect: bool,
    pub detect_context_menu: bool,
    pub detect_mobile: bool,
    pub detect_zoom: bool,
    pub show_unlock_button: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
    /// Unrecognized keys, passed through untouched
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl Policy {
    /// Shallow merge: every key present in `overrides` wins.
    pub fn merged(level: SecurityLevel, overrides: &PartialPolicy) -> Self {
        let mut policy = level.preset();
        overrides.apply_to(&mut policy);
        policy
    }
}

/// Merge the named level's preset with caller overrides.
///
/// Unknown level names resolve to `medium`.
pub fn merge_policy(level: &str, overrides: &PartialPolicy) -> Policy {
    Policy::merged(SecurityLevel::from_name(level), overrides)
}

/// Caller-supplied overrides. Absent keys keep the preset's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_dev_tools: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_screenshot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_copy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_on_suspicious: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_logout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_overlay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_lock_overlay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_watermark: Option<bool>,
    #[serde(default, rename = "detectVPN", skip_serializing_if = "Option::is_none")]
    pub detect_vpn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_keystroke_tamper: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_inspect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_context_menu: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_zoom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_unlock_button: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl PartialPolicy {
    fn apply_to(&self, policy: &mut Policy) {
        fn set(target: &mut bool, value: Option<bool>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut policy.block_dev_tools, self.block_dev_tools);
        set(&mut policy.block_screenshot, self.block_screenshot);
        set(&mut policy.block_copy, self.block_copy);
        set(&mut policy.lock_on_suspicious, self.lock_on_suspicious);
        set(&mut policy.auto_logout, self.auto_logout);
        set(&mut policy.noise_overlay, self.noise_overlay);
        set(&mut policy.show_lock_overlay, self.show_lock_overlay);
        set(&mut policy.enable_watermark, self.enable_watermark);
        set(&mut policy.detect_vpn, self.detect_vpn);
        set(&mut policy.detect_keystroke_tamper, self.detect_keystroke_tamper);
        set(&mut policy.block_inspect, self.block_inspect);
        set(&mut policy.detect_context_menu, self.detect_context_menu);
        set(&mut policy.detect_mobile, self.detect_mobile);
        set(&mut policy.detect_zoom, self.detect_zoom);
        set(&mut policy.show_unlock_button, self.show_unlock_button);

        if let Some(ref text) = self.watermark_text {
            policy.watermark_text = Some(text.clone());
        }
        for (key, value) in &self.extras {
            policy.extras.insert(key.clone(), value.clone());
        }
    }

    /// Apply a single `key=value` assignment, e.g. `blockCopy=false`.
    ///
    /// The value is parsed as JSON when possible and kept as a string
    /// otherwise, so `watermarkText=Internal` works without quoting.
    pub fn set_pair(&mut self, pair: &str) -> Result<(), PolicyError> {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| PolicyError::MalformedPair(pair.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(PolicyError::MalformedPair(pair.to_string()));
        }
        let value = serde_json::from_str::<Value>(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));

        let mut map = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(PolicyError::InvalidValue(e.to_string())),
        };
        map.insert(key.to_string(), value);

        *self = serde_json::from_value(Value::Object(map))
            .map_err(|e| PolicyError::InvalidValue(format!("{key}: {e}")))?;
        Ok(())
    }
}

/// Errors raised while building overrides from text.
#[derive(Debug)]
pub enum PolicyError {
    MalformedPair(String),
    InvalidValue(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::MalformedPair(p) => write!(f, "Expected key=value, got '{p}'"),
            PolicyError::InvalidValue(e) => write!(f, "Invalid override value: {e}"),
        }
    }
}

impl std::error::Error for PolicyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_on_single_key() {
        let overrides = PartialPolicy {
            block_screenshot: Some(true),
            ..Default::default()
        };
        let merged = merge_policy("low", &overrides);

        let mut expected = SecurityLevel::Low.preset();
        expected.block_screenshot = true;
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_unknown_level_equals_medium() {
        let empty = PartialPolicy::default();
        assert_eq!(merge_policy("ultra", &empty), merge_policy("medium", &empty));
        assert_eq!(SecurityLevel::from_name("HIGH"), SecurityLevel::High);
    }

    #[test]
    fn test_preset_strictness() {
        let low = SecurityLevel::Low.preset();
        assert!(low.block_dev_tools);
        assert!(!low.lock_on_suspicious);
        assert!(!low.detect_vpn);

        let medium = SecurityLevel::Medium.preset();
        assert!(medium.lock_on_suspicious);
        assert!(!medium.auto_logout);
        assert!(!medium.noise_overlay);

        let high = SecurityLevel::High.preset();
        assert!(high.auto_logout);
        assert!(high.noise_overlay);
        assert!(!high.block_inspect);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let overrides: PartialPolicy = serde_json::from_str(
            r#"{"blockCopy": false, "overlayTheme": "dark", "watermarkText": "ACME"}"#,
        )
        .unwrap();
        let policy = merge_policy("high", &overrides);

        assert!(!policy.block_copy);
        assert_eq!(policy.watermark_text.as_deref(), Some("ACME"));
        assert_eq!(policy.extras.get("overlayTheme"), Some(&Value::from("dark")));

        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["overlayTheme"], "dark");
        assert_eq!(json["detectVPN"], true);
    }

    #[test]
    fn test_merge_is_stable_for_equal_inputs() {
        let overrides = PartialPolicy {
            auto_logout: Some(true),
            ..Default::default()
        };
        assert_eq!(
            merge_policy("medium", &overrides),
            merge_policy("medium", &overrides.clone())
        );
    }

    #[test]
    fn test_set_pair() {
        let mut overrides = PartialPolicy::default();
        overrides.set_pair("blockCopy=false").unwrap();
        overrides.set_pair("detectVPN=true").unwrap();
        overrides.set_pair("watermarkText=Internal use").unwrap();
        overrides.set_pair("theme=42").unwrap();

        assert_eq!(overrides.block_copy, Some(false));
        assert_eq!(overrides.detect_vpn, Some(true));
        assert_eq!(overrides.watermark_text.as_deref(), Some("Internal use"));
        assert_eq!(overrides.extras.get("theme"), Some(&Value::from(42)));

        assert!(overrides.set_pair("noequals").is_err());
        assert!(overrides.set_pair("blockCopy=\"yes\"").is_err());
    }
}

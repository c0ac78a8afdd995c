//! Host events fed to detectors.
//!
//! These stand in for the browser's listener callbacks. Every event carries
//! the host timestamp so timing heuristics never read a wall clock, which
//! keeps them reproducible in tests and replays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window geometry as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
}

impl Viewport {
    /// A viewport with no browser chrome around the page.
    pub fn square(width: u32, height: u32) -> Self {
        Self {
            outer_width: width,
            outer_height: height,
            inner_width: width,
            inner_height: height,
        }
    }

    /// Outer minus inner width, clamped at zero.
    pub fn width_gap(&self) -> u32 {
        self.outer_width.saturating_sub(self.inner_width)
    }

    /// Outer minus inner height, clamped at zero.
    pub fn height_gap(&self) -> u32 {
        self.outer_height.saturating_sub(self.inner_height)
    }

    /// outer/inner width ratio, or None when the inner width is zero.
    pub fn zoom_ratio(&self) -> Option<f64> {
        if self.inner_width == 0 {
            None
        } else {
            Some(self.outer_width as f64 / self.inner_width as f64)
        }
    }
}

/// Clipboard operation intercepted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// Element kind under a context-menu request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextTarget {
    Image,
    Canvas,
    #[default]
    Other,
}

impl ContextTarget {
    /// Whether saving this element would copy rendered content.
    pub fn is_media(self) -> bool {
        matches!(self, ContextTarget::Image | ContextTarget::Canvas)
    }
}

/// Outcome of a completed network probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeVerdict {
    pub suspicious: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

impl ProbeVerdict {
    /// The verdict used whenever the probe cannot complete.
    pub fn not_suspicious() -> Self {
        Self {
            suspicious: false,
            address: None,
            org: None,
        }
    }
}

/// A single host callback, timestamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    KeyDown {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
        at: DateTime<Utc>,
    },
    KeyUp {
        key: String,
        at: DateTime<Utc>,
    },
    Resize {
        viewport: Viewport,
        at: DateTime<Utc>,
    },
    Clipboard {
        action: ClipboardAction,
        at: DateTime<Utc>,
    },
    ContextMenu {
        #[serde(default)]
        target: ContextTarget,
        at: DateTime<Utc>,
    },
    TouchStart {
        at: DateTime<Utc>,
    },
    TouchEnd {
        at: DateTime<Utc>,
    },
    /// Animation frame callback
    Frame {
        at: DateTime<Utc>,
    },
    /// Timer heartbeat driving polls and deadlines
    Tick {
        at: DateTime<Utc>,
    },
    /// Completion of a background network probe
    ProbeVerdict {
        generation: u64,
        verdict: ProbeVerdict,
        at: DateTime<Utc>,
    },
}

impl HostEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HostEvent::KeyDown { at, .. }
            | HostEvent::KeyUp { at, .. }
            | HostEvent::Resize { at, .. }
            | HostEvent::Clipboard { at, .. }
            | HostEvent::ContextMenu { at, .. }
            | HostEvent::TouchStart { at }
            | HostEvent::TouchEnd { at }
            | HostEvent::Frame { at }
            | HostEvent::Tick { at }
            | HostEvent::ProbeVerdict { at, .. } => *at,
        }
    }

    /// Plain key press without modifiers.
    pub fn key_down(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        HostEvent::KeyDown {
            key: key.into(),
            ctrl: false,
            shift: false,
            at,
        }
    }

    pub fn key_up(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        HostEvent::KeyUp {
            key: key.into(),
            at,
        }
    }
}

/// What the host should do with the original event after dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    /// Suppress the browser's default action
    pub prevent_default: bool,
    /// Overwrite the system clipboard with an empty string
    pub clear_clipboard: bool,
}

impl Disposition {
    pub fn prevent() -> Self {
        Self {
            prevent_default: true,
            clear_clipboard: false,
        }
    }

    /// Combine two dispositions; any request to block wins.
    pub fn merge(self, other: Disposition) -> Self {
        Self {
            prevent_default: self.prevent_default || other.prevent_default,
            clear_clipboard: self.clear_clipboard || other.clear_clipboard,
        }
    }
}

/// Capabilities the host environment provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub viewport: bool,
    pub keyboard: bool,
    pub clipboard: bool,
    pub animation_frames: bool,
    pub touch: bool,
    pub network: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            viewport: true,
            keyboard: true,
            clipboard: true,
            animation_frames: true,
            touch: true,
            network: true,
        }
    }
}

/// Name of a single host capability, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Viewport,
    Keyboard,
    Clipboard,
    AnimationFrames,
    Touch,
    Network,
}

impl HostCapabilities {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Viewport => self.viewport,
            Capability::Keyboard => self.keyboard,
            Capability::Clipboard => self.clipboard,
            Capability::AnimationFrames => self.animation_frames,
            Capability::Touch => self.touch,
            Capability::Network => self.network,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Viewport => "viewport",
            Capability::Keyboard => "keyboard",
            Capability::Clipboard => "clipboard",
            Capability::AnimationFrames => "animation frames",
            Capability::Touch => "touch",
            Capability::Network => "network",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_gaps_saturate() {
        let viewport = Viewport {
            outer_width: 1200,
            outer_height: 800,
            inner_width: 1300,
            inner_height: 600,
        };
        assert_eq!(viewport.width_gap(), 0);
        assert_eq!(viewport.height_gap(), 200);
    }

    #[test]
    fn test_zoom_ratio() {
        let viewport = Viewport {
            outer_width: 1100,
            outer_height: 800,
            inner_width: 1000,
            inner_height: 800,
        };
        assert!((viewport.zoom_ratio().unwrap() - 1.1).abs() < 1e-9);
        assert_eq!(Viewport::square(0, 0).zoom_ratio(), None);
    }

    #[test]
    fn test_host_event_json_shape() {
        let event: HostEvent = serde_json::from_str(
            r#"{"type": "key_down", "key": "F12", "at": "2024-01-22T10:00:01Z"}"#,
        )
        .unwrap();
        match event {
            HostEvent::KeyDown { key, ctrl, shift, .. } => {
                assert_eq!(key, "F12");
                assert!(!ctrl);
                assert!(!shift);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let event: HostEvent =
            serde_json::from_str(r#"{"type": "context_menu", "at": "2024-01-22T10:00:01Z"}"#)
                .unwrap();
        assert!(matches!(
            event,
            HostEvent::ContextMenu {
                target: ContextTarget::Other,
                ..
            }
        ));
    }

    #[test]
    fn test_disposition_merge() {
        let merged = Disposition::default().merge(Disposition {
            prevent_default: false,
            clear_clipboard: true,
        });
        assert!(merged.clear_clipboard);
        assert!(!merged.prevent_default);
        assert!(merged.merge(Disposition::prevent()).prevent_default);
    }
}

//! Intercepts for the ways a user reaches the inspector.
//!
//! Desktop shortcuts (F12, Ctrl+Shift+I/J, Ctrl+U), the context menu, a
//! mobile long-press, and a zoom ratio consistent with docked devtools.

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, Disposition, HostEvent};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};
use chrono::{DateTime, Duration, Utc};

/// Optional sub-checks of the inspect detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InspectOptions {
    pub detect_context_menu: bool,
    pub detect_mobile: bool,
    pub detect_zoom: bool,
    pub long_press: std::time::Duration,
    pub zoom_ratio: f64,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            detect_context_menu: true,
            detect_mobile: true,
            detect_zoom: true,
            long_press: std::time::Duration::from_millis(500),
            zoom_ratio: 1.05,
        }
    }
}

pub struct InspectDetector {
    options: InspectOptions,
    long_press: Duration,
    /// Deadline of the pending long-press timer
    press_deadline: Option<DateTime<Utc>>,
}

impl InspectDetector {
    pub fn new(options: InspectOptions) -> Self {
        Self {
            long_press: Duration::from_std(options.long_press).unwrap_or(Duration::milliseconds(500)),
            options,
            press_deadline: None,
        }
    }

    fn shortcut(key: &str, ctrl: bool, shift: bool) -> Option<EventLabel> {
        if key == "F12" {
            return Some(EventLabel::InspectKey);
        }
        if ctrl && shift && matches!(key, "I" | "J") {
            return Some(EventLabel::InspectKeyCombo);
        }
        if ctrl && key == "U" {
            return Some(EventLabel::ViewSourceAttempt);
        }
        None
    }
}

impl Detector for InspectDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Inspect
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Keyboard)?;
        if self.options.detect_mobile && !ctx.capabilities.touch {
            tracing::debug!("no touch input, long-press check disabled");
            self.options.detect_mobile = false;
        }
        if self.options.detect_zoom && !ctx.capabilities.viewport {
            tracing::debug!("no viewport metrics, zoom check disabled");
            self.options.detect_zoom = false;
        }
        self.press_deadline = None;
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        match event {
            HostEvent::KeyDown {
                key, ctrl, shift, ..
            } => match Self::shortcut(key, *ctrl, *shift) {
                Some(label) => {
                    emit(label);
                    Disposition::prevent()
                }
                None => Disposition::default(),
            },
            HostEvent::ContextMenu { .. } if self.options.detect_context_menu => {
                emit(EventLabel::ContextMenuBlocked);
                Disposition::prevent()
            }
            HostEvent::TouchStart { at } if self.options.detect_mobile => {
                self.press_deadline = Some(*at + self.long_press);
                Disposition::default()
            }
            HostEvent::TouchEnd { at } => {
                // A release that arrives after the deadline but before any tick still counts
                if let Some(deadline) = self.press_deadline.take() {
                    if *at >= deadline {
                        emit(EventLabel::MobileLongPressInspect);
                    }
                }
                Disposition::default()
            }
            HostEvent::Tick { at } => {
                if let Some(deadline) = self.press_deadline {
                    if *at >= deadline {
                        self.press_deadline = None;
                        emit(EventLabel::MobileLongPressInspect);
                    }
                }
                Disposition::default()
            }
            HostEvent::Resize { viewport, .. } if self.options.detect_zoom => {
                if viewport
                    .zoom_ratio()
                    .map(|ratio| ratio > self.options.zoom_ratio)
                    .unwrap_or(false)
                {
                    emit(EventLabel::ZoomDevtoolsDetected);
                }
                Disposition::default()
            }
            _ => Disposition::default(),
        }
    }

    fn stop(&mut self) {
        self.press_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::types::{ContextTarget, HostCapabilities, Viewport};
    use crossbeam_channel::bounded;

    fn started(options: InspectOptions, capabilities: HostCapabilities) -> InspectDetector {
        let (tx, _rx) = bounded(1);
        let mut detector = InspectDetector::new(options);
        detector
            .start(&StartContext {
                capabilities,
                viewport: None,
                now: Utc::now(),
                events: &tx,
            })
            .unwrap();
        detector
    }

    fn key(detector: &mut InspectDetector, key: &str, ctrl: bool, shift: bool) -> Option<EventLabel> {
        let mut fired = None;
        let disposition = detector.handle(
            &HostEvent::KeyDown {
                key: key.to_string(),
                ctrl,
                shift,
                at: Utc::now(),
            },
            &mut |label: EventLabel| fired = Some(label),
        );
        assert_eq!(disposition.prevent_default, fired.is_some());
        fired
    }

    #[test]
    fn test_keyboard_shortcuts() {
        let mut detector = started(InspectOptions::default(), HostCapabilities::default());
        assert_eq!(key(&mut detector, "F12", false, false), Some(EventLabel::InspectKey));
        assert_eq!(key(&mut detector, "I", true, true), Some(EventLabel::InspectKeyCombo));
        assert_eq!(key(&mut detector, "J", true, true), Some(EventLabel::InspectKeyCombo));
        assert_eq!(key(&mut detector, "U", true, false), Some(EventLabel::ViewSourceAttempt));
        assert_eq!(key(&mut detector, "I", true, false), None);
        assert_eq!(key(&mut detector, "u", false, false), None);
    }

    #[test]
    fn test_long_press_fires_on_tick_after_deadline() {
        let mut detector = started(InspectOptions::default(), HostCapabilities::default());
        let t0 = Utc::now();
        let mut fired = Vec::new();
        detector.handle(&HostEvent::TouchStart { at: t0 }, &mut |l: EventLabel| fired.push(l));
        detector.handle(
            &HostEvent::Tick {
                at: t0 + Duration::milliseconds(300),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert!(fired.is_empty());
        detector.handle(
            &HostEvent::Tick {
                at: t0 + Duration::milliseconds(500),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        detector.handle(
            &HostEvent::TouchEnd {
                at: t0 + Duration::milliseconds(700),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert_eq!(fired, vec![EventLabel::MobileLongPressInspect]);
    }

    #[test]
    fn test_short_tap_is_ignored() {
        let mut detector = started(InspectOptions::default(), HostCapabilities::default());
        let t0 = Utc::now();
        let mut fired = Vec::new();
        detector.handle(&HostEvent::TouchStart { at: t0 }, &mut |l: EventLabel| fired.push(l));
        detector.handle(
            &HostEvent::TouchEnd {
                at: t0 + Duration::milliseconds(120),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        detector.handle(
            &HostEvent::Tick {
                at: t0 + Duration::seconds(1),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert!(fired.is_empty());
    }

    #[test]
    fn test_zoom_and_context_menu() {
        let mut detector = started(InspectOptions::default(), HostCapabilities::default());
        let mut fired = Vec::new();
        detector.handle(
            &HostEvent::Resize {
                viewport: Viewport {
                    outer_width: 1200,
                    outer_height: 800,
                    inner_width: 1000,
                    inner_height: 800,
                },
                at: Utc::now(),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        detector.handle(
            &HostEvent::Resize {
                viewport: Viewport::square(1200, 800),
                at: Utc::now(),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        detector.handle(
            &HostEvent::ContextMenu {
                target: ContextTarget::Other,
                at: Utc::now(),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert_eq!(
            fired,
            vec![EventLabel::ZoomDevtoolsDetected, EventLabel::ContextMenuBlocked]
        );
    }

    #[test]
    fn test_missing_touch_disables_long_press_only() {
        let caps = HostCapabilities {
            touch: false,
            ..Default::default()
        };
        let mut detector = started(InspectOptions::default(), caps);
        let t0 = Utc::now();
        let mut fired = Vec::new();
        detector.handle(&HostEvent::TouchStart { at: t0 }, &mut |l: EventLabel| fired.push(l));
        detector.handle(
            &HostEvent::Tick {
                at: t0 + Duration::seconds(1),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert!(fired.is_empty());
        assert_eq!(key(&mut detector, "F12", false, false), Some(EventLabel::InspectKey));
    }
}

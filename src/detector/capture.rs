//! Screenshot and screen-capture detection.
//!
//! Two complementary detectors share the `blockScreenshot` switch:
//!
//! - [`FrameFreezeDetector`] watches animation-frame timing. Capture tools
//!   (Snipping Tool, OBS, Lightshot) stall the compositor briefly; a frame
//!   gap inside the freeze window is reported as `ai_screenshot`.
//! - [`ScreenshotDetector`] intercepts explicit attempts: the PrintScreen key
//!   and the context menu on images or canvases. An attempt that closely
//!   follows a freeze is classified `ai_screenshot`, otherwise `screenshot`.

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, Disposition, HostEvent};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};
use chrono::{DateTime, Duration, Utc};

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or(Duration::zero())
}

/// Inter-frame delay window, exclusive at both ends.
#[derive(Debug, Clone, Copy)]
struct FreezeWindow {
    min: Duration,
    max: Duration,
}

impl FreezeWindow {
    fn contains(&self, delta: Duration) -> bool {
        delta > self.min && delta < self.max
    }
}

/// Continuous frame-timing loop.
pub struct FrameFreezeDetector {
    window: FreezeWindow,
    last_frame: Option<DateTime<Utc>>,
    active: bool,
}

impl FrameFreezeDetector {
    pub fn new(min: std::time::Duration, max: std::time::Duration) -> Self {
        Self {
            window: FreezeWindow {
                min: to_chrono(min),
                max: to_chrono(max),
            },
            last_frame: None,
            active: false,
        }
    }
}

impl Detector for FrameFreezeDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FrameFreeze
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::AnimationFrames)?;
        // First frame after start sets the baseline
        self.last_frame = None;
        self.active = true;
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        if let HostEvent::Frame { at } = event {
            if !self.active {
                return Disposition::default();
            }
            if let Some(last) = self.last_frame {
                if self.window.contains(*at - last) {
                    emit(EventLabel::AiScreenshot);
                }
            }
            self.last_frame = Some(*at);
        }
        Disposition::default()
    }

    fn stop(&mut self) {
        self.active = false;
        self.last_frame = None;
    }
}

/// PrintScreen and media context-menu intercepts.
pub struct ScreenshotDetector {
    window: FreezeWindow,
    capture_window: Duration,
    last_frame: Option<DateTime<Utc>>,
    last_freeze: Option<DateTime<Utc>>,
}

impl ScreenshotDetector {
    pub fn new(
        freeze_min: std::time::Duration,
        freeze_max: std::time::Duration,
        capture_window: std::time::Duration,
    ) -> Self {
        Self {
            window: FreezeWindow {
                min: to_chrono(freeze_min),
                max: to_chrono(freeze_max),
            },
            capture_window: to_chrono(capture_window),
            last_frame: None,
            last_freeze: None,
        }
    }

    fn classify(&self, at: DateTime<Utc>) -> EventLabel {
        match self.last_freeze {
            Some(freeze) if at >= freeze && at - freeze <= self.capture_window => {
                EventLabel::AiScreenshot
            }
            _ => EventLabel::Screenshot,
        }
    }
}

impl Detector for ScreenshotDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Screenshot
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Keyboard)?;
        self.last_frame = None;
        self.last_freeze = None;
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        match event {
            HostEvent::Frame { at } => {
                if let Some(last) = self.last_frame {
                    if self.window.contains(*at - last) {
                        self.last_freeze = Some(*at);
                    }
                }
                self.last_frame = Some(*at);
                Disposition::default()
            }
            HostEvent::KeyDown { key, at, .. } if key == "PrintScreen" => {
                emit(self.classify(*at));
                Disposition {
                    prevent_default: true,
                    clear_clipboard: true,
                }
            }
            // Print dialog, blocked without raising suspicion
            HostEvent::KeyDown { key, ctrl: true, .. } if key == "p" => Disposition::prevent(),
            HostEvent::ContextMenu { target, at } if target.is_media() => {
                emit(self.classify(*at));
                Disposition::prevent()
            }
            _ => Disposition::default(),
        }
    }

    fn stop(&mut self) {
        self.last_frame = None;
        self.last_freeze = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::types::{ContextTarget, HostCapabilities};
    use crossbeam_channel::bounded;
    use std::time::Duration as StdDuration;

    fn start(detector: &mut dyn Detector, now: DateTime<Utc>) {
        let (tx, _rx) = bounded(1);
        detector
            .start(&StartContext {
                capabilities: HostCapabilities::default(),
                viewport: None,
                now,
                events: &tx,
            })
            .unwrap();
    }

    fn frames(detector: &mut dyn Detector, t0: DateTime<Utc>, offsets_ms: &[i64]) -> Vec<EventLabel> {
        let mut fired = Vec::new();
        for ms in offsets_ms {
            detector.handle(
                &HostEvent::Frame {
                    at: t0 + Duration::milliseconds(*ms),
                },
                &mut |label: EventLabel| fired.push(label),
            );
        }
        fired
    }

    #[test]
    fn test_freeze_window_is_exclusive() {
        let t0 = Utc::now();
        let mut detector =
            FrameFreezeDetector::new(StdDuration::from_millis(250), StdDuration::from_millis(650));
        start(&mut detector, t0);

        // 16ms frames, then gaps of exactly 250, 300, 650 and 700ms
        let fired = frames(&mut detector, t0, &[16, 32, 282, 582, 1232, 1932]);
        assert_eq!(fired, vec![EventLabel::AiScreenshot]);
    }

    #[test]
    fn test_stopped_loop_ignores_frames() {
        let t0 = Utc::now();
        let mut detector =
            FrameFreezeDetector::new(StdDuration::from_millis(250), StdDuration::from_millis(650));
        start(&mut detector, t0);
        detector.stop();
        assert!(frames(&mut detector, t0, &[300, 600]).is_empty());
    }

    #[test]
    fn test_print_screen_is_blocked_and_labelled() {
        let t0 = Utc::now();
        let mut detector = ScreenshotDetector::new(
            StdDuration::from_millis(250),
            StdDuration::from_millis(650),
            StdDuration::from_millis(1000),
        );
        start(&mut detector, t0);

        let mut fired = Vec::new();
        let disposition = detector.handle(
            &HostEvent::key_down("PrintScreen", t0),
            &mut |label: EventLabel| fired.push(label),
        );
        assert!(disposition.prevent_default);
        assert!(disposition.clear_clipboard);
        assert_eq!(fired, vec![EventLabel::Screenshot]);
    }

    #[test]
    fn test_attempt_after_freeze_is_ai_screenshot() {
        let t0 = Utc::now();
        let mut detector = ScreenshotDetector::new(
            StdDuration::from_millis(250),
            StdDuration::from_millis(650),
            StdDuration::from_millis(1000),
        );
        start(&mut detector, t0);
        frames(&mut detector, t0, &[0, 400]);

        let mut fired = Vec::new();
        detector.handle(
            &HostEvent::ContextMenu {
                target: ContextTarget::Canvas,
                at: t0 + Duration::milliseconds(900),
            },
            &mut |label: EventLabel| fired.push(label),
        );
        detector.handle(
            &HostEvent::key_down("PrintScreen", t0 + Duration::milliseconds(2000)),
            &mut |label: EventLabel| fired.push(label),
        );
        assert_eq!(fired, vec![EventLabel::AiScreenshot, EventLabel::Screenshot]);
    }

    #[test]
    fn test_ctrl_p_prevented_silently_and_plain_menu_ignored() {
        let t0 = Utc::now();
        let mut detector = ScreenshotDetector::new(
            StdDuration::from_millis(250),
            StdDuration::from_millis(650),
            StdDuration::from_millis(1000),
        );
        start(&mut detector, t0);

        let mut fired = Vec::new();
        let print = detector.handle(
            &HostEvent::KeyDown {
                key: "p".to_string(),
                ctrl: true,
                shift: false,
                at: t0,
            },
            &mut |label: EventLabel| fired.push(label),
        );
        let menu = detector.handle(
            &HostEvent::ContextMenu {
                target: ContextTarget::Other,
                at: t0,
            },
            &mut |label: EventLabel| fired.push(label),
        );
        assert!(print.prevent_default);
        assert!(!menu.prevent_default);
        assert!(fired.is_empty());
    }
}

//! Docked developer-tools detection from window geometry.
//!
//! When devtools are docked the outer window keeps its size while the page
//! viewport shrinks. Not bulletproof (undocked devtools are invisible to this
//! check) but enough to flag the common case.

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, Disposition, HostEvent, Viewport};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};
use chrono::{DateTime, Duration, Utc};

/// Size heuristic: either gap larger than `threshold_px` means devtools are open.
pub fn is_devtools_open(viewport: &Viewport, threshold_px: u32) -> bool {
    viewport.width_gap() > threshold_px || viewport.height_gap() > threshold_px
}

/// Polls the size heuristic on resize and on ticks, firing on the
/// closed → open edge only.
pub struct DevtoolsDetector {
    threshold_px: u32,
    poll_interval: Duration,
    viewport: Option<Viewport>,
    open: bool,
    last_poll: Option<DateTime<Utc>>,
}

impl DevtoolsDetector {
    pub fn new(threshold_px: u32, poll_interval: std::time::Duration) -> Self {
        Self {
            threshold_px,
            poll_interval: Duration::from_std(poll_interval).unwrap_or(Duration::seconds(1)),
            viewport: None,
            open: false,
            last_poll: None,
        }
    }

    /// Whether the last check found devtools open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn check(&mut self, at: DateTime<Utc>, emit: &mut dyn FnMut(EventLabel)) {
        self.last_poll = Some(at);
        let Some(viewport) = self.viewport else {
            return;
        };
        let current = is_devtools_open(&viewport, self.threshold_px);
        if current && !self.open {
            emit(EventLabel::Devtools);
        }
        self.open = current;
    }

    fn poll_due(&self, at: DateTime<Utc>) -> bool {
        match self.last_poll {
            // A clock that went backwards restarts the interval
            Some(last) => at < last || at - last >= self.poll_interval,
            None => true,
        }
    }
}

impl Detector for DevtoolsDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Devtools
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Viewport)?;
        // Measure without firing: devtools already open at start do not count as an edge.
        self.viewport = ctx.viewport;
        self.open = ctx
            .viewport
            .map(|v| is_devtools_open(&v, self.threshold_px))
            .unwrap_or(false);
        self.last_poll = Some(ctx.now);
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        match event {
            HostEvent::Resize { viewport, at } => {
                self.viewport = Some(*viewport);
                self.check(*at, emit);
            }
            HostEvent::Tick { at } if self.poll_due(*at) => self.check(*at, emit),
            _ => {}
        }
        Disposition::default()
    }

    fn stop(&mut self) {
        self.last_poll = None;
        self.open = false;
    }
}

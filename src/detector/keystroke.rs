//! Keyboard behavior anomalies.
//!
//! Only key timing and the set of currently held keys are examined; no key
//! content is retained past the key-up that releases it.

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, Disposition, HostEvent};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Flags sustained key-down intervals faster than a human can type.
///
/// The run counter only grows (saturating); once it reaches the threshold
/// every further key down fires. The first key after start sets the baseline.
pub struct KeystrokeTimingDetector {
    interval: Duration,
    run_threshold: u32,
    rapid_count: u32,
    last_key: Option<DateTime<Utc>>,
}

impl KeystrokeTimingDetector {
    pub fn new(interval: std::time::Duration, run_threshold: u32) -> Self {
        Self {
            interval: Duration::from_std(interval).unwrap_or(Duration::milliseconds(20)),
            run_threshold,
            rapid_count: 0,
            last_key: None,
        }
    }

    pub fn rapid_count(&self) -> u32 {
        self.rapid_count
    }
}

impl Detector for KeystrokeTimingDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::KeystrokeTiming
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Keyboard)?;
        self.last_key = None;
        self.rapid_count = 0;
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        if let HostEvent::KeyDown { at, .. } = event {
            if let Some(last) = self.last_key {
                let delta = *at - last;
                if delta >= Duration::zero() && delta < self.interval {
                    self.rapid_count = self.rapid_count.saturating_add(1);
                }
            }
            if self.rapid_count >= self.run_threshold {
                emit(EventLabel::KeystrokeTamper);
            }
            self.last_key = Some(*at);
        }
        Disposition::default()
    }

    fn stop(&mut self) {
        self.last_key = None;
    }
}

/// Flags too many distinct keys held at once, a sign of injected input or
/// hardware ghosting.
pub struct GhostingDetector {
    threshold: usize,
    held: HashSet<String>,
}

impl GhostingDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            held: HashSet::new(),
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl Detector for GhostingDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ghosting
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Keyboard)?;
        self.held.clear();
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        match event {
            HostEvent::KeyDown { key, .. } => {
                self.held.insert(key.clone());
                if self.held.len() >= self.threshold {
                    emit(EventLabel::Ghosting);
                }
            }
            HostEvent::KeyUp { key, .. } => {
                self.held.remove(key);
            }
            _ => {}
        }
        Disposition::default()
    }

    fn stop(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::types::HostCapabilities;
    use crossbeam_channel::bounded;

    fn started<D: Detector>(mut detector: D, now: DateTime<Utc>) -> D {
        let (tx, _rx) = bounded(1);
        detector
            .start(&StartContext {
                capabilities: HostCapabilities::default(),
                viewport: None,
                now,
                events: &tx,
            })
            .unwrap();
        detector
    }

    #[test]
    fn test_human_typing_never_fires() {
        let t0 = Utc::now();
        let mut detector = started(
            KeystrokeTimingDetector::new(std::time::Duration::from_millis(20), 15),
            t0,
        );
        let mut fired = 0;
        for i in 1..=100 {
            detector.handle(
                &HostEvent::key_down("a", t0 + Duration::milliseconds(i * 120)),
                &mut |_: EventLabel| fired += 1,
            );
        }
        assert_eq!(fired, 0);
        assert_eq!(detector.rapid_count(), 0);
    }

    #[test]
    fn test_fires_after_fifteen_rapid_intervals() {
        let t0 = Utc::now();
        let mut detector = started(
            KeystrokeTimingDetector::new(std::time::Duration::from_millis(20), 15),
            t0 - Duration::seconds(1),
        );
        let mut fired = Vec::new();
        // First key sets the baseline after a long gap, then 15 keys 5ms apart
        for i in 0..16 {
            detector.handle(
                &HostEvent::key_down("x", t0 + Duration::milliseconds(i * 5)),
                &mut |_: EventLabel| fired.push(i),
            );
        }
        assert_eq!(fired, vec![15]);
    }

    #[test]
    fn test_counter_does_not_reset_or_overflow() {
        let t0 = Utc::now();
        let mut detector = started(KeystrokeTimingDetector::new(std::time::Duration::from_millis(20), 2), t0);
        detector.rapid_count = u32::MAX - 1;
        let mut fired = 0;
        for i in 1..=3 {
            detector.handle(
                &HostEvent::key_down("x", t0 + Duration::milliseconds(i)),
                &mut |_: EventLabel| fired += 1,
            );
        }
        assert_eq!(detector.rapid_count(), u32::MAX);
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_ghosting_on_fourth_held_key() {
        let t0 = Utc::now();
        let mut detector = started(GhostingDetector::new(4), t0);
        let mut fired = Vec::new();
        for key in ["a", "s", "d"] {
            detector.handle(&HostEvent::key_down(key, t0), &mut |l: EventLabel| fired.push(l));
        }
        // Auto-repeat of a held key does not add to the set
        detector.handle(&HostEvent::key_down("a", t0), &mut |l: EventLabel| fired.push(l));
        assert!(fired.is_empty());

        detector.handle(&HostEvent::key_up("s", t0), &mut |l: EventLabel| fired.push(l));
        detector.handle(&HostEvent::key_down("f", t0), &mut |l: EventLabel| fired.push(l));
        assert!(fired.is_empty());

        detector.handle(&HostEvent::key_down("g", t0), &mut |l: EventLabel| fired.push(l));
        assert_eq!(fired, vec![EventLabel::Ghosting]);
        assert_eq!(detector.held_count(), 4);
    }
}

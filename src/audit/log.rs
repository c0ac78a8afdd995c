//! In-memory detection log.
//!
//! Counts what happened during one session: detections per label, lock
//! transitions, hook failures and detectors that could not start. Nothing
//! is written to disk; the log lives and dies with the session.

use crate::core::label::EventLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Session detection statistics.
#[derive(Debug)]
pub struct DetectionLog {
    session_id: Uuid,
    /// One counter per label, indexed like [`EventLabel::ALL`]
    detections: [AtomicU64; EventLabel::ALL.len()],
    locks: AtomicU64,
    unlocks: AtomicU64,
    hook_failures: AtomicU64,
    degraded_detectors: AtomicU64,
    session_start: DateTime<Utc>,
}

impl DetectionLog {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            detections: std::array::from_fn(|_| AtomicU64::new(0)),
            locks: AtomicU64::new(0),
            unlocks: AtomicU64::new(0),
            hook_failures: AtomicU64::new(0),
            degraded_detectors: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_detection(&self, label: EventLabel) {
        if let Some(index) = EventLabel::ALL.iter().position(|l| *l == label) {
            self.detections[index].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_lock(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unlock(&self) {
        self.unlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hook_failure(&self) {
        self.hook_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded_detector(&self) {
        self.degraded_detectors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> DetectionStats {
        let by_label: BTreeMap<EventLabel, u64> = EventLabel::ALL
            .iter()
            .zip(self.detections.iter())
            .map(|(label, count)| (*label, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        DetectionStats {
            session_id: self.session_id,
            total_detections: by_label.values().sum(),
            by_label,
            locks: self.locks.load(Ordering::Relaxed),
            unlocks: self.unlocks.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
            degraded_detectors: self.degraded_detectors.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Session Statistics:\n\
             - Session: {}\n\
             - Detections: {}\n\
             - Locks engaged: {}\n\
             - Unlocks: {}\n\
             - Hook failures: {}\n\
             - Detectors unavailable: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.total_detections,
            stats.locks,
            stats.unlocks,
            stats.hook_failures,
            stats.degraded_detectors,
            stats.session_duration_secs
        );
        if !stats.by_label.is_empty() {
            out.push_str("\n\nDetections by label:");
            for (label, count) in &stats.by_label {
                out.push_str(&format!("\n - {label}: {count}"));
            }
        }
        out
    }

    /// Reset all counters. The session id is kept.
    pub fn reset(&self) {
        for counter in &self.detections {
            counter.store(0, Ordering::Relaxed);
        }
        self.locks.store(0, Ordering::Relaxed);
        self.unlocks.store(0, Ordering::Relaxed);
        self.hook_failures.store(0, Ordering::Relaxed);
        self.degraded_detectors.store(0, Ordering::Relaxed);
    }
}

impl Default for DetectionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of detection statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStats {
    pub session_id: Uuid,
    pub total_detections: u64,
    pub by_label: BTreeMap<EventLabel, u64>,
    pub locks: u64,
    pub unlocks: u64,
    pub hook_failures: u64,
    pub degraded_detectors: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared detection log.
pub type SharedDetectionLog = Arc<DetectionLog>;

/// Create a new shared detection log.
pub fn create_shared_log() -> SharedDetectionLog {
    Arc::new(DetectionLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_counting() {
        let log = DetectionLog::new();

        log.record_detection(EventLabel::Devtools);
        log.record_detection(EventLabel::Devtools);
        log.record_detection(EventLabel::VpnDetected);
        log.record_lock();

        let stats = log.stats();
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.by_label.get(&EventLabel::Devtools), Some(&2));
        assert_eq!(stats.by_label.get(&EventLabel::Clipboard), None);
        assert_eq!(stats.locks, 1);
    }

    #[test]
    fn test_reset_keeps_session() {
        let log = DetectionLog::new();
        let session = log.session_id();

        log.record_detection(EventLabel::Ghosting);
        log.record_hook_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.hook_failures, 0);
        assert_eq!(stats.session_id, session);
    }

    #[test]
    fn test_summary_format() {
        let log = DetectionLog::new();
        log.record_detection(EventLabel::KeystrokeTamper);
        let summary = log.summary();

        assert!(summary.contains("Detections: 1"));
        assert!(summary.contains("Locks engaged"));
        assert!(summary.contains("keystroke_tamper: 1"));
    }
}

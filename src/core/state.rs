//! The session's suspicion record and its two transitions.

use crate::core::label::EventLabel;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// Suspicion state for one session.
///
/// Fields are private: the only writers are [`SecurityState::flag`] and
/// [`SecurityState::release`], both driven by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    suspicious: bool,
    locked: bool,
    last_event: Option<EventLabel>,
}

/// The three reachable combinations of the two flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Clean,
    Flagged,
    Locked,
}

impl SecurityState {
    pub fn suspicious(&self) -> bool {
        self.suspicious
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn last_event(&self) -> Option<EventLabel> {
        self.last_event
    }

    pub fn phase(&self) -> Phase {
        match (self.suspicious, self.locked) {
            (_, true) => Phase::Locked,
            (true, false) => Phase::Flagged,
            (false, false) => Phase::Clean,
        }
    }

    /// Record a detection. Suspicion and the label are written before the
    /// lock so `locked` never holds without `suspicious`.
    ///
    /// Returns true when this call newly engaged the lock.
    pub(crate) fn flag(&mut self, label: EventLabel, lock: bool) -> bool {
        self.suspicious = true;
        self.last_event = Some(label);
        if lock && !self.locked {
            self.locked = true;
            return true;
        }
        false
    }

    /// Clear the lock, keeping the audit trail. Returns true if it was locked.
    pub(crate) fn release(&mut self) -> bool {
        std::mem::replace(&mut self.locked, false)
    }
}

/// Read-only, always-current view of the engine's state.
///
/// Cheap to clone; hand it to presentation code or capture it in hooks to
/// re-read state while a detection is being processed.
#[derive(Debug, Clone, Default)]
pub struct StateView {
    inner: Rc<Cell<SecurityState>>,
}

impl StateView {
    pub(crate) fn publish(&self, state: SecurityState) {
        self.inner.set(state);
    }

    /// Current snapshot.
    pub fn get(&self) -> SecurityState {
        self.inner.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_clean() {
        let state = SecurityState::default();
        assert!(!state.suspicious());
        assert!(!state.locked());
        assert_eq!(state.last_event(), None);
        assert_eq!(state.phase(), Phase::Clean);
    }

    #[test]
    fn test_flag_without_lock_is_flagged() {
        let mut state = SecurityState::default();
        assert!(!state.flag(EventLabel::Clipboard, false));
        assert_eq!(state.phase(), Phase::Flagged);
        assert_eq!(state.last_event(), Some(EventLabel::Clipboard));
    }

    #[test]
    fn test_release_returns_to_flagged_never_clean() {
        let mut state = SecurityState::default();
        assert!(state.flag(EventLabel::Devtools, true));
        assert_eq!(state.phase(), Phase::Locked);

        assert!(state.release());
        assert_eq!(state.phase(), Phase::Flagged);
        assert!(!state.release());
        assert_eq!(state.last_event(), Some(EventLabel::Devtools));
    }

    #[test]
    fn test_relock_reports_only_first_engagement() {
        let mut state = SecurityState::default();
        assert!(state.flag(EventLabel::Ghosting, true));
        assert!(!state.flag(EventLabel::KeystrokeTamper, true));
        assert_eq!(state.last_event(), Some(EventLabel::KeystrokeTamper));
    }

    #[test]
    fn test_state_view_tracks_published_state() {
        let view = StateView::default();
        let other = view.clone();
        let mut state = SecurityState::default();
        state.flag(EventLabel::VpnDetected, false);
        view.publish(state);
        assert_eq!(other.get(), state);
    }
}

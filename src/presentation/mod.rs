//! Reactive presentation model.
//!
//! Nothing here mutates security state. [`PresentationState::derive`] turns
//! a state snapshot and the effective policy into what a UI should render,
//! and [`Surface`] is the narrow set of page-level side effects the engine
//! itself drives (session watermark and noise overlay).

pub mod watermark;

use crate::core::label::{EventLabel, DEFAULT_DISPLAY_TEXT};
use crate::core::policy::Policy;
use crate::core::state::SecurityState;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

pub use watermark::{Watermark, WatermarkPosition};

/// Text shown for a detection.
///
/// Known labels map to a fixed message. Everything else (including no
/// detection yet) falls back to the policy's `watermarkText`, then to
/// `"Protected Content"`.
pub fn resolve_display_text(label: Option<EventLabel>, policy: &Policy) -> String {
    label
        .and_then(EventLabel::display_text)
        .map(str::to_string)
        .or_else(|| policy.watermark_text.clone())
        .unwrap_or_else(|| DEFAULT_DISPLAY_TEXT.to_string())
}

/// [`resolve_display_text`] for a label given by its wire name. Names
/// outside the label set resolve like an unlisted label.
pub fn resolve_display_text_for(name: &str, policy: &Policy) -> String {
    resolve_display_text(name.parse().ok(), policy)
}

/// Body of the lock overlay for a given detection.
pub fn lock_message(label: EventLabel) -> String {
    format!(
        "Suspicious activity was detected: {}. Your session may be restricted for safety.",
        label.humanized()
    )
}

/// Everything a protected page renders, derived from state and policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationState {
    /// Blur the protected content
    pub blur: bool,
    /// Ignore pointer input on the protected content
    pub pointer_blocked: bool,
    /// Show the full-screen lock overlay
    pub lock_overlay: bool,
    pub noise: bool,
    /// Floating watermark text, when watermarking is enabled
    pub watermark_text: Option<String>,
    /// Corner badge text, once any detection happened
    pub badge_text: Option<String>,
    pub unlock_button: bool,
    pub lock_message: Option<String>,
}

impl PresentationState {
    pub fn derive(state: &SecurityState, policy: &Policy) -> Self {
        let text = resolve_display_text(state.last_event(), policy);
        let lock_overlay = state.locked() && policy.show_lock_overlay;

        Self {
            blur: state.suspicious(),
            pointer_blocked: state.locked(),
            lock_overlay,
            noise: policy.noise_overlay,
            watermark_text: policy.enable_watermark.then(|| text.clone()),
            badge_text: state.last_event().map(|_| text),
            unlock_button: lock_overlay && policy.show_unlock_button,
            lock_message: if lock_overlay {
                state.last_event().map(lock_message)
            } else {
                None
            },
        }
    }
}

/// Page-level side effects owned by the engine.
pub trait Surface {
    /// Replace any existing watermark with `watermark`.
    fn apply_watermark(&mut self, watermark: &Watermark);
    /// Remove every watermark. Safe when none is shown.
    fn clear_watermark(&mut self);
    fn show_noise(&mut self);
    fn remove_noise(&mut self);
}

/// A surface that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn apply_watermark(&mut self, _watermark: &Watermark) {}
    fn clear_watermark(&mut self) {}
    fn show_noise(&mut self) {}
    fn remove_noise(&mut self) {}
}

/// A surface that keeps the current overlays in memory.
///
/// Useful for headless hosts that render from a snapshot, and for tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemorySurface {
    pub watermark: Option<Watermark>,
    pub noise: bool,
    /// Number of times a watermark was applied
    pub applied: u32,
}

impl Surface for MemorySurface {
    fn apply_watermark(&mut self, watermark: &Watermark) {
        self.watermark = Some(watermark.clone());
        self.applied += 1;
    }

    fn clear_watermark(&mut self) {
        self.watermark = None;
    }

    fn show_noise(&mut self) {
        self.noise = true;
    }

    fn remove_noise(&mut self) {
        self.noise = false;
    }
}

/// Share a surface with the engine while keeping a handle to inspect it.
impl<S: Surface> Surface for Rc<RefCell<S>> {
    fn apply_watermark(&mut self, watermark: &Watermark) {
        self.borrow_mut().apply_watermark(watermark);
    }

    fn clear_watermark(&mut self) {
        self.borrow_mut().clear_watermark();
    }

    fn show_noise(&mut self) {
        self.borrow_mut().show_noise();
    }

    fn remove_noise(&mut self) {
        self.borrow_mut().remove_noise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::SecurityLevel;

    #[test]
    fn test_display_text_lookup_and_fallback() {
        let mut policy = SecurityLevel::Medium.preset();
        assert_eq!(
            resolve_display_text(Some(EventLabel::Devtools), &policy),
            "DevTools Detected"
        );
        assert_eq!(
            resolve_display_text(Some(EventLabel::InspectKey), &policy),
            "Protected Content"
        );
        assert_eq!(resolve_display_text(None, &policy), "Protected Content");

        assert_eq!(
            resolve_display_text_for("ai_screenshot", &policy),
            "AI Screenshot Detection Triggered"
        );
        assert_eq!(
            resolve_display_text_for("unknown_label", &policy),
            "Protected Content"
        );

        policy.watermark_text = Some("Internal".to_string());
        assert_eq!(
            resolve_display_text(Some(EventLabel::ZoomDevtoolsDetected), &policy),
            "Internal"
        );
        assert_eq!(
            resolve_display_text(Some(EventLabel::Clipboard), &policy),
            "Copy Attempt Blocked"
        );
    }

    #[test]
    fn test_clean_state_renders_nothing_intrusive() {
        let policy = SecurityLevel::Medium.preset();
        let view = PresentationState::derive(&SecurityState::default(), &policy);

        assert!(!view.blur);
        assert!(!view.pointer_blocked);
        assert!(!view.lock_overlay);
        assert_eq!(view.badge_text, None);
        assert_eq!(view.lock_message, None);
        assert_eq!(view.watermark_text.as_deref(), Some("Protected Content"));
    }

    #[test]
    fn test_locked_state_shows_overlay_and_message() {
        let policy = SecurityLevel::High.preset();
        let mut state = SecurityState::default();
        state.flag(EventLabel::KeystrokeTamper, true);
        let view = PresentationState::derive(&state, &policy);

        assert!(view.blur);
        assert!(view.pointer_blocked);
        assert!(view.lock_overlay);
        assert!(view.noise);
        assert!(view.unlock_button);
        assert_eq!(view.badge_text.as_deref(), Some("Keystroke Tampering Detected"));
        assert!(view
            .lock_message
            .as_deref()
            .is_some_and(|m| m.contains("keystroke tamper")));
    }

    #[test]
    fn test_flagged_without_overlay_policy() {
        let policy = SecurityLevel::Low.preset();
        let mut state = SecurityState::default();
        state.flag(EventLabel::Devtools, false);
        let view = PresentationState::derive(&state, &policy);

        assert!(view.blur);
        assert!(!view.lock_overlay);
        assert_eq!(view.watermark_text, None);
        assert_eq!(view.badge_text.as_deref(), Some("DevTools Detected"));
    }

    #[test]
    fn test_shared_surface_forwards_calls() {
        let shared = Rc::new(RefCell::new(MemorySurface::default()));
        let mut handle: Box<dyn Surface> = Box::new(shared.clone());
        handle.show_noise();
        assert!(shared.borrow().noise);
        handle.remove_noise();
        assert!(!shared.borrow().noise);
    }
}

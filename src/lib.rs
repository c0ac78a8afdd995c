//! tamper-guard - Heuristic tamper detection for protected content sessions.
//!
//! This library aggregates independent behavioral signals (developer tools,
//! screen capture, clipboard use, keystroke anomalies, proxy networks) into
//! a single `suspicious / locked / last_event` state that a protected page
//! reacts to with blur, a lock overlay and a watermark.
//!
//! # Guarantees (and their limits)
//!
//! - **Best effort**: every detector is a heuristic; none of them is proof
//! - **Never fatal**: missing host capabilities, failing hooks and network
//!   errors degrade a detector, they never break the page
//! - **Sticky suspicion**: once flagged, a session stays flagged; only the
//!   lock can be released
//! - **Nothing persisted**: state lives and dies with the session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        tamper-guard                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Host events │──▶│  Detectors  │──▶│   Engine    │       │
//! │  │ (queue/tick)│   │ (registry)  │   │(mark_susp.) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲                 │                  │              │
//! │         │                 ▼                  ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │Network probe│   │  Detection  │   │Presentation │       │
//! │  │  (thread)   │   │     Log     │   │  / Hooks    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use tamper_guard::{EventLabel, HostEvent, PartialPolicy, SecurityEngine};
//!
//! let mut engine = SecurityEngine::builder("high", PartialPolicy::default())
//!     .on_logout(|label: EventLabel| {
//!         println!("logging out after {label}");
//!         Ok(())
//!     })
//!     .build();
//!
//! let disposition = engine.dispatch(&HostEvent::key_down("PrintScreen", Utc::now()));
//! assert!(disposition.prevent_default);
//! assert!(engine.locked());
//!
//! engine.unlock();
//! assert!(engine.suspicious());
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod detector;
pub mod guard;
pub mod presentation;

// Re-export key types at crate root for convenience
pub use audit::{DetectionLog, DetectionStats, SharedDetectionLog};
pub use config::{Config, ConfigError, DetectorThresholds, RouteGuardConfig, WatermarkConfig};
pub use core::{
    merge_policy, EngineBuilder, EventLabel, HookError, PartialPolicy, Phase, Policy,
    SecurityEngine, SecurityLevel, SecuritySnapshot, SecurityState, SnapshotBuilder, StateView,
};
pub use detector::{
    Detector, DetectorError, DetectorKind, Disposition, HostCapabilities, HostEvent, ProbeError,
    ProbeVerdict, ProxyProbe, Viewport,
};
pub use guard::{enforce_top_level, FrameContext, FrameVerdict, Navigator, RouteGuard, RouteVerdict};
pub use presentation::{
    resolve_display_text, resolve_display_text_for, PresentationState, Surface, Watermark,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disclaimer that can be displayed to operators.
pub const DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 TAMPER-GUARD - WHAT THIS IS (NOT)                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  tamper-guard raises the cost of casual content extraction.      ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Notices docked developer tools and inspect shortcuts        ║
║    • Blocks PrintScreen, copy, cut, paste and the context menu   ║
║    • Flags automated or ghosted keystrokes                       ║
║    • Flags datacenter (VPN / proxy) network addresses             ║
║    • Locks, watermarks or logs out the session on detection      ║
║                                                                  ║
║  ✗ WHAT IT IS NOT:                                               ║
║    • Not DRM and not an anti-tamper guarantee                    ║
║    • Not proof of wrongdoing: every signal is a heuristic        ║
║    • Not a defense against a determined adversary                ║
║                                                                  ║
║  Key content is never stored. Only timing and held-key counts    ║
║  are examined, and nothing is persisted after the session.       ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

//! Heuristic detectors and their registration lifecycle.
//!
//! Each detector watches the host event stream for one behavioral pattern
//! and reports matches through the `emit` callback with a fixed
//! [`EventLabel`]. Detectors never touch the security state themselves.
//!
//! Registration goes through [`DetectorRegistry`], which starts a detector
//! against the host's capabilities and hands back a [`Teardown`] handle.
//! A detector whose capability is missing fails to start and is simply not
//! registered.

pub mod capture;
pub mod clipboard;
pub mod devtools;
pub mod inspect;
pub mod keystroke;
pub mod network;
pub mod types;

use crate::core::label::EventLabel;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use capture::{FrameFreezeDetector, ScreenshotDetector};
pub use clipboard::ClipboardDetector;
pub use devtools::{is_devtools_open, DevtoolsDetector};
pub use inspect::{InspectDetector, InspectOptions};
pub use keystroke::{GhostingDetector, KeystrokeTimingDetector};
pub use network::{
    is_datacenter_org, AddressSource, NetworkDetector, ProbeError, ProbeFuture, ProbeStatus,
    ProxyProbe, StaticAddress,
};
#[cfg(feature = "network")]
pub use network::IpApiProbe;
pub use types::{
    Capability, ClipboardAction, ContextTarget, Disposition, HostCapabilities, HostEvent,
    ProbeVerdict, Viewport,
};

/// Identifies a detector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Devtools,
    Screenshot,
    FrameFreeze,
    Clipboard,
    Ghosting,
    KeystrokeTiming,
    Inspect,
    Network,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 8] = [
        DetectorKind::Devtools,
        DetectorKind::Screenshot,
        DetectorKind::FrameFreeze,
        DetectorKind::Clipboard,
        DetectorKind::Ghosting,
        DetectorKind::KeystrokeTiming,
        DetectorKind::Inspect,
        DetectorKind::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectorKind::Devtools => "devtools",
            DetectorKind::Screenshot => "screenshot",
            DetectorKind::FrameFreeze => "frame_freeze",
            DetectorKind::Clipboard => "clipboard",
            DetectorKind::Ghosting => "ghosting",
            DetectorKind::KeystrokeTiming => "keystroke_timing",
            DetectorKind::Inspect => "inspect",
            DetectorKind::Network => "network",
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a detector may consult when it starts.
pub struct StartContext<'a> {
    pub capabilities: HostCapabilities,
    /// Last viewport the host reported, if any
    pub viewport: Option<Viewport>,
    pub now: DateTime<Utc>,
    /// Queue for posting events back to the engine from background work
    pub events: &'a Sender<HostEvent>,
}

impl StartContext<'_> {
    /// Fail with [`DetectorError::Unavailable`] unless the host has `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), DetectorError> {
        if self.capabilities.has(capability) {
            Ok(())
        } else {
            Err(DetectorError::Unavailable(capability))
        }
    }
}

/// A single heuristic.
pub trait Detector {
    fn kind(&self) -> DetectorKind;

    /// Begin watching. An error leaves the detector unregistered.
    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError>;

    /// Observe one host event, calling `emit` for every pattern match.
    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition;

    /// Release timers and pending work. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Errors that can occur while starting a detector.
#[derive(Debug)]
pub enum DetectorError {
    /// The host lacks a capability the detector needs
    Unavailable(Capability),
    /// The detector could not set up its background work
    StartFailed(String),
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::Unavailable(cap) => write!(f, "Host capability unavailable: {cap}"),
            DetectorError::StartFailed(e) => write!(f, "Detector failed to start: {e}"),
        }
    }
}

impl std::error::Error for DetectorError {}

/// Handle returned by [`DetectorRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Teardown(u64);

struct Registration {
    handle: Teardown,
    detector: Box<dyn Detector>,
}

/// The set of live detectors, in registration order.
#[derive(Default)]
pub struct DetectorRegistry {
    next_id: u64,
    active: Vec<Registration>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `detector` and keep it if it started.
    pub fn register(
        &mut self,
        mut detector: Box<dyn Detector>,
        ctx: &StartContext<'_>,
    ) -> Result<Teardown, DetectorError> {
        detector.start(ctx)?;
        self.next_id += 1;
        let handle = Teardown(self.next_id);
        tracing::debug!(detector = %detector.kind(), "detector registered");
        self.active.push(Registration { handle, detector });
        Ok(handle)
    }

    /// Stop and drop one registration. Returns false if it was already gone.
    pub fn teardown(&mut self, handle: Teardown) -> bool {
        match self.active.iter().position(|r| r.handle == handle) {
            Some(index) => {
                let mut registration = self.active.remove(index);
                registration.detector.stop();
                tracing::debug!(detector = %registration.detector.kind(), "detector torn down");
                true
            }
            None => false,
        }
    }

    /// Stop and drop everything.
    pub fn teardown_all(&mut self) {
        for mut registration in self.active.drain(..) {
            registration.detector.stop();
        }
    }

    /// Feed one event to every detector in registration order.
    pub fn dispatch(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        self.active
            .iter_mut()
            .fold(Disposition::default(), |acc, registration| {
                acc.merge(registration.detector.handle(event, emit))
            })
    }

    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.active.iter().map(|r| r.detector.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

//! The security engine: policy, state machine and detector lifecycle.
//!
//! One engine owns one session. It merges the level preset with the
//! caller's overrides, registers a detector for every enabled flag, and
//! funnels every detection through [`SecurityEngine::mark_suspicious`].
//!
//! The engine is a single writer. Host events (and verdicts posted back by
//! background probes) arrive through [`SecurityEngine::dispatch`] or the
//! engine's own queue, and are processed one at a time.

use crate::audit::{create_shared_log, SharedDetectionLog};
use crate::config::{Config, DetectorThresholds, WatermarkConfig};
use crate::core::label::EventLabel;
use crate::core::policy::{PartialPolicy, Policy, SecurityLevel};
use crate::core::snapshot::{SecuritySnapshot, SnapshotBuilder};
use crate::core::state::{SecurityState, StateView};
use crate::core::wiring::{self, DetectorPlan};
use crate::detector::{
    DetectorKind, DetectorRegistry, Disposition, HostCapabilities, HostEvent, ProxyProbe,
    StartContext, Teardown, Viewport,
};
use crate::presentation::{NullSurface, PresentationState, Surface, Watermark};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity of the engine's event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Heartbeat interval used by [`SecurityEngine::run`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Callback invoked with the label of a detection.
pub type Hook = Box<dyn FnMut(EventLabel) -> Result<(), HookError>>;

/// Failure reported by a caller-supplied hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError(String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hook failed: {}", self.0)
    }
}

impl std::error::Error for HookError {}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Configures a [`SecurityEngine`] before its detectors start.
pub struct EngineBuilder {
    level: SecurityLevel,
    overrides: PartialPolicy,
    thresholds: DetectorThresholds,
    watermark: WatermarkConfig,
    capabilities: HostCapabilities,
    viewport: Option<Viewport>,
    on_detect: Option<Hook>,
    on_logout: Option<Hook>,
    surface: Box<dyn Surface>,
    probe: Option<Arc<dyn ProxyProbe>>,
    audit: Option<SharedDetectionLog>,
}

impl EngineBuilder {
    /// Detector tuning.
    pub fn thresholds(mut self, thresholds: DetectorThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Session watermark settings.
    pub fn watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.watermark = watermark;
        self
    }

    /// Take thresholds and watermark settings from a loaded [`Config`].
    pub fn config(self, config: &Config) -> Self {
        self.thresholds(config.thresholds.clone())
            .watermark(config.watermark.clone())
    }

    /// Called after every detection, with the state already updated.
    pub fn on_detect<F>(mut self, hook: F) -> Self
    where
        F: FnMut(EventLabel) -> Result<(), HookError> + 'static,
    {
        self.on_detect = Some(Box::new(hook));
        self
    }

    /// Called after every detection when the policy has `autoLogout`.
    pub fn on_logout<F>(mut self, hook: F) -> Self
    where
        F: FnMut(EventLabel) -> Result<(), HookError> + 'static,
    {
        self.on_logout = Some(Box::new(hook));
        self
    }

    pub fn surface<S: Surface + 'static>(mut self, surface: S) -> Self {
        self.surface = Box::new(surface);
        self
    }

    /// What the host environment supports. Defaults to everything.
    pub fn capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Initial window geometry, measured by detectors at start.
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Proxy probe used when `detectVPN` is on. Without one the network
    /// detector is unavailable.
    pub fn probe(mut self, probe: Arc<dyn ProxyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share a detection log, e.g. to read it after the engine is gone.
    pub fn audit(mut self, audit: SharedDetectionLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Start the engine: register detectors and apply page overlays.
    pub fn build(self) -> SecurityEngine {
        let (sender, receiver) = bounded(EVENT_QUEUE_CAPACITY);
        let policy = Policy::merged(self.level, &self.overrides);

        let mut engine = SecurityEngine {
            level: self.level,
            overrides: self.overrides,
            policy,
            state: SecurityState::default(),
            view: StateView::default(),
            thresholds: self.thresholds,
            watermark: self.watermark,
            capabilities: self.capabilities,
            viewport: self.viewport,
            clock: None,
            registry: DetectorRegistry::new(),
            active: BTreeMap::new(),
            on_detect: self.on_detect,
            on_logout: self.on_logout,
            surface: self.surface,
            watermark_shown: false,
            noise_shown: false,
            probe: self.probe,
            audit: self.audit.unwrap_or_else(create_shared_log),
            sender,
            receiver,
            disposed: false,
        };

        engine.sync_detectors();
        engine.sync_overlays(None);

        tracing::info!(
            level = %engine.level,
            detectors = engine.registry.len(),
            "security engine started"
        );
        engine
    }
}

/// Owner of one session's security state.
pub struct SecurityEngine {
    level: SecurityLevel,
    overrides: PartialPolicy,
    policy: Policy,
    state: SecurityState,
    view: StateView,
    thresholds: DetectorThresholds,
    watermark: WatermarkConfig,
    capabilities: HostCapabilities,
    /// Last geometry reported by the host
    viewport: Option<Viewport>,
    /// Timestamp of the last dispatched event
    clock: Option<DateTime<Utc>>,
    registry: DetectorRegistry,
    active: BTreeMap<DetectorKind, (Teardown, DetectorPlan)>,
    on_detect: Option<Hook>,
    on_logout: Option<Hook>,
    surface: Box<dyn Surface>,
    watermark_shown: bool,
    noise_shown: bool,
    probe: Option<Arc<dyn ProxyProbe>>,
    audit: SharedDetectionLog,
    sender: Sender<HostEvent>,
    receiver: Receiver<HostEvent>,
    disposed: bool,
}

impl SecurityEngine {
    /// Start an engine with default thresholds, no hooks and no surface.
    ///
    /// Unknown level names resolve to `medium`.
    pub fn create(level: &str, overrides: PartialPolicy) -> Self {
        Self::builder(level, overrides).build()
    }

    pub fn builder(level: &str, overrides: PartialPolicy) -> EngineBuilder {
        EngineBuilder {
            level: SecurityLevel::from_name(level),
            overrides,
            thresholds: DetectorThresholds::default(),
            watermark: WatermarkConfig::default(),
            capabilities: HostCapabilities::default(),
            viewport: None,
            on_detect: None,
            on_logout: None,
            surface: Box::new(NullSurface),
            probe: None,
            audit: None,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SecurityState {
        self.state
    }

    pub fn suspicious(&self) -> bool {
        self.state.suspicious()
    }

    pub fn locked(&self) -> bool {
        self.state.locked()
    }

    pub fn last_event(&self) -> Option<EventLabel> {
        self.state.last_event()
    }

    /// A read-only view that always reflects the latest state, including
    /// from inside hooks.
    pub fn watch(&self) -> StateView {
        self.view.clone()
    }

    pub fn effective_policy(&self) -> &Policy {
        &self.policy
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn overrides(&self) -> &PartialPolicy {
        &self.overrides
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }

    /// Kinds of the detectors currently registered.
    pub fn active_detectors(&self) -> Vec<DetectorKind> {
        self.registry.kinds()
    }

    pub fn audit(&self) -> &SharedDetectionLog {
        &self.audit
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// What a protected page should render right now.
    pub fn presentation(&self) -> PresentationState {
        PresentationState::derive(&self.state, &self.policy)
    }

    pub fn snapshot(&self, builder: &SnapshotBuilder) -> SecuritySnapshot {
        builder.build(self.state, &self.policy, self.active_detectors())
    }

    /// Record a detection.
    ///
    /// Order: suspicion, last event, lock (under `lockOnSuspicious`), then
    /// `on_detect`, then `on_logout` (under `autoLogout`). A failing or
    /// panicking hook is logged and does not stop the hooks after it.
    pub fn mark_suspicious(&mut self, label: EventLabel) {
        if self.disposed {
            tracing::debug!(label = %label, "detection after dispose ignored");
            return;
        }

        let newly_locked = self.state.flag(label, self.policy.lock_on_suspicious);
        self.view.publish(self.state);
        self.audit.record_detection(label);

        if newly_locked {
            self.audit.record_lock();
            tracing::info!(label = %label, "suspicious activity, session locked");
        } else {
            tracing::info!(label = %label, locked = self.state.locked(), "suspicious activity");
        }

        if let Some(hook) = self.on_detect.as_mut() {
            run_hook("on_detect", hook, label, &self.audit);
        }
        if self.policy.auto_logout {
            if let Some(hook) = self.on_logout.as_mut() {
                run_hook("on_logout", hook, label, &self.audit);
            }
        }
    }

    /// Release the lock. Suspicion and the last event are kept.
    ///
    /// Also clears the session watermark. Calling it again is harmless.
    pub fn unlock(&mut self) {
        if self.state.release() {
            self.audit.record_unlock();
            tracing::info!("session unlocked");
        }
        self.view.publish(self.state);

        if self.watermark_shown {
            self.surface.clear_watermark();
            self.watermark_shown = false;
        }
    }

    /// Feed one host event to every active detector and apply whatever
    /// they detect.
    pub fn dispatch(&mut self, event: &HostEvent) -> Disposition {
        if self.disposed {
            return Disposition::default();
        }

        self.clock = Some(event.timestamp());
        if let HostEvent::Resize { viewport, .. } = event {
            self.viewport = Some(*viewport);
        }

        let mut labels = Vec::new();
        let disposition = self
            .registry
            .dispatch(event, &mut |label: EventLabel| labels.push(label));

        for label in labels {
            self.mark_suspicious(label);
        }
        disposition
    }

    /// Queue handle for hosts and background work.
    pub fn sender(&self) -> Sender<HostEvent> {
        self.sender.clone()
    }

    /// Process every queued event without blocking. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.dispatch(&event);
            processed += 1;
        }
        processed
    }

    /// Process queued events until `running` clears, ticking the detectors
    /// in between. Events still queued when the flag clears are processed
    /// before returning.
    ///
    /// Ticks follow the host's clock: the timestamp of the last event
    /// received plus the time elapsed since, so a recorded script replays
    /// with its own timing.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut last_tick = Instant::now();
        let mut anchor = (self.clock.unwrap_or_else(Utc::now), Instant::now());

        while running.load(Ordering::SeqCst) && !self.disposed {
            match self.receiver.recv_timeout(TICK_INTERVAL) {
                Ok(event) => {
                    anchor = (event.timestamp(), Instant::now());
                    self.dispatch(&event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if last_tick.elapsed() >= TICK_INTERVAL {
                let elapsed = chrono::Duration::from_std(anchor.1.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                self.dispatch(&HostEvent::Tick {
                    at: anchor.0 + elapsed,
                });
                last_tick = Instant::now();
            }
        }

        let drained = self.pump();
        if drained > 0 {
            tracing::debug!(events = drained, "drained queue on stop");
        }
    }

    /// Switch to a new level and overrides.
    ///
    /// Returns false, touching nothing, when the merged policy is unchanged.
    /// Otherwise only detectors whose settings changed are re-registered.
    pub fn reconfigure(&mut self, level: &str, overrides: PartialPolicy) -> bool {
        let level = SecurityLevel::from_name(level);
        let policy = Policy::merged(level, &overrides);
        self.level = level;
        self.overrides = overrides;

        if self.disposed || policy == self.policy {
            tracing::debug!(level = %level, "policy unchanged");
            return false;
        }

        let previous = std::mem::replace(&mut self.policy, policy);
        self.sync_detectors();
        self.sync_overlays(Some(&previous));

        tracing::info!(
            level = %level,
            detectors = self.registry.len(),
            "policy reconfigured"
        );
        true
    }

    /// Replace detector tuning, re-registering the detectors it affects.
    pub fn set_thresholds(&mut self, thresholds: DetectorThresholds) {
        if self.disposed || thresholds == self.thresholds {
            return;
        }
        self.thresholds = thresholds;
        self.sync_detectors();
    }

    /// Tear down every detector and overlay. Idempotent; also run on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.registry.teardown_all();
        self.active.clear();

        if self.watermark_shown {
            self.surface.clear_watermark();
            self.watermark_shown = false;
        }
        if self.noise_shown {
            self.surface.remove_noise();
            self.noise_shown = false;
        }

        self.disposed = true;
        tracing::info!("security engine disposed");
    }

    /// Bring the registry in line with the current policy and thresholds.
    fn sync_detectors(&mut self) {
        let desired = wiring::plan(&self.policy, &self.thresholds);

        let stale: Vec<DetectorKind> = self
            .active
            .iter()
            .filter(|(kind, (_, plan))| desired.get(*kind) != Some(plan))
            .map(|(kind, _)| *kind)
            .collect();
        for kind in stale {
            if let Some((handle, _)) = self.active.remove(&kind) {
                self.registry.teardown(handle);
            }
        }

        let ctx = StartContext {
            capabilities: self.capabilities,
            viewport: self.viewport,
            now: self.clock.unwrap_or_else(Utc::now),
            events: &self.sender,
        };

        for (kind, plan) in desired {
            if self.active.contains_key(&kind) {
                continue;
            }
            match self.registry.register(plan.build(self.probe.clone()), &ctx) {
                Ok(handle) => {
                    self.active.insert(kind, (handle, plan));
                }
                Err(e) => {
                    tracing::warn!(detector = %kind, error = %e, "detector disabled");
                    self.audit.record_degraded_detector();
                }
            }
        }
    }

    /// Apply or remove overlays whose enabling flag changed.
    fn sync_overlays(&mut self, previous: Option<&Policy>) {
        let was_watermarked = previous.map(|p| p.enable_watermark).unwrap_or(false);
        if self.policy.enable_watermark && !was_watermarked {
            let watermark = Watermark::session(&self.watermark, Utc::now(), &mut rand::thread_rng());
            self.surface.apply_watermark(&watermark);
            self.watermark_shown = true;
        } else if !self.policy.enable_watermark && self.watermark_shown {
            self.surface.clear_watermark();
            self.watermark_shown = false;
        }

        if self.policy.noise_overlay && !self.noise_shown {
            self.surface.show_noise();
            self.noise_shown = true;
        } else if !self.policy.noise_overlay && self.noise_shown {
            self.surface.remove_noise();
            self.noise_shown = false;
        }
    }
}

impl Drop for SecurityEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_hook(name: &'static str, hook: &mut Hook, label: EventLabel, audit: &SharedDetectionLog) {
    match catch_unwind(AssertUnwindSafe(|| hook(label))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(hook = name, label = %label, error = %e, "hook failed");
            audit.record_hook_failure();
        }
        Err(_) => {
            tracing::warn!(hook = name, label = %label, "hook panicked");
            audit.record_hook_failure();
        }
    }
}

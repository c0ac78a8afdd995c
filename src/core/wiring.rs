//! Which detectors a policy turns on, and with what settings.
//!
//! The engine compares plans across reconfigurations: a detector is only
//! torn down and re-registered when its own plan changed.

use crate::config::DetectorThresholds;
use crate::core::policy::Policy;
use crate::detector::clipboard::ClipboardOptions;
use crate::detector::{
    ClipboardDetector, Detector, DetectorKind, DevtoolsDetector, FrameFreezeDetector,
    GhostingDetector, InspectDetector, InspectOptions, KeystrokeTimingDetector, NetworkDetector,
    ProxyProbe, ScreenshotDetector,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Construction settings for one detector.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DetectorPlan {
    Devtools {
        threshold_px: u32,
        poll_interval: Duration,
    },
    Screenshot {
        freeze_min: Duration,
        freeze_max: Duration,
        capture_window: Duration,
    },
    FrameFreeze {
        min: Duration,
        max: Duration,
    },
    Clipboard(ClipboardOptions),
    Ghosting {
        keys: usize,
    },
    KeystrokeTiming {
        interval: Duration,
        run: u32,
    },
    Inspect(InspectOptions),
    Network {
        timeout: Duration,
    },
}

impl DetectorPlan {
    pub(crate) fn build(&self, probe: Option<Arc<dyn ProxyProbe>>) -> Box<dyn Detector> {
        match self {
            DetectorPlan::Devtools {
                threshold_px,
                poll_interval,
            } => Box::new(DevtoolsDetector::new(*threshold_px, *poll_interval)),
            DetectorPlan::Screenshot {
                freeze_min,
                freeze_max,
                capture_window,
            } => Box::new(ScreenshotDetector::new(
                *freeze_min,
                *freeze_max,
                *capture_window,
            )),
            DetectorPlan::FrameFreeze { min, max } => Box::new(FrameFreezeDetector::new(*min, *max)),
            DetectorPlan::Clipboard(options) => Box::new(ClipboardDetector::new(*options)),
            DetectorPlan::Ghosting { keys } => Box::new(GhostingDetector::new(*keys)),
            DetectorPlan::KeystrokeTiming { interval, run } => {
                Box::new(KeystrokeTimingDetector::new(*interval, *run))
            }
            DetectorPlan::Inspect(options) => Box::new(InspectDetector::new(*options)),
            DetectorPlan::Network { timeout } => Box::new(NetworkDetector::new(probe, *timeout)),
        }
    }
}

/// Every detector `policy` enables. Disabled flags contribute nothing.
pub(crate) fn plan(policy: &Policy, t: &DetectorThresholds) -> BTreeMap<DetectorKind, DetectorPlan> {
    let mut plans = BTreeMap::new();

    if policy.block_dev_tools {
        plans.insert(
            DetectorKind::Devtools,
            DetectorPlan::Devtools {
                threshold_px: t.devtools_size_px,
                poll_interval: t.devtools_poll_interval,
            },
        );
    }

    if policy.block_screenshot {
        plans.insert(
            DetectorKind::Screenshot,
            DetectorPlan::Screenshot {
                freeze_min: t.freeze_min,
                freeze_max: t.freeze_max,
                capture_window: t.capture_window,
            },
        );
        plans.insert(
            DetectorKind::FrameFreeze,
            DetectorPlan::FrameFreeze {
                min: t.freeze_min,
                max: t.freeze_max,
            },
        );
    }

    if policy.block_copy {
        plans.insert(
            DetectorKind::Clipboard,
            DetectorPlan::Clipboard(ClipboardOptions::default()),
        );
    }

    if policy.detect_keystroke_tamper {
        plans.insert(
            DetectorKind::Ghosting,
            DetectorPlan::Ghosting {
                keys: t.ghosting_keys,
            },
        );
        plans.insert(
            DetectorKind::KeystrokeTiming,
            DetectorPlan::KeystrokeTiming {
                interval: t.keystroke_interval,
                run: t.keystroke_run,
            },
        );
    }

    if policy.block_inspect {
        plans.insert(
            DetectorKind::Inspect,
            DetectorPlan::Inspect(InspectOptions {
                detect_context_menu: policy.detect_context_menu,
                detect_mobile: policy.detect_mobile,
                detect_zoom: policy.detect_zoom,
                long_press: t.long_press,
                zoom_ratio: t.zoom_ratio,
            }),
        );
    }

    if policy.detect_vpn {
        plans.insert(
            DetectorKind::Network,
            DetectorPlan::Network {
                timeout: t.network_timeout,
            },
        );
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::SecurityLevel;

    #[test]
    fn test_low_enables_devtools_only() {
        let plans = plan(&SecurityLevel::Low.preset(), &DetectorThresholds::default());
        assert_eq!(plans.keys().copied().collect::<Vec<_>>(), vec![DetectorKind::Devtools]);
    }

    #[test]
    fn test_medium_enables_everything_but_inspect() {
        let plans = plan(&SecurityLevel::Medium.preset(), &DetectorThresholds::default());
        assert_eq!(plans.len(), DetectorKind::ALL.len() - 1);
        assert!(!plans.contains_key(&DetectorKind::Inspect));
    }

    #[test]
    fn test_inspect_sub_options_follow_policy() {
        let mut policy = SecurityLevel::Low.preset();
        policy.block_inspect = true;
        policy.detect_zoom = false;
        let plans = plan(&policy, &DetectorThresholds::default());

        match plans.get(&DetectorKind::Inspect) {
            Some(DetectorPlan::Inspect(options)) => {
                assert!(options.detect_context_menu);
                assert!(!options.detect_zoom);
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_threshold_change_alters_only_its_plan() {
        let policy = SecurityLevel::Medium.preset();
        let before = plan(&policy, &DetectorThresholds::default());
        let after = plan(
            &policy,
            &DetectorThresholds {
                ghosting_keys: 6,
                ..Default::default()
            },
        );

        let changed: Vec<DetectorKind> = before
            .iter()
            .filter(|(kind, p)| after.get(*kind) != Some(*p))
            .map(|(kind, _)| *kind)
            .collect();
        assert_eq!(changed, vec![DetectorKind::Ghosting]);
    }
}

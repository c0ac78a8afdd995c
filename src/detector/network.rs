//! Network / proxy detection.
//!
//! A one-shot probe per activation: resolve the host's candidate address,
//! look up the organisation that owns it, and flag datacenter ranges that
//! usually mean a VPN or hosted proxy. The probe runs on its own thread so
//! engine start-up never waits on the network; its verdict re-enters the
//! engine as a [`HostEvent::ProbeVerdict`] and is handled like any other
//! event. Every failure (no address, request error, timeout, panic)
//! resolves to "not suspicious".

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, Disposition, HostEvent, ProbeVerdict};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Future returned by a [`ProxyProbe`].
pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeVerdict, ProbeError>> + Send + 'static>>;

/// An asynchronous proxy/VPN check.
pub trait ProxyProbe: Send + Sync {
    fn check(&self) -> ProbeFuture;
}

/// Supplies the address the host would expose to peers (the ICE candidate
/// address in a browser).
pub trait AddressSource: Send + Sync {
    fn candidate_address(&self) -> Option<IpAddr>;
}

impl<F> AddressSource for F
where
    F: Fn() -> Option<IpAddr> + Send + Sync,
{
    fn candidate_address(&self) -> Option<IpAddr> {
        self()
    }
}

/// An address fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct StaticAddress(pub IpAddr);

impl AddressSource for StaticAddress {
    fn candidate_address(&self) -> Option<IpAddr> {
        Some(self.0)
    }
}

/// Errors a probe can report. None of them reach the security state.
#[derive(Debug)]
pub enum ProbeError {
    /// The host cannot provide what the probe needs
    Unavailable(String),
    /// Request failed
    Network(String),
    /// Response could not be understood
    Parse(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Unavailable(msg) => write!(f, "Probe unavailable: {msg}"),
            ProbeError::Network(msg) => write!(f, "Probe network error: {msg}"),
            ProbeError::Parse(msg) => write!(f, "Probe parse error: {msg}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Case-insensitive substring match of `org` against the datacenter patterns.
pub fn is_datacenter_org(org: &str, patterns: &[String]) -> bool {
    let org = org.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| org.contains(&p.to_lowercase()))
}

/// Progress of the current activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Idle,
    Pending,
    Clean,
    Suspicious,
}

/// Generations are global so a verdict from a torn-down activation can never
/// match a newer one.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub struct NetworkDetector {
    probe: Option<Arc<dyn ProxyProbe>>,
    timeout: Duration,
    generation: u64,
    cancelled: Option<Arc<AtomicBool>>,
    status: ProbeStatus,
}

impl NetworkDetector {
    pub fn new(probe: Option<Arc<dyn ProxyProbe>>, timeout: Duration) -> Self {
        Self {
            probe,
            timeout,
            generation: 0,
            cancelled: None,
            status: ProbeStatus::Idle,
        }
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }
}

impl Detector for NetworkDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Network
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Network)?;
        let probe = self
            .probe
            .clone()
            .ok_or_else(|| DetectorError::StartFailed("no network probe configured".to_string()))?;

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let sender = ctx.events.clone();
        let timeout = self.timeout;
        let flag = cancelled.clone();

        thread::Builder::new()
            .name("tamper-guard-probe".to_string())
            .spawn(move || {
                let verdict = run_probe(probe, timeout);
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                let _ = sender.send(HostEvent::ProbeVerdict {
                    generation,
                    verdict,
                    at: Utc::now(),
                });
            })
            .map_err(|e| DetectorError::StartFailed(e.to_string()))?;

        self.generation = generation;
        self.cancelled = Some(cancelled);
        self.status = ProbeStatus::Pending;
        Ok(())
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        if let HostEvent::ProbeVerdict {
            generation,
            verdict,
            ..
        } = event
        {
            if *generation == self.generation && self.status == ProbeStatus::Pending {
                if verdict.suspicious {
                    tracing::info!(
                        address = verdict.address.as_deref().unwrap_or("unknown"),
                        org = verdict.org.as_deref().unwrap_or("unknown"),
                        "datacenter address detected"
                    );
                    self.status = ProbeStatus::Suspicious;
                    emit(EventLabel::VpnDetected);
                } else {
                    self.status = ProbeStatus::Clean;
                }
            }
        }
        Disposition::default()
    }

    fn stop(&mut self) {
        if let Some(flag) = self.cancelled.take() {
            flag.store(true, Ordering::SeqCst);
        }
        if self.status == ProbeStatus::Pending {
            self.status = ProbeStatus::Idle;
        }
    }
}

/// Drive one probe to completion on a private runtime, bounded by `timeout`.
fn run_probe(probe: Arc<dyn ProxyProbe>, timeout: Duration) -> ProbeVerdict {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(error = %e, "could not start probe runtime");
            return ProbeVerdict::not_suspicious();
        }
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(async { tokio::time::timeout(timeout, probe.check()).await })
    }));

    match outcome {
        Ok(Ok(Ok(verdict))) => verdict,
        Ok(Ok(Err(e))) => {
            tracing::debug!(error = %e, "network probe failed");
            ProbeVerdict::not_suspicious()
        }
        Ok(Err(_)) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "network probe timed out");
            ProbeVerdict::not_suspicious()
        }
        Err(_) => {
            tracing::warn!("network probe panicked");
            ProbeVerdict::not_suspicious()
        }
    }
}

/// Organisation lookup against an ipapi.co-compatible endpoint.
#[cfg(feature = "network")]
pub struct IpApiProbe {
    source: Arc<dyn AddressSource>,
    client: reqwest::Client,
    endpoint: String,
    patterns: Vec<String>,
}

#[cfg(feature = "network")]
#[derive(Debug, Deserialize)]
struct OrgLookup {
    #[serde(default)]
    org: Option<String>,
}

#[cfg(feature = "network")]
impl IpApiProbe {
    pub const DEFAULT_ENDPOINT: &'static str = "https://ipapi.co";

    pub fn new(
        source: Arc<dyn AddressSource>,
        patterns: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;

        Ok(Self {
            source,
            client,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            patterns,
        })
    }

    /// Point the probe at a different lookup service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Lookup URL for an address.
    pub fn lookup_url(&self, ip: IpAddr) -> String {
        format!("{}/{}/json/", self.endpoint.trim_end_matches('/'), ip)
    }
}

#[cfg(feature = "network")]
impl ProxyProbe for IpApiProbe {
    fn check(&self) -> ProbeFuture {
        let address = self.source.candidate_address();
        let client = self.client.clone();
        let patterns = self.patterns.clone();
        let url = address.map(|ip| self.lookup_url(ip));

        Box::pin(async move {
            let (ip, url) = match (address, url) {
                (Some(ip), Some(url)) => (ip, url),
                _ => return Err(ProbeError::Unavailable("no candidate address".to_string())),
            };

            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| ProbeError::Network(e.to_string()))?;
            let lookup: OrgLookup = response
                .json()
                .await
                .map_err(|e| ProbeError::Parse(e.to_string()))?;

            let org = lookup.org.unwrap_or_default();
            Ok(ProbeVerdict {
                suspicious: is_datacenter_org(&org, &patterns),
                address: Some(ip.to_string()),
                org: Some(org),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::types::HostCapabilities;
    use crossbeam_channel::{bounded, Receiver, Sender};

    struct FixedProbe(Result<bool, ()>);

    impl ProxyProbe for FixedProbe {
        fn check(&self) -> ProbeFuture {
            let result = self.0;
            Box::pin(async move {
                match result {
                    Ok(suspicious) => Ok(ProbeVerdict {
                        suspicious,
                        address: Some("203.0.113.7".to_string()),
                        org: Some("DigitalOcean, LLC".to_string()),
                    }),
                    Err(()) => Err(ProbeError::Network("connection refused".to_string())),
                }
            })
        }
    }

    struct HangingProbe;

    impl ProxyProbe for HangingProbe {
        fn check(&self) -> ProbeFuture {
            Box::pin(std::future::pending())
        }
    }

    fn start(detector: &mut NetworkDetector, tx: &Sender<HostEvent>) -> Result<(), DetectorError> {
        detector.start(&StartContext {
            capabilities: HostCapabilities::default(),
            viewport: None,
            now: Utc::now(),
            events: tx,
        })
    }

    fn deliver(detector: &mut NetworkDetector, rx: &Receiver<HostEvent>) -> Vec<EventLabel> {
        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("probe never reported");
        let mut fired = Vec::new();
        detector.handle(&event, &mut |l: EventLabel| fired.push(l));
        fired
    }

    #[test]
    fn test_datacenter_patterns() {
        let patterns: Vec<String> = ["amazonaws", "google", "digitalocean", "ovh"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(is_datacenter_org("AS16509 Amazonaws.com, Inc.", &patterns));
        assert!(is_datacenter_org("OVH SAS", &patterns));
        assert!(!is_datacenter_org("Comcast Cable", &patterns));
        assert!(!is_datacenter_org("", &patterns));
        assert!(!is_datacenter_org("anything", &[String::new()]));
    }

    #[test]
    fn test_suspicious_verdict_emits_vpn_label() {
        let (tx, rx) = bounded(4);
        let mut detector = NetworkDetector::new(Some(Arc::new(FixedProbe(Ok(true)))), Duration::from_secs(1));
        start(&mut detector, &tx).unwrap();
        assert_eq!(detector.status(), ProbeStatus::Pending);

        assert_eq!(deliver(&mut detector, &rx), vec![EventLabel::VpnDetected]);
        assert_eq!(detector.status(), ProbeStatus::Suspicious);
    }

    #[test]
    fn test_probe_error_resolves_clean() {
        let (tx, rx) = bounded(4);
        let mut detector = NetworkDetector::new(Some(Arc::new(FixedProbe(Err(())))), Duration::from_secs(1));
        start(&mut detector, &tx).unwrap();

        assert!(deliver(&mut detector, &rx).is_empty());
        assert_eq!(detector.status(), ProbeStatus::Clean);
    }

    #[test]
    fn test_hung_probe_times_out_clean() {
        let (tx, rx) = bounded(4);
        let mut detector = NetworkDetector::new(Some(Arc::new(HangingProbe)), Duration::from_millis(50));
        start(&mut detector, &tx).unwrap();

        assert!(deliver(&mut detector, &rx).is_empty());
        assert_eq!(detector.status(), ProbeStatus::Clean);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let (tx, _rx) = bounded(4);
        let mut detector = NetworkDetector::new(Some(Arc::new(HangingProbe)), Duration::from_secs(30));
        start(&mut detector, &tx).unwrap();

        let mut fired = Vec::new();
        detector.handle(
            &HostEvent::ProbeVerdict {
                generation: 0,
                verdict: ProbeVerdict {
                    suspicious: true,
                    address: None,
                    org: None,
                },
                at: Utc::now(),
            },
            &mut |l: EventLabel| fired.push(l),
        );
        assert!(fired.is_empty());
        detector.stop();
        assert_eq!(detector.status(), ProbeStatus::Idle);
    }

    #[test]
    fn test_missing_probe_or_capability_fails_start() {
        let (tx, _rx) = bounded(4);
        let mut detector = NetworkDetector::new(None, Duration::from_secs(1));
        assert!(matches!(start(&mut detector, &tx), Err(DetectorError::StartFailed(_))));

        let mut detector = NetworkDetector::new(Some(Arc::new(FixedProbe(Ok(true)))), Duration::from_secs(1));
        let result = detector.start(&StartContext {
            capabilities: HostCapabilities {
                network: false,
                ..Default::default()
            },
            viewport: None,
            now: Utc::now(),
            events: &tx,
        });
        assert!(matches!(
            result,
            Err(DetectorError::Unavailable(Capability::Network))
        ));
    }
}

//! Serializable point-in-time view of a session.
//!
//! Hosts that render out of process (or simply log) take a snapshot rather
//! than holding a reference to the engine.

use crate::core::policy::Policy;
use crate::core::state::{Phase, SecurityState};
use crate::detector::DetectorKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "tamper-guard";

/// Producer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    pub producer: SnapshotProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// When the snapshot was taken (RFC3339)
    pub captured_at: String,
    pub phase: Phase,
    pub state: SecurityState,
    pub policy: Policy,
    pub active_detectors: Vec<DetectorKind>,
}

/// Builder for [`SecuritySnapshot`]s sharing one producer identity.
pub struct SnapshotBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
        }
    }

    /// Set the session ID for generated snapshots.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn build(
        &self,
        state: SecurityState,
        policy: &Policy,
        active_detectors: Vec<DetectorKind>,
    ) -> SecuritySnapshot {
        SecuritySnapshot {
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            session_id: self.session_id.clone(),
            captured_at: Utc::now().to_rfc3339(),
            phase: state.phase(),
            state,
            policy: policy.clone(),
            active_detectors,
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

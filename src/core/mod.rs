//! Core functionality for tamper-guard.
//!
//! This module contains:
//! - Event labels and their display strings
//! - Security levels, presets and the policy merge
//! - The suspicion state machine and the engine that drives it
//! - Serializable session snapshots

pub mod engine;
pub mod label;
pub mod policy;
pub mod snapshot;
pub mod state;
mod wiring;

// Re-export commonly used types
pub use engine::{EngineBuilder, Hook, HookError, SecurityEngine, EVENT_QUEUE_CAPACITY, TICK_INTERVAL};
pub use label::{EventLabel, UnknownLabel, DEFAULT_DISPLAY_TEXT};
pub use policy::{merge_policy, PartialPolicy, Policy, PolicyError, SecurityLevel};
pub use snapshot::{SecuritySnapshot, SnapshotBuilder, PRODUCER_NAME};
pub use state::{Phase, SecurityState, StateView};

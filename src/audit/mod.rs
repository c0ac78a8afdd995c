//! Session audit for tamper-guard.
//!
//! Tracks what the engine detected and did during a session so operators
//! can see why a session was locked.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, DetectionLog, DetectionStats, SharedDetectionLog};

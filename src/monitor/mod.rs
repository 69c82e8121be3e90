//! Frame stability monitoring.
//!
//! # Architecture
//!
//! ```text
//! tick (every 1 s) ──▶ FrameSource::capture(sample) ──▶ StabilitySample
//!                                                          │
//!                          SimilarityEstimator (byte size) ▼
//!                                                   StabilityTracker
//!                                                          │
//!        Settling / Triggered / Moved / Watching ◀─────────┘
//! ```
//!
//! Gating (welcome gate, pause flag, active session) lives in
//! [`FrameStabilityMonitor`]; the counting rules live in [`StabilityTracker`].

pub mod runner;
pub mod stability;

pub use runner::{FrameStabilityMonitor, TickOutcome};
pub use stability::{
    ByteSizeEstimator, Observation, SimilarityEstimator, StabilitySample, StabilityState,
    StabilityTracker,
};

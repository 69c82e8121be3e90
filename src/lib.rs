//! Photo Coach: stability-triggered photography coaching.
//!
//! The library watches a camera for a steady scene, asks a vision model for
//! a short directional tip, speaks the answer, and keeps a bounded
//! conversation history between tips.
//!
//! ```text
//! WelcomeGate ──fired──▶ FrameStabilityMonitor ──StableTrigger──▶ CoachingOrchestrator
//!                               │                                   │
//!                               └── movement ── cancel token ──────▶│ capture → infer → synthesize → play
//! ```
//!
//! See [`session::CoachEngine`] for the loop that wires everything together.

pub mod camera;
pub mod config;
pub mod conversation;
pub mod monitor;
pub mod playback;
pub mod session;
pub mod speech;
pub mod vision;

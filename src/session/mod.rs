//! Coaching sessions.
//!
//! * [`CoachingOrchestrator`]: runs one capture → infer → speak session at
//!   a time.
//! * [`CoachEngine`]: greeting, monitor ticks and session scheduling.
//! * [`CancellationToken`]: per-session cancel signal.
//! * [`WelcomeGate`]: keeps the monitor idle until the greeting is done.
//! * [`CoachState`] / [`SharedState`]: state shared with the monitor and UI.

pub mod cancel;
pub mod engine;
pub mod orchestrator;
pub mod state;
pub mod welcome;

#[cfg(test)]
pub(crate) mod testkit;

pub use cancel::CancellationToken;
pub use engine::CoachEngine;
pub use orchestrator::{CoachingOrchestrator, SessionError, SessionOutcome, Trigger};
pub use state::{
    lock_state, new_shared_state, CoachState, CoachingSession, SessionPhase, SharedState,
};
pub use welcome::WelcomeGate;

//! Session state machine and shared coaching state.
//!
//! [`SessionPhase`] drives the orchestrator's per-session state machine.
//! [`CoachState`] is the single source of truth for everything outside the
//! orchestrator needs: the active session (if any), the last tip, the last
//! error, and the monitor's gating flag.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<CoachState>>`, cheap to
//! clone.  Locks are held only between suspension points, never across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use super::cancel::CancellationToken;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// States of one coaching session.
///
/// ```text
/// Idle ──trigger──▶ Capturing ──▶ Inferring ──▶ Synthesizing ──▶ Playing ──▶ Idle
///                       │             │               │              │
///                       └─────────────┴──── token ────┴──────────────┴──▶ Cancelled ──▶ Idle
/// ```
///
/// `Idle` is both the initial state and the state between sessions.  A
/// welcome session starts in `Inferring` because it has nothing to capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Capturing,
    Inferring,
    Synthesizing,
    Playing,
    /// Transient: the token fired and the session is unwinding.
    Cancelled,
}

impl SessionPhase {
    /// Returns `true` outside `Idle`.
    ///
    /// ```
    /// use photo_coach::session::SessionPhase;
    ///
    /// assert!(!SessionPhase::Idle.is_busy());
    /// assert!(SessionPhase::Capturing.is_busy());
    /// assert!(SessionPhase::Cancelled.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }

    /// A short label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Capturing => "Capturing",
            SessionPhase::Inferring => "Thinking",
            SessionPhase::Synthesizing => "Preparing voice",
            SessionPhase::Playing => "Speaking",
            SessionPhase::Cancelled => "Cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// CoachingSession
// ---------------------------------------------------------------------------

/// The one session currently outside `Idle`.
#[derive(Debug, Clone)]
pub struct CoachingSession {
    pub id: u64,
    pub token: CancellationToken,
    pub phase: SessionPhase,
}

// ---------------------------------------------------------------------------
// CoachState
// ---------------------------------------------------------------------------

/// Shared coaching state.
#[derive(Debug, Default)]
pub struct CoachState {
    /// The active session.  `None` means `Idle`; at most one exists.
    pub session: Option<CoachingSession>,

    /// Most recent tip that was spoken (or at least inferred).
    pub last_advice: Option<String>,

    /// Most recent session failure, cleared when a session completes.
    pub last_error: Option<String>,

    /// Number of sessions that played their tip to the end.
    pub completed_sessions: u64,

    /// Number of sessions cancelled by movement, shutdown or deadline.
    pub cancelled_sessions: u64,

    /// Set by the UI to keep the monitor from sampling, e.g. while the user
    /// takes a real photo.
    pub paused: bool,
}

impl CoachState {
    pub fn phase(&self) -> SessionPhase {
        self.session.as_ref().map_or(SessionPhase::Idle, |s| s.phase)
    }

    pub fn is_session_active(&self) -> bool {
        self.session.is_some()
    }

    /// Token of the active session, for the monitor to signal on movement.
    pub fn active_token(&self) -> Option<CancellationToken> {
        self.session.as_ref().map(|s| s.token.clone())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`CoachState`].
pub type SharedState = Arc<Mutex<CoachState>>;

/// Construct a new [`SharedState`] in `Idle`.
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(CoachState::default()))
}

/// Lock the shared state, recovering the data if a holder panicked.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, CoachState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

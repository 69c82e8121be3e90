//! Coaching orchestrator: drives one capture → infer → synthesize → play
//! session at a time.
//!
//! # Session flow
//!
//! ```text
//! Trigger::Stable
//!   └─▶ camera.capture(full)                 [Capturing]
//!         └─▶ vision.infer(history, turn)    [Inferring]
//!               └─▶ window.append(turn, reply)
//!                     └─▶ speech.synthesize  [Synthesizing]
//!                           └─▶ playback     [Playing]  ──▶ Idle
//! Trigger::Welcome skips the capture and asks for a greeting instead.
//! ```
//!
//! Every step races the session's [`CancellationToken`] and the optional
//! session deadline.  A result that arrives after the token fired is
//! dropped, so a cancelled session never touches the conversation window or
//! the speaker.  Every exit path ends in `Idle`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::camera::{CaptureError, CaptureRequest, FrameSource};
use crate::config::CoachConfig;
use crate::conversation::{AmbientContext, ConversationMessage, ConversationWindow};
use crate::playback::{PlaybackController, PlaybackError, PlaybackOutcome};
use crate::speech::{SpeechError, SpeechSynthesizer};
use crate::vision::{CoachPrompt, VisionCoach, VisionError};

use super::cancel::CancellationToken;
use super::state::{lock_state, CoachingSession, SessionPhase, SharedState};

// ---------------------------------------------------------------------------
// Trigger / SessionError / SessionOutcome
// ---------------------------------------------------------------------------

/// Why a session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Greeting before stability monitoring begins.  No frame is captured.
    Welcome,
    /// The monitor saw a stable scene.
    Stable,
}

/// Failures that abort a session.  None of them are retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("vision inference failed: {0}")]
    Vision(#[from] VisionError),

    #[error("speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),

    #[error("playback stopped with an error: {0}")]
    PlaybackInterrupted(String),
}

impl SessionError {
    /// Permission problems are expected until the user grants access; the
    /// rest are transient request failures.
    pub fn is_permission(&self) -> bool {
        matches!(
            self,
            SessionError::Capture(CaptureError::PermissionDenied)
                | SessionError::Playback(PlaybackError::PermissionDenied)
        )
    }
}

/// How a [`CoachingOrchestrator::run_session`] call ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The tip was spoken to the end.
    Completed { advice: String },
    /// The token fired (scene moved, or shutdown).
    Cancelled,
    /// The session ran past its deadline.
    TimedOut,
    /// A collaborator failed.
    Failed(SessionError),
    /// Another session was already running; nothing happened.
    Skipped,
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Completed { .. } => "completed",
            SessionOutcome::Cancelled => "cancelled",
            SessionOutcome::TimedOut => "timed out",
            SessionOutcome::Failed(_) => "failed",
            SessionOutcome::Skipped => "skipped",
        }
    }
}

/// Early exit from a running session.
#[derive(Debug)]
enum Interrupt {
    Cancelled,
    TimedOut,
    Failed(SessionError),
}

impl From<SessionError> for Interrupt {
    fn from(e: SessionError) -> Self {
        Interrupt::Failed(e)
    }
}

/// Resolves at `deadline`, or never.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// CoachingOrchestrator
// ---------------------------------------------------------------------------

struct Conversation {
    window: ConversationWindow,
    /// Ambient context the window was built for.
    ambient: Option<AmbientContext>,
}

/// Runs coaching sessions, at most one at a time.
///
/// All methods take `&self`; concurrent `run_session` calls are safe and
/// every call after the first returns [`SessionOutcome::Skipped`] until the
/// running session is back in `Idle`.
pub struct CoachingOrchestrator {
    state: SharedState,
    camera: Arc<dyn FrameSource>,
    vision: Arc<dyn VisionCoach>,
    speech: Arc<dyn SpeechSynthesizer>,
    playback: PlaybackController,
    prompt: CoachPrompt,
    conversation: Mutex<Conversation>,
    ambient: watch::Receiver<AmbientContext>,
    capture_quality: f32,
    session_timeout: Option<Duration>,
    next_id: AtomicU64,
}

impl CoachingOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`    - shared coaching state (also read by the monitor and UI).
    /// * `camera`   - frame source for the coaching capture.
    /// * `vision`   - vision model client.
    /// * `speech`   - text-to-speech client.
    /// * `playback` - controller for the speaker.
    /// * `config`   - history cap, capture quality, session deadline.
    /// * `ambient`  - latest location context, read at each session start.
    pub fn new(
        state: SharedState,
        camera: Arc<dyn FrameSource>,
        vision: Arc<dyn VisionCoach>,
        speech: Arc<dyn SpeechSynthesizer>,
        playback: PlaybackController,
        config: &CoachConfig,
        ambient: watch::Receiver<AmbientContext>,
    ) -> Self {
        let prompt = CoachPrompt::default();
        let window = ConversationWindow::new(
            config.max_history,
            prompt.system(&AmbientContext::default()),
        );

        Self {
            state,
            camera,
            vision,
            speech,
            playback,
            prompt,
            conversation: Mutex::new(Conversation {
                window,
                ambient: None,
            }),
            ambient,
            capture_quality: config.capture_quality,
            session_timeout: config.session_timeout(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Replace the default instructions.
    pub fn with_prompt(mut self, prompt: CoachPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Run one session end to end.
    pub async fn run_session(&self, trigger: Trigger) -> SessionOutcome {
        let Some((id, token)) = self.begin(trigger) else {
            return SessionOutcome::Skipped;
        };

        let deadline = self.session_timeout.map(|t| Instant::now() + t);
        let result = self.drive(id, trigger, &token, deadline).await;
        self.finish(id, result)
    }

    /// Claim the single session slot.
    fn begin(&self, trigger: Trigger) -> Option<(u64, CancellationToken)> {
        let mut st = lock_state(&self.state);
        if let Some(active) = &st.session {
            log::debug!(
                "session: {trigger:?} trigger ignored, session {} is {}",
                active.id,
                active.phase.label()
            );
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let phase = match trigger {
            Trigger::Welcome => SessionPhase::Inferring,
            Trigger::Stable => SessionPhase::Capturing,
        };
        st.session = Some(CoachingSession {
            id,
            token: token.clone(),
            phase,
        });
        log::debug!("session {id}: Idle → {phase:?} ({trigger:?})");
        Some((id, token))
    }

    async fn drive(
        &self,
        id: u64,
        trigger: Trigger,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<String, Interrupt> {
        self.sync_ambient();

        // ── 1. Capture ───────────────────────────────────────────────────
        let (instruction, image) = match trigger {
            Trigger::Welcome => (self.prompt.welcome().to_string(), None),
            Trigger::Stable => {
                let request = CaptureRequest::full(self.capture_quality);
                let frame = self
                    .step(token, deadline, self.camera.capture(request))
                    .await?
                    .map_err(SessionError::from)?;
                let image = frame
                    .image
                    .ok_or(SessionError::Capture(CaptureError::NoImage))?;
                (self.prompt.coaching().to_string(), Some(image))
            }
        };

        // ── 2. Inference ─────────────────────────────────────────────────
        self.set_phase(id, SessionPhase::Inferring);
        let history = self.conversation().window.snapshot();
        let turn = ConversationMessage::user(instruction, image);

        let reply = match self
            .step(token, deadline, self.vision.infer(&history, &turn, token))
            .await?
        {
            Ok(reply) => reply,
            Err(VisionError::Cancelled) => return Err(Interrupt::Cancelled),
            Err(e) => return Err(SessionError::from(e).into()),
        };
        log::info!("session {id}: advice {reply:?}");

        // Only a reply that beat the token gets here.
        self.conversation()
            .window
            .append(turn, ConversationMessage::assistant(reply.clone()));
        lock_state(&self.state).last_advice = Some(reply.clone());

        // ── 3. Speech synthesis ──────────────────────────────────────────
        self.set_phase(id, SessionPhase::Synthesizing);
        let audio = self
            .step(token, deadline, self.speech.synthesize(&reply))
            .await?
            .map_err(SessionError::from)?;

        // ── 4. Playback ──────────────────────────────────────────────────
        self.set_phase(id, SessionPhase::Playing);
        self.speak(token, deadline, audio).await?;

        Ok(reply)
    }

    /// Await `fut` unless the token fires or the deadline passes first.
    ///
    /// A result that completes after the token was signalled is discarded.
    async fn step<F>(
        &self,
        token: &CancellationToken,
        deadline: Option<Instant>,
        fut: F,
    ) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupt::Cancelled),
            _ = expire(deadline) => {
                token.signal();
                Err(Interrupt::TimedOut)
            }
            out = fut => {
                if token.is_cancelled() {
                    Err(Interrupt::Cancelled)
                } else {
                    Ok(out)
                }
            }
        }
    }

    /// Play `audio` and wait for it, stopping playback on interruption.
    async fn speak(
        &self,
        token: &CancellationToken,
        deadline: Option<Instant>,
        audio: Vec<u8>,
    ) -> Result<(), Interrupt> {
        if token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let completion = self.playback.play(audio).await.map_err(SessionError::from)?;

        let interrupt = tokio::select! {
            biased;
            _ = token.cancelled() => Interrupt::Cancelled,
            _ = expire(deadline) => {
                token.signal();
                Interrupt::TimedOut
            }
            outcome = completion.wait() => match outcome {
                PlaybackOutcome::Finished => return Ok(()),
                PlaybackOutcome::StoppedEarly => Interrupt::Cancelled,
                PlaybackOutcome::Failed(reason) => {
                    Interrupt::Failed(SessionError::PlaybackInterrupted(reason))
                }
            },
        };

        self.playback.stop().await;
        Err(interrupt)
    }

    /// Release the session slot and record the result.
    fn finish(&self, id: u64, result: Result<String, Interrupt>) -> SessionOutcome {
        let outcome = match result {
            Ok(advice) => SessionOutcome::Completed { advice },
            Err(Interrupt::Cancelled) => SessionOutcome::Cancelled,
            Err(Interrupt::TimedOut) => SessionOutcome::TimedOut,
            Err(Interrupt::Failed(e)) => SessionOutcome::Failed(e),
        };

        let mut st = lock_state(&self.state);
        match &outcome {
            SessionOutcome::Completed { .. } => {
                st.completed_sessions += 1;
                st.last_error = None;
            }
            SessionOutcome::Cancelled | SessionOutcome::TimedOut => {
                if let Some(session) = st.session.as_mut() {
                    session.phase = SessionPhase::Cancelled;
                }
                st.cancelled_sessions += 1;
            }
            SessionOutcome::Failed(e) => {
                st.last_error = Some(e.to_string());
            }
            SessionOutcome::Skipped => {}
        }

        let phase = st.phase();
        if st.session.as_ref().is_some_and(|s| s.id == id) {
            st.session = None;
        }
        drop(st);

        match &outcome {
            SessionOutcome::Failed(e) if e.is_permission() => {
                log::info!("session {id}: {phase:?} → Idle ({e})")
            }
            SessionOutcome::Failed(e) => {
                log::warn!("session {id}: {phase:?} → Idle, failed: {e}")
            }
            other => log::debug!("session {id}: {phase:?} → Idle ({})", other.label()),
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Conversation
    // -----------------------------------------------------------------------

    /// Reset the window when the ambient context changed since it was built.
    fn sync_ambient(&self) {
        let current = self.ambient.borrow().clone();
        let mut conv = self.conversation();
        if conv.ambient.as_ref() == Some(&current) {
            return;
        }
        if conv.ambient.is_some() {
            log::info!("session: ambient context changed, resetting conversation");
        }
        conv.window.reset();
        conv.window.set_system_prompt(self.prompt.system(&current));
        conv.ambient = Some(current);
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the conversation as the next request would see it.
    pub fn conversation_snapshot(&self) -> Vec<ConversationMessage> {
        self.conversation().window.snapshot()
    }

    /// Number of stored conversation messages (system entry included).
    pub fn conversation_len(&self) -> usize {
        self.conversation().window.len()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_phase(&self, id: u64, phase: SessionPhase) {
        let mut st = lock_state(&self.state);
        if let Some(session) = st.session.as_mut().filter(|s| s.id == id) {
            log::debug!("session {id}: {:?} → {phase:?}", session.phase);
            session.phase = phase;
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

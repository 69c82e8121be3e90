//! Periodic frame sampler.
//!
//! [`FrameStabilityMonitor::tick`] is called once per monitor period by the
//! engine.  Each tick takes a cheap size-only sample, feeds it to the
//! [`StabilityTracker`] and reports what happened as a [`TickOutcome`].
//!
//! While a session is active the monitor only watches for movement: a large
//! delta signals the session's cancellation token, small deltas are ignored
//! and never count towards the next trigger.

use std::sync::Arc;

use tokio::time::Instant;

use crate::camera::{CaptureRequest, FrameSource};
use crate::config::MonitorConfig;
use crate::session::state::{lock_state, SharedState};
use crate::session::WelcomeGate;

use super::stability::{Observation, StabilitySample, StabilityTracker};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Welcome gate not fired yet, or monitoring paused.  Nothing sampled.
    Gated,
    /// The sample could not be taken; state untouched.
    SampleFailed,
    /// First sample stored; nothing to compare against.
    FirstSample,
    /// Stable, still counting.
    Settling { stable_ticks: u32 },
    /// The scene has been stable long enough: start a session.
    Triggered,
    /// The scene moved.  `cancelled_session` is `true` when an active
    /// session's token was signalled.
    Moved { delta: f64, cancelled_session: bool },
    /// A session is active and the scene is still.
    Watching,
}

pub struct FrameStabilityMonitor {
    source: Arc<dyn FrameSource>,
    tracker: StabilityTracker,
    state: SharedState,
    welcome: WelcomeGate,
    sample_quality: f32,
    epoch: Instant,
}

impl FrameStabilityMonitor {
    pub fn new(
        source: Arc<dyn FrameSource>,
        tracker: StabilityTracker,
        state: SharedState,
        welcome: WelcomeGate,
        sample_quality: f32,
    ) -> Self {
        Self {
            source,
            tracker,
            state,
            welcome,
            sample_quality,
            epoch: Instant::now(),
        }
    }

    /// Byte-size monitor with thresholds from config.
    pub fn from_config(
        config: &MonitorConfig,
        source: Arc<dyn FrameSource>,
        state: SharedState,
        welcome: WelcomeGate,
    ) -> Self {
        let tracker =
            StabilityTracker::new(config.similarity_threshold, config.stable_ticks_required);
        Self::new(source, tracker, state, welcome, config.sample_quality)
    }

    /// Take one sample and update the stability state.
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.welcome.is_fired() || lock_state(&self.state).paused {
            return TickOutcome::Gated;
        }

        let frame = match self
            .source
            .capture(CaptureRequest::sample(self.sample_quality))
            .await
        {
            Ok(frame) => frame,
            Err(e) if e.is_permission() => {
                log::debug!("monitor: sample skipped ({e})");
                return TickOutcome::SampleFailed;
            }
            Err(e) => {
                log::warn!("monitor: sample failed: {e}");
                return TickOutcome::SampleFailed;
            }
        };

        let sample = StabilitySample::new(
            self.epoch.elapsed().as_millis() as u64,
            frame.size_bytes,
        );
        // Only the size is needed.
        drop(frame);

        let active = lock_state(&self.state).active_token();
        if let Some(token) = active {
            return match self.tracker.observe_movement(sample) {
                Some(delta) => {
                    log::info!("monitor: movement (delta {delta:.3}) during session, cancelling");
                    token.signal();
                    TickOutcome::Moved {
                        delta,
                        cancelled_session: true,
                    }
                }
                None => TickOutcome::Watching,
            };
        }

        match self.tracker.observe(sample) {
            Observation::First => TickOutcome::FirstSample,
            Observation::Settling { stable_ticks } => {
                log::debug!("monitor: stable tick {stable_ticks}");
                TickOutcome::Settling { stable_ticks }
            }
            Observation::Trigger => {
                log::debug!("monitor: scene stable, triggering session");
                TickOutcome::Triggered
            }
            Observation::Moved { delta } => {
                log::debug!("monitor: movement (delta {delta:.3})");
                TickOutcome::Moved {
                    delta,
                    cancelled_session: false,
                }
            }
        }
    }

    /// Restart the stable-tick count; called when a session ends.
    pub fn reset_counter(&mut self) {
        self.tracker.reset_counter();
    }

    pub fn tracker(&self) -> &StabilityTracker {
        &self.tracker
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

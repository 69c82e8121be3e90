//! Top-level coaching loop.
//!
//! [`CoachEngine::run`] greets the user once, opens the [`WelcomeGate`] and
//! then ticks the [`FrameStabilityMonitor`] on a fixed period.  A
//! `Triggered` tick starts a session; the monitor keeps ticking while it
//! runs so that movement can cancel it.  Everything runs on one task, so a
//! tick and a session step never interleave mid-update.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use crate::config::AppConfig;
use crate::monitor::{FrameStabilityMonitor, TickOutcome};

use super::cancel::CancellationToken;
use super::orchestrator::{CoachingOrchestrator, SessionOutcome, Trigger};
use super::state::lock_state;
use super::welcome::WelcomeGate;

pub struct CoachEngine {
    orchestrator: CoachingOrchestrator,
    monitor: FrameStabilityMonitor,
    welcome: WelcomeGate,
    tick_interval: Duration,
    greet_on_start: bool,
}

impl CoachEngine {
    /// `welcome` must be the same gate the monitor was built with.
    pub fn new(
        orchestrator: CoachingOrchestrator,
        monitor: FrameStabilityMonitor,
        welcome: WelcomeGate,
        config: &AppConfig,
    ) -> Self {
        Self {
            orchestrator,
            monitor,
            welcome,
            tick_interval: config.monitor.tick_interval(),
            greet_on_start: config.coach.greet_on_start,
        }
    }

    pub fn orchestrator(&self) -> &CoachingOrchestrator {
        &self.orchestrator
    }

    /// Run until `shutdown` is signalled.  An active session is cancelled
    /// and awaited before returning.
    pub async fn run(mut self, shutdown: CancellationToken) {
        log::info!(
            "engine: started (tick {} ms)",
            self.tick_interval.as_millis()
        );

        if shutdown.is_cancelled() {
            log::info!("engine: shutdown before start, nothing to do");
            return;
        }

        if self.greet_on_start {
            let outcome = self.greet(&shutdown).await;
            log::info!("engine: welcome session {}", outcome.label());
        }
        // Fires after any outcome so a failed greeting never blocks coaching.
        self.welcome.fire();

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.monitor.tick().await == TickOutcome::Triggered {
                        let outcome = self.coach(&mut ticker, &shutdown).await;
                        log::info!("engine: session {}", outcome.label());
                    }
                }
            }
        }

        log::info!("engine: stopped");
    }

    async fn greet(&self, shutdown: &CancellationToken) -> SessionOutcome {
        let session = self.orchestrator.run_session(Trigger::Welcome);
        tokio::pin!(session);

        // The session is polled first so it has claimed its token before a
        // shutdown is handled.
        tokio::select! {
            biased;
            outcome = &mut session => outcome,
            _ = shutdown.cancelled() => {
                self.cancel_active();
                session.await
            }
        }
    }

    /// Run one stable-scene session, ticking the monitor alongside it.
    async fn coach(
        &mut self,
        ticker: &mut Interval,
        shutdown: &CancellationToken,
    ) -> SessionOutcome {
        let Self {
            orchestrator,
            monitor,
            ..
        } = self;
        let session = orchestrator.run_session(Trigger::Stable);
        tokio::pin!(session);

        let mut stopping = false;
        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut session => break outcome,
                _ = shutdown.cancelled(), if !stopping => {
                    stopping = true;
                    if let Some(token) = lock_state(orchestrator.state()).active_token() {
                        token.signal();
                    }
                }
                _ = ticker.tick(), if !stopping => {
                    monitor.tick().await;
                }
            }
        };

        // Stability must be re-established from scratch.
        monitor.reset_counter();
        outcome
    }

    fn cancel_active(&self) {
        if let Some(token) = lock_state(self.orchestrator.state()).active_token() {
            token.signal();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MockFrameSource;
    use crate::conversation::Role;
    use crate::playback::MockSinkMode;
    use crate::session::state::{CoachState, SharedState};
    use crate::session::testkit::{
        harness_with_camera, Handles, Harness, SpeechScript, VisionScript,
    };

    fn engine(h: Harness, greet: bool) -> (CoachEngine, Handles) {
        let mut config = AppConfig::default();
        config.coach.greet_on_start = greet;

        let (orchestrator, handles) = h.into_parts();
        let welcome = WelcomeGate::new();
        let monitor = FrameStabilityMonitor::from_config(
            &config.monitor,
            handles.camera.clone(),
            handles.state.clone(),
            welcome.clone(),
        );
        (
            CoachEngine::new(orchestrator, monitor, welcome, &config),
            handles,
        )
    }

    async fn wait_until(state: &SharedState, done: impl Fn(&CoachState) -> bool) {
        while !done(&lock_state(state)) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Stable scene: a session starts after the third sample, the advice is
    /// spoken, and the pair lands in the conversation.
    #[tokio::test(start_paused = true)]
    async fn stable_scene_is_coached_end_to_end() {
        let camera = MockFrameSource::new([Some(1000), Some(1010), Some(1020)]);
        let h = harness_with_camera(
            camera,
            VisionScript::Reply("Move slightly right.".into()),
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, false);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.completed_sessions >= 1).await;
        shutdown.signal();
        task.await.unwrap();

        // Three monitor samples plus the session's own capture.
        assert!(h.camera.capture_count() >= 4);
        assert_eq!(h.sink.start_count(), h.speech.call_count());
        let calls = h.vision.calls();
        let first = &calls[0];
        assert!(first.1.image.is_some());
        assert_eq!(first.0.len(), 1);
        assert_eq!(first.0[0].role, Role::System);
        assert_eq!(
            lock_state(&h.state).last_advice.as_deref(),
            Some("Move slightly right.")
        );
    }

    /// The scene moves while the model is thinking: the session is
    /// cancelled and nothing is spoken.
    #[tokio::test(start_paused = true)]
    async fn movement_cancels_session_in_flight() {
        // Three samples to trigger, one full capture, then the camera moves.
        let camera = MockFrameSource::new([
            Some(1000),
            Some(1010),
            Some(1020),
            Some(1020),
            Some(1600),
        ]);
        let h = harness_with_camera(
            camera,
            VisionScript::Hang,
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, false);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.cancelled_sessions >= 1).await;
        shutdown.signal();
        task.await.unwrap();

        assert!(h.vision.call_count() >= 1);
        assert_eq!(h.speech.call_count(), 0);
        assert_eq!(h.sink.start_count(), 0);
        let st = lock_state(&h.state);
        assert_eq!(st.completed_sessions, 0);
        assert!(!st.is_session_active());
    }

    #[tokio::test(start_paused = true)]
    async fn greeting_runs_before_monitoring() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Reply("Hi there!".into()),
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, true);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.completed_sessions >= 2).await;
        shutdown.signal();
        task.await.unwrap();

        let calls = h.vision.calls();
        assert!(calls[0].1.image.is_none(), "greeting carries no frame");
        assert!(calls[1].1.image.is_some());
        // The greeting pair is history for the first coaching request.
        assert_eq!(calls[1].0.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_greeting_still_opens_the_gate() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Reply("Tilt down.".into()),
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        h.vision.push(VisionScript::Fail);
        let (engine, h) = engine(h, true);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.completed_sessions >= 1).await;
        shutdown.signal();
        task.await.unwrap();

        assert!(h.vision.calls()[0].1.image.is_none());
        assert!(h.camera.capture_count() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_start_skips_greeting_and_monitoring() {
        for _ in 0..40 {
            let h = harness_with_camera(
                MockFrameSource::steady(1000),
                VisionScript::Reply("Hi there!".into()),
                SpeechScript::Audio,
                MockSinkMode::Immediate,
            );
            let (engine, h) = engine(h, true);

            let shutdown = CancellationToken::new();
            shutdown.signal();
            engine.run(shutdown).await;

            assert_eq!(h.vision.call_count(), 0);
            assert_eq!(h.sink.start_count(), 0);
            assert_eq!(h.camera.capture_count(), 0);
            assert!(!lock_state(&h.state).is_session_active());
        }
    }

    /// Shutdown while the greeting waits on the model: the greeting is
    /// cancelled and the engine returns without sampling.
    #[tokio::test(start_paused = true)]
    async fn shutdown_during_greeting_cancels_it() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Hang,
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, true);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.is_session_active()).await;
        shutdown.signal();
        task.await.unwrap();

        let st = lock_state(&h.state);
        assert_eq!(st.cancelled_sessions, 1);
        assert!(!st.is_session_active());
        assert_eq!(h.sink.start_count(), 0);
        assert_eq!(h.camera.capture_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_monitor_never_triggers() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Reply("ok".into()),
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        lock_state(&h.state).paused = true;
        let (engine, h) = engine(h, false);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.signal();
        task.await.unwrap();

        assert_eq!(h.camera.capture_count(), 0);
        assert_eq!(h.vision.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_active_session() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Hang,
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, false);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.is_session_active()).await;
        shutdown.signal();
        task.await.unwrap();

        let st = lock_state(&h.state);
        assert!(!st.is_session_active());
        assert_eq!(st.cancelled_sessions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn still_scene_is_coached_again_after_session() {
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Numbered,
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, h) = engine(h, false);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));

        wait_until(&h.state, |st| st.completed_sessions >= 3).await;
        shutdown.signal();
        task.await.unwrap();

        let calls = h.vision.calls();
        assert_eq!(calls[1].0.len(), 3);
        assert_eq!(calls[2].0.len(), 5);
    }

    #[tokio::test]
    async fn engine_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let h = harness_with_camera(
            MockFrameSource::steady(1000),
            VisionScript::Hang,
            SpeechScript::Audio,
            MockSinkMode::Immediate,
        );
        let (engine, _h) = engine(h, false);
        let fut = engine.run(CancellationToken::new());
        assert_send(&fut);
    }
}

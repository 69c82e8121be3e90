//! Scripted collaborators shared by the orchestrator and engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::camera::MockFrameSource;
use crate::config::CoachConfig;
use crate::conversation::{AmbientContext, ConversationMessage};
use crate::playback::{MockSink, MockSinkMode, PlaybackController};
use crate::speech::{SpeechError, SpeechSynthesizer};
use crate::vision::{VisionCoach, VisionError};

use super::cancel::CancellationToken;
use super::orchestrator::CoachingOrchestrator;
use super::state::{lock_state, new_shared_state, SessionPhase, SharedState};

/// How [`ScriptedVision`] answers.
#[derive(Debug, Clone)]
pub enum VisionScript {
    Reply(String),
    /// "tip 1", "tip 2", ... one per call.
    Numbered,
    Fail,
    /// Waits for the token, then reports cancellation.
    Hang,
    /// Ignores the token and never answers.
    Stuck,
    /// Signals the token itself, then answers anyway.
    LateReply(String),
}

pub struct ScriptedVision {
    script: VisionScript,
    queue: Mutex<VecDeque<VisionScript>>,
    calls: Mutex<Vec<(Vec<ConversationMessage>, ConversationMessage)>>,
}

impl ScriptedVision {
    pub fn new(script: VisionScript) -> Self {
        Self {
            script,
            queue: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer the next call with `script`, then fall back to the default.
    pub fn push(&self, script: VisionScript) {
        self.queue.lock().unwrap().push_back(script);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(Vec<ConversationMessage>, ConversationMessage)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionCoach for ScriptedVision {
    async fn infer(
        &self,
        history: &[ConversationMessage],
        turn: &ConversationMessage,
        cancel: &CancellationToken,
    ) -> Result<String, VisionError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((history.to_vec(), turn.clone()));
            calls.len()
        };
        let script = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.script.clone());

        match script {
            VisionScript::Reply(text) => Ok(text),
            VisionScript::Numbered => Ok(format!("tip {n}")),
            VisionScript::Fail => Err(VisionError::Request("HTTP 500".into())),
            VisionScript::Hang => {
                cancel.cancelled().await;
                Err(VisionError::Cancelled)
            }
            VisionScript::Stuck => std::future::pending().await,
            VisionScript::LateReply(text) => {
                cancel.signal();
                Ok(text)
            }
        }
    }
}

/// How [`ScriptedSpeech`] answers.
#[derive(Debug, Clone, Copy)]
pub enum SpeechScript {
    Audio,
    Fail,
    /// Never answers.
    Hang,
}

pub struct ScriptedSpeech {
    script: SpeechScript,
    calls: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn new(script: SpeechScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            SpeechScript::Audio => Ok(vec![0x49, 0x44, 0x33]),
            SpeechScript::Fail => Err(SpeechError::Request("HTTP 503".into())),
            SpeechScript::Hang => std::future::pending().await,
        }
    }
}

/// An orchestrator wired to scripted collaborators.
pub struct Harness {
    pub orchestrator: CoachingOrchestrator,
    pub state: SharedState,
    pub camera: Arc<MockFrameSource>,
    pub vision: Arc<ScriptedVision>,
    pub speech: Arc<ScriptedSpeech>,
    pub sink: Arc<MockSink>,
    pub ambient: watch::Sender<AmbientContext>,
}

/// Everything in a [`Harness`] except the orchestrator.
pub struct Handles {
    pub state: SharedState,
    pub camera: Arc<MockFrameSource>,
    pub vision: Arc<ScriptedVision>,
    pub speech: Arc<ScriptedSpeech>,
    pub sink: Arc<MockSink>,
    pub ambient: watch::Sender<AmbientContext>,
}

impl Harness {
    /// Hand the orchestrator over (e.g. to an engine) and keep the rest.
    pub fn into_parts(self) -> (CoachingOrchestrator, Handles) {
        let handles = Handles {
            state: self.state,
            camera: self.camera,
            vision: self.vision,
            speech: self.speech,
            sink: self.sink,
            ambient: self.ambient,
        };
        (self.orchestrator, handles)
    }
}

/// Harness with a camera that always returns 1000-byte frames.
pub fn harness(vision: VisionScript, speech: SpeechScript, sink: MockSinkMode) -> Harness {
    harness_with_camera(MockFrameSource::steady(1000), vision, speech, sink)
}

pub fn harness_with_camera(
    camera: MockFrameSource,
    vision: VisionScript,
    speech: SpeechScript,
    sink: MockSinkMode,
) -> Harness {
    let state = new_shared_state();
    let camera = Arc::new(camera);
    let vision = Arc::new(ScriptedVision::new(vision));
    let speech = Arc::new(ScriptedSpeech::new(speech));
    let sink = Arc::new(MockSink::new(sink));
    let (ambient, ambient_rx) = watch::channel(AmbientContext::default());

    let orchestrator = CoachingOrchestrator::new(
        state.clone(),
        camera.clone(),
        vision.clone(),
        speech.clone(),
        PlaybackController::new(sink.clone()),
        &CoachConfig::default(),
        ambient_rx,
    );

    Harness {
        orchestrator,
        state,
        camera,
        vision,
        speech,
        sink,
        ambient,
    }
}

/// Yield until the active session reaches `phase`.
pub async fn wait_for_phase(state: &SharedState, phase: SessionPhase) {
    while lock_state(state).phase() != phase {
        tokio::task::yield_now().await;
    }
}

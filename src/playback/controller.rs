//! Single-clip playback controller.
//!
//! [`PlaybackController`] owns at most one active [`AudioResource`].  Each
//! `play` returns a [`PlaybackCompletion`] that resolves exactly once, with
//! whichever of natural finish or [`stop`](PlaybackController::stop) gets
//! there first.  The side that takes the active clip out of the slot is the
//! only one that releases it and resolves the completion.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::sink::{AudioResource, AudioSink, PlaybackError, SinkEvent};

// ---------------------------------------------------------------------------
// PlaybackOutcome
// ---------------------------------------------------------------------------

/// How one playback attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// The clip played to the end.
    Finished,
    /// [`PlaybackController::stop`] ended it.
    StoppedEarly,
    /// The output reported an error mid-clip.
    Failed(String),
}

/// Resolves once with the outcome of one `play` call.
#[derive(Debug)]
pub struct PlaybackCompletion {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackCompletion {
    pub async fn wait(self) -> PlaybackOutcome {
        // The sender only disappears without sending if the controller was
        // torn down mid-clip, which is an early stop from the caller's view.
        self.rx.await.unwrap_or(PlaybackOutcome::StoppedEarly)
    }
}

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

struct ActiveClip {
    generation: u64,
    resource: Box<dyn AudioResource>,
    done: oneshot::Sender<PlaybackOutcome>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveClip>,
    loading: bool,
    generation: u64,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the `loading` flag even if `play` is dropped mid-load.
struct LoadingGuard<'a>(&'a Mutex<Slot>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).loading = false;
    }
}

/// Starts and stops clips on an [`AudioSink`].  Cheap to clone; clones
/// share the same slot.
#[derive(Clone)]
pub struct PlaybackController {
    sink: Arc<dyn AudioSink>,
    slot: Arc<Mutex<Slot>>,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Load `audio` and start playing it.
    ///
    /// Fails with [`PlaybackError::AlreadyPlaying`] when a clip is loading
    /// or playing; the caller must `stop` first.
    pub async fn play(&self, audio: Vec<u8>) -> Result<PlaybackCompletion, PlaybackError> {
        {
            let mut slot = lock(&self.slot);
            if slot.active.is_some() || slot.loading {
                return Err(PlaybackError::AlreadyPlaying);
            }
            slot.loading = true;
        }

        let loading = LoadingGuard(&self.slot);
        let playing = self.sink.start(audio).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            let generation = slot.generation;
            slot.active = Some(ActiveClip {
                generation,
                resource: playing.resource,
                done: done_tx,
            });
            generation
        };
        drop(loading);
        log::debug!("playback: clip {generation} playing");

        let slot = Arc::clone(&self.slot);
        let finished = playing.finished;
        tokio::spawn(async move {
            let event = finished
                .await
                .unwrap_or_else(|_| SinkEvent::Failed("audio sink closed".into()));

            let clip = {
                let mut slot = lock(&slot);
                let current = slot
                    .active
                    .as_ref()
                    .is_some_and(|active| active.generation == generation);
                if current {
                    slot.active.take()
                } else {
                    None
                }
            };

            // `None` means stop() already released and resolved this clip.
            if let Some(clip) = clip {
                let outcome = match event {
                    SinkEvent::Finished => PlaybackOutcome::Finished,
                    SinkEvent::Failed(reason) => {
                        log::warn!("playback: clip {generation} failed: {reason}");
                        PlaybackOutcome::Failed(reason)
                    }
                };
                drop(clip.resource);
                let _ = clip.done.send(outcome);
                log::debug!("playback: clip {generation} ended");
            }
        });

        Ok(PlaybackCompletion { rx: done_rx })
    }

    /// Halt and release the active clip, resolving its completion with
    /// [`PlaybackOutcome::StoppedEarly`].  No-op when nothing is playing.
    pub async fn stop(&self) {
        let clip = lock(&self.slot).active.take();
        let Some(mut clip) = clip else {
            log::debug!("playback: stop with nothing playing");
            return;
        };

        clip.resource.halt().await;
        drop(clip.resource);
        let _ = clip.done.send(PlaybackOutcome::StoppedEarly);
        log::debug!("playback: clip {} stopped", clip.generation);
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.slot).active.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Audio output seam and an external-player implementation.
//!
//! An [`AudioSink`] loads encoded audio and starts playing it, handing back
//! a [`PlayingAudio`]: a one-shot channel for natural completion plus the
//! [`AudioResource`] that owns the output.  Dropping the resource releases
//! it; [`AudioResource::halt`] stops output early.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::PlaybackConfig;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// `play` was called while another clip was loading or playing.
    #[error("audio is already playing")]
    AlreadyPlaying,

    /// Audio output has not been granted.
    #[error("audio permission not granted")]
    PermissionDenied,

    /// The clip could not be prepared for playback.
    #[error("failed to load audio: {0}")]
    Load(String),

    /// The output device or player could not be started.
    #[error("audio device error: {0}")]
    Device(String),
}

// ---------------------------------------------------------------------------
// Sink types
// ---------------------------------------------------------------------------

/// How a clip ended on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Finished,
    Failed(String),
}

/// Exclusive handle to one loaded clip.  Dropping it releases the output.
#[async_trait]
pub trait AudioResource: Send {
    /// Stop output now.  Resolves once the output has actually stopped.
    async fn halt(&mut self);
}

/// A clip that has started playing.
pub struct PlayingAudio {
    /// Resolves when the clip ends without being halted.
    pub finished: oneshot::Receiver<SinkEvent>,
    pub resource: Box<dyn AudioResource>,
}

/// Loads and starts clips.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn start(&self, audio: Vec<u8>) -> Result<PlayingAudio, PlaybackError>;
}

// ---------------------------------------------------------------------------
// CommandSink
// ---------------------------------------------------------------------------

/// Plays clips by writing them to `<cache_dir>/speech.mp3` and running an
/// external player on the file.
///
/// A zero exit status is a natural finish; anything else is a failure.
/// Halting kills the player process.
#[derive(Debug, Clone)]
pub struct CommandSink {
    player: String,
    args: Vec<String>,
    clip_path: PathBuf,
}

impl CommandSink {
    pub fn from_config(config: &PlaybackConfig, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            player: config.player.clone(),
            args: config.args.clone(),
            clip_path: cache_dir.into().join("speech.mp3"),
        }
    }

    async fn write_clip(&self, audio: &[u8]) -> Result<(), PlaybackError> {
        if let Some(parent) = self.clip_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PlaybackError::Load(e.to_string()))?;
        }
        tokio::fs::write(&self.clip_path, audio)
            .await
            .map_err(|e| PlaybackError::Load(e.to_string()))
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn start(&self, audio: Vec<u8>) -> Result<PlayingAudio, PlaybackError> {
        self.write_clip(&audio).await?;

        let mut child = tokio::process::Command::new(&self.player)
            .args(&self.args)
            .arg(&self.clip_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => PlaybackError::PermissionDenied,
                _ => PlaybackError::Device(format!("cannot start `{}`: {e}", self.player)),
            })?;

        log::debug!("playback: `{}` started on {}", self.player, self.clip_path.display());

        let (finished_tx, finished_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exited_tx, exited_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(s) if s.success() => SinkEvent::Finished,
                        Ok(s) => SinkEvent::Failed(format!("player exited with {s}")),
                        Err(e) => SinkEvent::Failed(e.to_string()),
                    };
                    let _ = finished_tx.send(event);
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        log::warn!("playback: failed to kill player: {e}");
                    }
                }
            }
            let _ = exited_tx.send(());
        });

        Ok(PlayingAudio {
            finished: finished_rx,
            resource: Box::new(PlayerProcess {
                kill: Some(kill_tx),
                exited: Some(exited_rx),
            }),
        })
    }
}

/// Handle to a running player process.
struct PlayerProcess {
    kill: Option<oneshot::Sender<()>>,
    exited: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl AudioResource for PlayerProcess {
    async fn halt(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        if let Some(exited) = self.exited.take() {
            let _ = exited.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockSink, MockSinkMode};


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

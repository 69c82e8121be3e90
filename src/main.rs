//! Application entry point: Photo Coach.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the camera, vision, speech and playback backends from config.
//! 4. Publish the ambient context on a watch channel.
//! 5. Wire the monitor and orchestrator into a [`CoachEngine`].
//! 6. Run the engine until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use photo_coach::{
    camera::{FrameSource, SnapshotDirSource},
    config::{AppConfig, AppPaths},
    conversation::AmbientContext,
    monitor::FrameStabilityMonitor,
    playback::{CommandSink, PlaybackController},
    session::{new_shared_state, CancellationToken, CoachEngine, CoachingOrchestrator, WelcomeGate},
    speech::{OpenAiSpeech, SpeechSynthesizer},
    vision::{OpenAiVision, VisionCoach},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Photo Coach starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. Backends
    let frames_dir = config
        .camera
        .frames_dir
        .clone()
        .unwrap_or_else(|| paths.frames_dir.clone());
    log::info!("Reading camera frames from {}", frames_dir.display());
    let camera: Arc<dyn FrameSource> = Arc::new(SnapshotDirSource::new(frames_dir));

    let vision: Arc<dyn VisionCoach> = Arc::new(OpenAiVision::from_config(&config.vision));
    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(OpenAiSpeech::from_config(&config.speech));
    let playback = PlaybackController::new(Arc::new(CommandSink::from_config(
        &config.playback,
        paths.cache_dir.clone(),
    )));

    // 4. Ambient context.  The sender stays alive for the whole run so a
    //    location provider can be attached to it.
    let (_ambient_tx, ambient_rx) = watch::channel(AmbientContext::from(&config.ambient));

    // 5. Engine
    let state = new_shared_state();
    let welcome = WelcomeGate::new();
    let monitor = FrameStabilityMonitor::from_config(
        &config.monitor,
        Arc::clone(&camera),
        state.clone(),
        welcome.clone(),
    );
    let orchestrator = CoachingOrchestrator::new(
        state,
        camera,
        vision,
        speech,
        playback,
        &config.coach,
        ambient_rx,
    );
    let engine = CoachEngine::new(orchestrator, monitor, welcome, &config);

    // 6. Run until Ctrl-C
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    shutdown.signal();
    engine_task.await?;

    Ok(())
}

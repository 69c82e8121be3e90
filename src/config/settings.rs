//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a hand-written `settings.toml`
//! only needs the keys it overrides.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Settings for the frame stability monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Period between stability samples, in milliseconds.
    pub tick_interval_ms: u64,
    /// Relative delta below which two consecutive samples count as "stable".
    pub similarity_threshold: f64,
    /// Consecutive stable ticks needed before a coaching session starts.
    pub stable_ticks_required: u32,
    /// Capture quality (0.0 – 1.0) for the cheap stability samples.
    pub sample_quality: f32,
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            similarity_threshold: 0.05,
            stable_ticks_required: 2,
            sample_quality: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// CoachConfig
// ---------------------------------------------------------------------------

/// Settings for coaching sessions and the conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Maximum number of messages (system entry included) kept as context.
    pub max_history: usize,
    /// Upper bound on one session's wall-clock time.  `0` disables the limit.
    pub session_timeout_secs: u64,
    /// Capture quality (0.0 – 1.0) for the frame sent to the vision model.
    pub capture_quality: f32,
    /// Run a greeting session before the stability monitor starts.
    pub greet_on_start: bool,
}

impl CoachConfig {
    /// The per-session deadline, or `None` when disabled.
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_secs > 0).then(|| Duration::from_secs(self.session_timeout_secs))
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            max_history: 20,
            session_timeout_secs: 30,
            capture_quality: 0.4,
            greet_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// VisionConfig
// ---------------------------------------------------------------------------

/// Settings for the vision-inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of an OpenAI-compatible API (no trailing `/v1`).
    pub base_url: String,
    /// API key.  `None` falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Vision-capable chat model.
    pub model: String,
    /// Reply length cap sent with every request.
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4.1-nano".into(),
            max_tokens: 100,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    /// API key.  `None` falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "alloy".into(),
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// External audio player used by [`CommandSink`](crate::playback::CommandSink).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Player executable (looked up on `PATH`).
    pub player: String,
    /// Arguments placed before the audio file path.
    pub args: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: "ffplay".into(),
            args: vec![
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Where camera snapshots are read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory of JPEG snapshots.  `None` uses [`AppPaths::frames_dir`].
    pub frames_dir: Option<std::path::PathBuf>,
}

// ---------------------------------------------------------------------------
// AmbientConfig
// ---------------------------------------------------------------------------

/// Static ambient context used when no live location provider is wired in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Free-text description of where the user is.
    pub location: Option<String>,
    /// Nearby points of interest worth photographing.
    pub points_of_interest: Vec<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use photo_coach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub coach: CoachConfig,
    pub vision: VisionConfig,
    pub speech: SpeechConfig,
    pub playback: PlaybackConfig,
    pub camera: CameraConfig,
    pub ambient: AmbientConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

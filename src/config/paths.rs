//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\photo-coach\
//!   macOS:   ~/Library/Application Support/photo-coach/
//!   Linux:   ~/.config/photo-coach/
//!
//! Data dir (camera frames):
//!   Windows: %LOCALAPPDATA%\photo-coach\
//!   macOS:   ~/Library/Application Support/photo-coach/
//!   Linux:   ~/.local/share/photo-coach/
//!
//! Cache dir (synthesized speech):
//!   Windows: %LOCALAPPDATA%\photo-coach\
//!   macOS:   ~/Library/Caches/photo-coach/
//!   Linux:   ~/.cache/photo-coach/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory an external camera writes JPEG snapshots into.
    pub frames_dir: PathBuf,
    /// Directory for transient files such as `speech.mp3`.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "photo-coach";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let frames_dir = data_dir.join("frames");

        Self {
            config_dir,
            settings_file,
            frames_dir,
            cache_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

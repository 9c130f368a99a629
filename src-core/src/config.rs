//! Configuration management.
//!
//! Handles loading and saving user configuration to platform-standard
//! config directories:
//! - Linux: `~/.config/canvasrec/config.json`
//! - macOS: `~/Library/Application Support/canvasrec/config.json`
//! - Windows: `%APPDATA%\canvasrec\config.json`

use crate::surface::CanvasGeometry;
use chrono::Local;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

fn default_frame_rate() -> u32 {
    30
}

/// Recording-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Canvas sampling rate in frames per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
        }
    }
}

/// Output-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Custom output directory. If None, the current directory is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Compositing canvas dimensions.
    #[serde(default)]
    pub canvas: CanvasGeometry,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Get the path to the config file.
fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "canvasrec").map(|dirs| dirs.config_dir().join("config.json"))
}

/// Load configuration from disk, falling back to defaults on a missing
/// or unreadable file.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    match fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Ignoring malformed config at {}: {}", path.display(), e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// Timestamped output path for a new export, honoring the configured
/// output directory and falling back to the current directory.
pub fn default_output_path(config: &AppConfig) -> PathBuf {
    let dir = config
        .output
        .directory
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let filename = format!("canvasrec-{}.gif", Local::now().format("%Y%m%d-%H%M%S"));
    dir.join(filename)
}

/// Save configuration to disk.
pub fn save_config(config: &AppConfig) -> Result<(), String> {
    let path = config_path().ok_or("Could not determine config directory")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, json).map_err(|e| format!("Failed to write config: {}", e))
}

//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where exports land when no output path is given.
    pub exports_dir: PathBuf,

    /// Default export parameters.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters, applied when the caller leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Container/codec family ("general", "archival", "gif").
    pub format: String,

    /// Quality tier ("low", "medium", "high", "maximum").
    pub quality: String,

    /// Resolution preset ("original", "2160p", "1080p", "720p", "480p").
    pub resolution: String,

    /// Output frame rate.
    pub fps: u32,

    /// Animated-image cadence.
    pub gif_fps: u32,

    /// Animated-image palette size.
    pub gif_max_colors: u16,

    /// Animated-image loop count (0 = forever).
    pub gif_loop_count: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sheen=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exports_dir: dirs_default_exports(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            format: "general".to_string(),
            quality: "high".to_string(),
            resolution: "1080p".to_string(),
            fps: 30,
            gif_fps: 15,
            gif_max_colors: 128,
            gif_loop_count: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("sheen").join("config.json")
}

/// Default exports directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("Sheen")
}

//! Recording bundle: the on-disk output of a finished capture session.
//!
//! ```text
//! <bundle>/
//!   meta/recording.json   manifest (tracks, capture size, fps)
//!   meta/cursor.jsonl     CursorEvent per line
//!   meta/keys.jsonl       KeystrokeEvent per line
//!   meta/captions.json    [CaptionSegment]
//!   meta/effects.json     EffectsConfiguration (optional)
//! ```
//!
//! The bundle is read-only from the exporter's point of view. The only
//! write path is `save_effects`, used to seed a default style file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::effects::EffectsConfiguration;
use crate::event::{
    parse_jsonl, serialize_jsonl, CaptionSegment, CursorEvent, EventLogs, KeystrokeEvent,
};

pub const MANIFEST_FILE: &str = "recording.json";
pub const CURSOR_FILE: &str = "cursor.jsonl";
pub const KEYS_FILE: &str = "keys.jsonl";
pub const CAPTIONS_FILE: &str = "captions.json";
pub const EFFECTS_FILE: &str = "effects.json";

/// Top-level manifest (`meta/recording.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingManifest {
    /// Schema version.
    pub version: String,

    /// Human-readable recording name.
    pub name: String,

    pub created_at: DateTime<Utc>,

    /// Capture resolution (physical pixels).
    pub capture_width: u32,
    pub capture_height: u32,

    /// Capture frame rate.
    pub fps: u32,

    pub tracks: Tracks,
}

/// References to source media files (relative to the bundle root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracks {
    /// Screen video; carries the recording's audio when present.
    pub screen: TrackRef,

    #[serde(default)]
    pub webcam: Option<TrackRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRef {
    /// Path relative to the bundle root.
    pub path: String,

    pub duration_secs: f64,
}

impl RecordingManifest {
    pub fn new(
        name: impl Into<String>,
        capture_width: u32,
        capture_height: u32,
        fps: u32,
        screen: TrackRef,
    ) -> Self {
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            created_at: Utc::now(),
            capture_width,
            capture_height,
            fps,
            tracks: Tracks {
                screen,
                webcam: None,
            },
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.tracks.screen.duration_secs
    }
}

/// A fully loaded bundle: manifest, style and sorted event logs.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    /// Filesystem path to the bundle directory.
    pub root: PathBuf,

    pub manifest: RecordingManifest,

    /// Stored style, or defaults when `effects.json` is absent.
    pub effects: EffectsConfiguration,

    pub events: EventLogs,
}

impl LoadedRecording {
    /// Load a recording bundle from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let root = root.as_ref().to_path_buf();
        let meta = root.join("meta");

        let manifest_path = meta.join(MANIFEST_FILE);
        let manifest: RecordingManifest = read_json(&manifest_path)?;
        if manifest.capture_width == 0 || manifest.capture_height == 0 {
            return Err(RecordingError::Invalid {
                message: format!(
                    "capture size {}x{} is empty",
                    manifest.capture_width, manifest.capture_height
                ),
            });
        }

        let effects_path = meta.join(EFFECTS_FILE);
        let effects = if effects_path.exists() {
            read_json(&effects_path)?
        } else {
            EffectsConfiguration::default()
        };

        let cursor: Vec<CursorEvent> = read_jsonl_if_present(&meta.join(CURSOR_FILE))?;
        let keystrokes: Vec<KeystrokeEvent> = read_jsonl_if_present(&meta.join(KEYS_FILE))?;
        let captions_path = meta.join(CAPTIONS_FILE);
        let captions: Vec<CaptionSegment> = if captions_path.exists() {
            read_json(&captions_path)?
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            manifest,
            effects,
            events: EventLogs::new(cursor, keystrokes, captions),
        })
    }

    /// Write a bundle skeleton: manifest plus whatever event logs are given.
    pub fn create(
        root: impl AsRef<Path>,
        manifest: RecordingManifest,
        events: EventLogs,
    ) -> Result<Self, RecordingError> {
        let root = root.as_ref().to_path_buf();
        let meta = root.join("meta");
        std::fs::create_dir_all(&meta).map_err(|e| RecordingError::Io {
            path: meta.clone(),
            source: e,
        })?;

        write_json(&meta.join(MANIFEST_FILE), &manifest)?;
        write_text(
            &meta.join(CURSOR_FILE),
            &serialize_jsonl(&events.cursor).map_err(|e| RecordingError::Parse {
                path: meta.join(CURSOR_FILE),
                source: e,
            })?,
        )?;
        write_text(
            &meta.join(KEYS_FILE),
            &serialize_jsonl(&events.keystrokes).map_err(|e| RecordingError::Parse {
                path: meta.join(KEYS_FILE),
                source: e,
            })?,
        )?;
        write_json(&meta.join(CAPTIONS_FILE), &events.captions)?;

        Ok(Self {
            root,
            manifest,
            effects: EffectsConfiguration::default(),
            events,
        })
    }

    /// Persist the style file.
    pub fn save_effects(&self) -> Result<PathBuf, RecordingError> {
        let path = self.meta_dir().join(EFFECTS_FILE);
        write_json(&path, &self.effects)?;
        Ok(path)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn screen_path(&self) -> PathBuf {
        self.root.join(&self.manifest.tracks.screen.path)
    }

    pub fn webcam_path(&self) -> Option<PathBuf> {
        self.manifest
            .tracks
            .webcam
            .as_ref()
            .map(|t| self.root.join(&t.path))
    }

    /// Validate that all referenced source files exist.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        if !self.screen_path().exists() {
            errors.push(format!(
                "Screen source missing: {}",
                self.manifest.tracks.screen.path
            ));
        }
        if let Some(webcam) = &self.manifest.tracks.webcam {
            if !self.root.join(&webcam.path).exists() {
                errors.push(format!("Webcam source missing: {}", webcam.path));
            }
        }
        if !self.meta_dir().join(CURSOR_FILE).exists() {
            errors.push(format!("Cursor log missing: meta/{CURSOR_FILE}"));
        }

        errors
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RecordingError> {
    let text = std::fs::read_to_string(path).map_err(|e| RecordingError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| RecordingError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_jsonl_if_present<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, RecordingError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| RecordingError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_jsonl(&text).map_err(|e| RecordingError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RecordingError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| RecordingError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_text(path, &json)
}

fn write_text(path: &Path, text: &str) -> Result<(), RecordingError> {
    std::fs::write(path, text).map_err(|e| RecordingError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when reading a recording bundle.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid recording: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KeystrokeEvent;

    fn manifest() -> RecordingManifest {
        RecordingManifest::new(
            "Demo",
            1920,
            1080,
            30,
            TrackRef {
                path: "sources/screen.mp4".to_string(),
                duration_secs: 10.0,
            },
        )
    }

    #[test]
    fn test_create_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventLogs::new(
            vec![CursorEvent::moved(5, 10.0, 20.0)],
            vec![KeystrokeEvent::down(7, "K")],
            vec![CaptionSegment::new(0, 1_000, "hi")],
        );
        LoadedRecording::create(dir.path(), manifest(), events.clone()).unwrap();

        let loaded = LoadedRecording::load(dir.path()).unwrap();
        assert_eq!(loaded.manifest.name, "Demo");
        assert_eq!(loaded.events, events);
        assert_eq!(loaded.effects, EffectsConfiguration::default());
    }

    #[test]
    fn test_load_sorts_hand_edited_logs() {
        let dir = tempfile::tempdir().unwrap();
        LoadedRecording::create(dir.path(), manifest(), EventLogs::default()).unwrap();
        std::fs::write(
            dir.path().join("meta").join(CURSOR_FILE),
            "{\"t\":20,\"x\":0.0,\"y\":0.0}\n{\"t\":10,\"x\":1.0,\"y\":1.0}\n",
        )
        .unwrap();

        let loaded = LoadedRecording::load(dir.path()).unwrap();
        assert_eq!(loaded.events.cursor[0].timestamp_ns, 10);
    }

    #[test]
    fn test_effects_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = LoadedRecording::create(dir.path(), manifest(), EventLogs::default()).unwrap();
        rec.effects.frame.padding = 8;
        rec.save_effects().unwrap();

        let loaded = LoadedRecording::load(dir.path()).unwrap();
        assert_eq!(loaded.effects.frame.padding, 8);
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let rec = LoadedRecording::create(dir.path(), manifest(), EventLogs::default()).unwrap();
        let errors = rec.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Screen source missing")));
    }

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadedRecording::load(dir.path()).unwrap_err();
        assert!(matches!(err, RecordingError::Io { .. }));
    }

    #[test]
    fn test_zero_capture_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manifest();
        m.capture_width = 0;
        LoadedRecording::create(dir.path(), m, EventLogs::default()).unwrap();
        let err = LoadedRecording::load(dir.path()).unwrap_err();
        assert!(matches!(err, RecordingError::Invalid { .. }));
    }
}

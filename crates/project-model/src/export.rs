//! Export job descriptor: container, quality, resolution, cadence, trim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output container/codec family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Broadly compatible lossy video (H.264 + AAC in MP4).
    #[default]
    General,
    /// High-fidelity intermediate for further editing (ProRes + AAC in MOV).
    Archival,
    /// Indexed-color animated image (GIF), no audio.
    #[serde(alias = "gif")]
    AnimatedImage,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::General => "mp4",
            Self::Archival => "mov",
            Self::AnimatedImage => "gif",
        }
    }

    pub fn supports_audio(self) -> bool {
        !matches!(self, Self::AnimatedImage)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" | "mp4" | "h264" => Ok(Self::General),
            "archival" | "mov" | "prores" => Ok(Self::Archival),
            "animated-image" | "animated_image" | "gif" => Ok(Self::AnimatedImage),
            _ => Err(format!(
                "unknown format {s:?}; use general, archival, or gif"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
    Maximum,
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "maximum" | "max" => Ok(Self::Maximum),
            _ => Err(format!(
                "unknown quality {s:?}; use low, medium, high, or maximum"
            )),
        }
    }
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "2160p")]
    P2160,
    #[default]
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl Resolution {
    /// Target output dimensions, or `None` to keep the canvas size.
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::P2160 => Some((3840, 2160)),
            Self::P1080 => Some((1920, 1080)),
            Self::P720 => Some((1280, 720)),
            Self::P480 => Some((854, 480)),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "2160p" | "4k" => Ok(Self::P2160),
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            "480p" => Ok(Self::P480),
            _ => Err(format!(
                "unknown resolution {s:?}; use original, 2160p, 1080p, 720p, or 480p"
            )),
        }
    }
}

/// Supported output frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps24,
    #[default]
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Fps24 => 24,
            Self::Fps30 => 30,
            Self::Fps60 => 60,
        }
    }

    pub fn interval_secs(self) -> f64 {
        1.0 / self.as_u32() as f64
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            24 => Ok(Self::Fps24),
            30 => Ok(Self::Fps30),
            60 => Ok(Self::Fps60),
            other => Err(format!("unsupported frame rate {other}; use 24, 30, or 60")),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        rate.as_u32()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Animated-image specific knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatedImageSettings {
    /// Emitted frames per second.
    pub target_fps: u32,
    /// Palette size per frame, `2..=256`.
    pub max_colors: u16,
    /// Number of loops; 0 loops forever.
    pub loop_count: u16,
    /// Longest output edge; larger frames are downscaled.
    pub max_dimension: Option<u32>,
}

impl Default for AnimatedImageSettings {
    fn default() -> Self {
        Self {
            target_fps: 15,
            max_colors: 128,
            loop_count: 0,
            max_dimension: Some(960),
        }
    }
}

/// Everything the caller chooses about an export, minus the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: Quality,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
    /// Overrides the trim-in stored in the effects configuration.
    pub trim_in: Option<f64>,
    /// Overrides the trim-out stored in the effects configuration.
    pub trim_out: Option<f64>,
    pub animated_image: AnimatedImageSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_serde_as_number() {
        let json = serde_json::to_string(&FrameRate::Fps60).unwrap();
        assert_eq!(json, "60");
        let parsed: FrameRate = serde_json::from_str("24").unwrap();
        assert_eq!(parsed, FrameRate::Fps24);
        assert!(serde_json::from_str::<FrameRate>("25").is_err());
    }

    #[test]
    fn test_resolution_serde_names() {
        let json = serde_json::to_string(&Resolution::P2160).unwrap();
        assert_eq!(json, "\"2160p\"");
        assert_eq!(Resolution::P480.dimensions(), Some((854, 480)));
        assert_eq!(Resolution::Original.dimensions(), None);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("gif".parse::<ExportFormat>(), Ok(ExportFormat::AnimatedImage));
        assert_eq!("archival".parse::<ExportFormat>(), Ok(ExportFormat::Archival));
        assert!("webm".parse::<ExportFormat>().is_err());
        assert!(!ExportFormat::AnimatedImage.supports_audio());
    }

    #[test]
    fn test_settings_json_defaults() {
        let parsed: ExportSettings =
            serde_json::from_str(r#"{"format":"animated_image","frame_rate":60}"#).unwrap();
        assert_eq!(parsed.format, ExportFormat::AnimatedImage);
        assert_eq!(parsed.frame_rate, FrameRate::Fps60);
        assert_eq!(parsed.animated_image.target_fps, 15);
        assert_eq!(parsed.quality, Quality::High);
    }
}

//! Effects configuration: every style knob the export renderer reads.
//!
//! The configuration is a plain value object. Editors mutate their own copy
//! freely; an export takes a clone at job start and never sees later edits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Straight-alpha RGBA color, serialized as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Same color with alpha multiplied by `factor` in `[0, 1]`.
    pub fn with_opacity(self, factor: f64) -> Self {
        let a = (self.a as f64 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color {s:?}: {e}"))
        };
        match hex.len() {
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(format!("invalid color {s:?}: expected #rrggbb or #rrggbbaa")),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// The complete style snapshot consumed by the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EffectsConfiguration {
    pub background: BackgroundConfig,
    pub frame: FrameStyle,
    pub shadow: ShadowConfig,
    pub webcam: WebcamConfig,
    pub cursor: CursorConfig,
    pub zoom: ZoomConfig,
    pub keystrokes: KeystrokeConfig,
    pub captions: CaptionConfig,
    pub trim: TrimConfig,
}

/// Which kind of fill sits behind the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Solid,
    #[default]
    Gradient,
    /// Not rendered by the exporter; resolves to the dark fallback.
    Wallpaper,
    /// Not rendered by the exporter; resolves to the dark fallback.
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub kind: BackgroundKind,
    /// Fill for `Solid`.
    pub color: Color,
    /// Preset id for `Gradient` (e.g. "sunset", "ocean").
    pub gradient: String,
    /// Wallpaper or image reference kept for round-tripping editor state.
    pub asset: Option<String>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            kind: BackgroundKind::Gradient,
            color: Color::rgb(0x1c, 0x1c, 0x22),
            gradient: "ocean".to_string(),
            asset: None,
        }
    }
}

/// Padding and rounding of the recording window on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStyle {
    /// Padding around the recording, in source pixels.
    pub padding: u32,
    /// Corner radius of the recording, in source pixels.
    pub corner_radius: u32,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            padding: 64,
            corner_radius: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Blur radius in source pixels.
    pub blur: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Horizontal offset, positive to the right.
    pub offset_x: f64,
    /// Vertical offset, positive upward.
    pub offset_y: f64,
    pub color: Color,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blur: 24.0,
            opacity: 0.45,
            offset_x: 0.0,
            offset_y: -8.0,
            color: Color::BLACK,
        }
    }
}

/// Canvas corner the webcam bubble is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebcamPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebcamShape {
    #[default]
    Circle,
    RoundedRect,
    Rectangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebcamConfig {
    pub enabled: bool,
    pub position: WebcamPosition,
    /// Bubble width as a fraction of canvas width.
    pub size: f64,
    pub shape: WebcamShape,
    /// User nudge from the anchored corner, in canvas pixels.
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position: WebcamPosition::BottomRight,
            size: 0.2,
            shape: WebcamShape::Circle,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Cursor path smoothing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorSmoothing {
    None,
    #[default]
    Ema,
    MovingAverage,
    Kalman,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub enabled: bool,
    pub smoothing: CursorSmoothing,
    /// Smoothing strength in `[0, 1]`.
    pub smoothing_strength: f64,
    /// Dot size multiplier.
    pub scale: f64,
    pub color: Color,
    pub highlight: bool,
    pub highlight_color: Color,
    pub click_color: Color,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothing: CursorSmoothing::Ema,
            smoothing_strength: 0.3,
            scale: 1.0,
            color: Color::rgb(0x20, 0x20, 0x24),
            highlight: true,
            highlight_color: Color::rgba(0xff, 0xd6, 0x4a, 0x66),
            click_color: Color::rgba(0x4a, 0x9e, 0xff, 0xcc),
        }
    }
}

/// Named zoom animation speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZoomStyle {
    Slow,
    #[default]
    Mellow,
    Quick,
    Rapid,
}

impl ZoomStyle {
    pub const ALL: [ZoomStyle; 4] = [Self::Slow, Self::Mellow, Self::Quick, Self::Rapid];

    /// Divisor applied to every zoom leg; slower styles have smaller values.
    pub fn speed_multiplier(self) -> f64 {
        match self {
            Self::Slow => 0.6,
            Self::Mellow => 0.8,
            Self::Quick => 1.0,
            Self::Rapid => 1.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub enabled: bool,
    /// Scale reached at the peak of a click zoom.
    pub max_scale: f64,
    pub style: ZoomStyle,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_scale: 1.8,
            style: ZoomStyle::Mellow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystrokeConfig {
    pub enabled: bool,
    /// How long a key badge stays visible.
    pub display_secs: f64,
    pub font_size: f32,
}

impl Default for KeystrokeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            display_secs: 1.5,
            font_size: 28.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub enabled: bool,
    pub font_size: f32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            font_size: 36.0,
        }
    }
}

/// Trim points stored with the editing state, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrimConfig {
    pub in_secs: Option<f64>,
    pub out_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_and_display() {
        let c: Color = "#1a2b3c".parse().unwrap();
        assert_eq!(c, Color::rgb(0x1a, 0x2b, 0x3c));
        assert_eq!(c.to_string(), "#1a2b3c");

        let c: Color = "#ff000080".parse().unwrap();
        assert_eq!(c.a, 0x80);
        assert_eq!(c.to_string(), "#ff000080");

        assert!("#12".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_partial_effects_json_uses_defaults() {
        let parsed: EffectsConfiguration =
            serde_json::from_str(r##"{"frame":{"padding":32},"shadow":{"color":"#102030"}}"##)
                .unwrap();
        assert_eq!(parsed.frame.padding, 32);
        assert_eq!(parsed.frame.corner_radius, 12);
        assert_eq!(parsed.shadow.color, Color::rgb(0x10, 0x20, 0x30));
        assert!(parsed.zoom.enabled);
    }

    #[test]
    fn test_zoom_styles_are_monotonic() {
        for pair in ZoomStyle::ALL.windows(2) {
            assert!(pair[0].speed_multiplier() < pair[1].speed_multiplier());
        }
    }

    #[test]
    fn test_snapshot_is_independent_of_live_edits() {
        let mut live = EffectsConfiguration::default();
        let snapshot = live.clone();
        live.frame.padding = 0;
        assert_eq!(snapshot.frame.padding, 64);
    }
}

//! Background fill: solid color or a two-stop diagonal gradient preset.
//!
//! Wallpaper and image backgrounds are not rendered by the exporter, and an
//! unknown gradient id is not guessed at. Both resolve to [`FALLBACK`].

use sheen_project_model::effects::{BackgroundConfig, BackgroundKind, Color};

use crate::frame::RgbaFrame;

/// Dark solid fill used for anything the exporter cannot render.
pub const FALLBACK: ResolvedBackground = ResolvedBackground::Solid([0x1c, 0x1c, 0x22]);

/// Gradient presets: id, start color (top-left), end color (bottom-right).
pub const GRADIENT_PRESETS: &[(&str, [u8; 3], [u8; 3])] = &[
    ("sunset", [0xff, 0x7e, 0x5f], [0xfe, 0xb4, 0x7b]),
    ("ocean", [0x2b, 0x58, 0x76], [0x4e, 0x43, 0x76]),
    ("forest", [0x13, 0x4e, 0x5e], [0x71, 0xb2, 0x80]),
    ("midnight", [0x23, 0x25, 0x26], [0x41, 0x43, 0x45]),
    ("candy", [0xd5, 0x33, 0x69], [0xda, 0xae, 0x51]),
    ("aurora", [0x00, 0xc9, 0xff], [0x92, 0xfe, 0x9d]),
];

/// A background reduced to something we can paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedBackground {
    Solid([u8; 3]),
    Gradient { from: [u8; 3], to: [u8; 3] },
}

impl ResolvedBackground {
    pub fn resolve(config: &BackgroundConfig) -> Self {
        match config.kind {
            BackgroundKind::Solid => Self::Solid(opaque(config.color)),
            BackgroundKind::Gradient => GRADIENT_PRESETS
                .iter()
                .find(|(id, _, _)| id.eq_ignore_ascii_case(config.gradient.trim()))
                .map(|&(_, from, to)| Self::Gradient { from, to })
                .unwrap_or_else(|| {
                    tracing::debug!(gradient = %config.gradient, "Unknown gradient preset, using fallback");
                    FALLBACK
                }),
            BackgroundKind::Wallpaper | BackgroundKind::Image => FALLBACK,
        }
    }

    /// Paint a full opaque frame.
    pub fn render(&self, width: u32, height: u32) -> RgbaFrame {
        match *self {
            Self::Solid([r, g, b]) => RgbaFrame::filled(width, height, [r, g, b, 255]),
            Self::Gradient { from, to } => {
                let mut frame = RgbaFrame::new(width, height);
                let span = (width.saturating_sub(1) + height.saturating_sub(1)).max(1) as f64;
                for y in 0..height {
                    for x in 0..width {
                        let t = (x + y) as f64 / span;
                        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
                        frame.put_pixel(
                            x,
                            y,
                            [lerp(from[0], to[0]), lerp(from[1], to[1]), lerp(from[2], to[2]), 255],
                        );
                    }
                }
                frame
            }
        }
    }
}

/// Flatten a possibly translucent color onto black.
fn opaque(c: Color) -> [u8; 3] {
    let a = c.a as u16;
    let f = |v: u8| ((v as u16 * a + 127) / 255) as u8;
    [f(c.r), f(c.g), f(c.b)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: BackgroundKind, gradient: &str) -> BackgroundConfig {
        BackgroundConfig {
            kind,
            gradient: gradient.to_string(),
            ..BackgroundConfig::default()
        }
    }

    #[test]
    fn test_unrendered_styles_use_single_fallback() {
        assert_eq!(ResolvedBackground::resolve(&config(BackgroundKind::Wallpaper, "ocean")), FALLBACK);
        assert_eq!(ResolvedBackground::resolve(&config(BackgroundKind::Image, "ocean")), FALLBACK);
        assert_eq!(ResolvedBackground::resolve(&config(BackgroundKind::Gradient, "nope")), FALLBACK);
    }

    #[test]
    fn test_gradient_endpoints() {
        let bg = ResolvedBackground::resolve(&config(BackgroundKind::Gradient, "Sunset"));
        let frame = bg.render(8, 4);
        assert_eq!(frame.pixel(0, 0), [0xff, 0x7e, 0x5f, 255]);
        assert_eq!(frame.pixel(7, 3), [0xfe, 0xb4, 0x7b, 255]);
    }

    #[test]
    fn test_solid_is_opaque() {
        let mut cfg = config(BackgroundKind::Solid, "");
        cfg.color = Color::rgba(200, 100, 50, 255);
        let frame = ResolvedBackground::resolve(&cfg).render(2, 2);
        assert_eq!(frame.pixel(1, 1), [200, 100, 50, 255]);
    }
}

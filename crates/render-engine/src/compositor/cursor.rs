//! Synthetic cursor: click ripples, highlight halo, dot.

use sheen_processing_core::cursor_smooth::CursorSmoother;
use sheen_processing_core::zoom::ZoomTransform;
use sheen_project_model::effects::CursorConfig;
use sheen_project_model::event::{CursorEvent, TimestampNs};

use crate::canvas::CanvasGeometry;
use crate::frame::RgbaFrame;
use crate::raster::{fill_circle, stroke_circle};

/// How long a click ripple stays visible.
pub const RIPPLE_SECS: f64 = 0.4;

/// Dot radius in source pixels at cursor scale 1.0.
const BASE_RADIUS: f64 = 9.0;
const HALO_FACTOR: f64 = 2.2;
const OUTLINE: [u8; 4] = [255, 255, 255, 230];

/// Maps capture-space cursor coordinates to output pixels.
#[derive(Debug, Clone, Copy)]
pub struct CursorMapper {
    pub capture_width: f64,
    pub capture_height: f64,
    pub geometry: CanvasGeometry,
    /// Zoom in content pixels.
    pub zoom: ZoomTransform,
}

impl CursorMapper {
    /// Output-space position, or `None` when it falls outside the recording.
    pub fn map(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let c = self.geometry.content;
        let (cw, ch) = (c.w as f64, c.h as f64);
        // Capture space is y-up.
        let u = x / self.capture_width * cw;
        let v = (self.capture_height - y) / self.capture_height * ch;
        let (u, v) = if self.zoom.active {
            self.zoom.apply(u, v, cw, ch)
        } else {
            (u, v)
        };
        if !(0.0..=cw).contains(&u) || !(0.0..=ch).contains(&v) {
            return None;
        }
        Some((c.x as f64 + u, c.y as f64 + v))
    }
}

/// Draw the cursor layer at `t_ns`.
///
/// `path` is the (smoothed) cursor log and `clicks` the raw click-downs,
/// both sorted by time.
pub fn draw_cursor(
    out: &mut RgbaFrame,
    config: &CursorConfig,
    mapper: &CursorMapper,
    path: &[CursorEvent],
    clicks: &[CursorEvent],
    t_ns: TimestampNs,
) {
    let px_scale = mapper.geometry.scale * config.scale.max(0.1);
    let radius = BASE_RADIUS * px_scale;

    let window_ns = (RIPPLE_SECS * 1_000_000_000.0) as u64;
    let end = clicks.partition_point(|c| c.timestamp_ns <= t_ns);
    let start = clicks[..end].partition_point(|c| t_ns - c.timestamp_ns >= window_ns);
    for click in &clicks[start..end] {
        let Some((x, y)) = mapper.map(click.x, click.y) else {
            continue;
        };
        let p = (t_ns - click.timestamp_ns) as f64 / window_ns as f64;
        let ring = radius * (1.2 + 2.3 * p);
        let color = config.click_color.with_opacity(1.0 - p).to_array();
        stroke_circle(out, x, y, ring, 2.5 * mapper.geometry.scale, color);
    }

    let Some(pos) = CursorSmoother::nearest_position(path, t_ns) else {
        return;
    };
    let Some((x, y)) = mapper.map(pos.x, pos.y) else {
        return;
    };

    if config.highlight {
        fill_circle(out, x, y, radius * HALO_FACTOR, config.highlight_color.to_array());
    }
    fill_circle(out, x, y, radius, config.color.to_array());
    stroke_circle(out, x, y, radius, 1.5 * mapper.geometry.scale, OUTLINE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheen_project_model::effects::FrameStyle;
    use sheen_project_model::event::CursorEventKind;
    use sheen_project_model::export::Resolution;

    fn mapper() -> CursorMapper {
        let geometry = CanvasGeometry::new(
            200,
            100,
            &FrameStyle {
                padding: 0,
                corner_radius: 0,
            },
            Resolution::Original,
        )
        .unwrap();
        CursorMapper {
            capture_width: 400.0,
            capture_height: 200.0,
            geometry,
            zoom: ZoomTransform::IDENTITY,
        }
    }

    #[test]
    fn test_mapping_flips_and_scales() {
        let m = mapper();
        assert_eq!(m.map(0.0, 200.0), Some((0.0, 0.0)));
        assert_eq!(m.map(400.0, 0.0), Some((200.0, 100.0)));
        assert_eq!(m.map(100.0, 150.0), Some((50.0, 25.0)));
        assert_eq!(m.map(-10.0, 0.0), None);
    }

    #[test]
    fn test_dot_drawn_at_nearest_sample() {
        let m = mapper();
        let mut out = RgbaFrame::filled(200, 100, [0, 0, 0, 255]);
        let path = vec![CursorEvent::moved(0, 200.0, 100.0)];
        let config = CursorConfig {
            highlight: false,
            ..CursorConfig::default()
        };
        draw_cursor(&mut out, &config, &m, &path, &[], 0);
        assert_eq!(out.pixel(100, 50), config.color.to_array());
        assert_eq!(out.pixel(5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_ripple_only_within_window() {
        let m = mapper();
        let config = CursorConfig::default();
        let clicks = vec![CursorEvent::new(0, 200.0, 100.0, CursorEventKind::LeftDown)];

        let mut early = RgbaFrame::filled(200, 100, [0, 0, 0, 255]);
        draw_cursor(&mut early, &config, &m, &[], &clicks, 100_000_000);
        assert_ne!(early, RgbaFrame::filled(200, 100, [0, 0, 0, 255]));

        let mut late = RgbaFrame::filled(200, 100, [0, 0, 0, 255]);
        draw_cursor(&mut late, &config, &m, &[], &clicks, 500_000_000);
        assert_eq!(late, RgbaFrame::filled(200, 100, [0, 0, 0, 255]));
    }
}

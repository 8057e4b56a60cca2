//! Keystroke badge row along the bottom of the canvas.

use sheen_processing_core::keystrokes::KeystrokeBadge;
use sheen_project_model::geometry::Rect;

use crate::frame::RgbaFrame;
use crate::raster::fill_rounded_rect;

use super::cache::GeometryCache;

const BADGE_FILL: [u8; 4] = [20, 20, 24, 210];
const TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Draw `badges` centred horizontally near the bottom of `canvas`.
///
/// `font_size` is already in output pixels.
pub fn draw_badges(
    out: &mut RgbaFrame,
    cache: &mut GeometryCache,
    badges: &[KeystrokeBadge],
    canvas: &Rect,
    font_size: f32,
) {
    if badges.is_empty() {
        return;
    }
    let pad_x = font_size as f64 * 0.6;
    let pad_y = font_size as f64 * 0.3;
    let gap = font_size as f64 * 0.35;
    let bottom_margin = font_size as f64 * 0.9;

    let labels: Vec<_> = badges
        .iter()
        .map(|b| cache.text(&b.label, font_size, None))
        .collect();

    let line_h = (font_size * 1.25).ceil() as f64;
    let badge_h = line_h + 2.0 * pad_y;
    let widths: Vec<f64> = labels
        .iter()
        .map(|l| l.width as f64 + 2.0 * pad_x)
        .collect();
    let total_w = widths.iter().sum::<f64>() + gap * (badges.len() - 1) as f64;

    let mut x = canvas.center().x - total_w / 2.0;
    let y = canvas.bottom() - bottom_margin - badge_h;

    for ((badge, label), w) in badges.iter().zip(&labels).zip(&widths) {
        let fill = [
            BADGE_FILL[0],
            BADGE_FILL[1],
            BADGE_FILL[2],
            (BADGE_FILL[3] as f64 * badge.opacity).round() as u8,
        ];
        fill_rounded_rect(out, x, y, *w, badge_h, badge_h * 0.3, fill);

        let text = [
            TEXT_COLOR[0],
            TEXT_COLOR[1],
            TEXT_COLOR[2],
            (TEXT_COLOR[3] as f64 * badge.opacity).round() as u8,
        ];
        label.draw(out, (x + pad_x).round() as i64, (y + pad_y).round() as i64, text);
        x += w + gap;
    }
}

//! Transcript caption: one centred block in the lower third.

use sheen_processing_core::captions::normalize_caption_text;
use sheen_project_model::geometry::Rect;

use crate::frame::RgbaFrame;
use crate::raster::fill_rounded_rect;

use super::cache::GeometryCache;

const BACKDROP: [u8; 4] = [0, 0, 0, 160];
const TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];
/// Vertical centre of the caption block as a fraction of canvas height.
const CENTRE_Y: f64 = 0.8;
const MAX_WIDTH_FRACTION: f64 = 0.8;

/// Draw `text` over a translucent backdrop. `font_size` is in output pixels.
pub fn draw_caption(
    out: &mut RgbaFrame,
    cache: &mut GeometryCache,
    text: &str,
    canvas: &Rect,
    font_size: f32,
) {
    let text = normalize_caption_text(text);
    if text.is_empty() {
        return;
    }
    let max_width = (canvas.w * MAX_WIDTH_FRACTION) as f32;
    let bitmap = cache.text(&text, font_size, Some(max_width));

    let pad_x = font_size as f64 * 0.6;
    let pad_y = font_size as f64 * 0.35;
    // Keep a backdrop even if no glyphs could be rendered.
    let text_w = (bitmap.width as f64).max(font_size as f64);
    let text_h = (bitmap.height as f64).max((font_size * 1.25) as f64);

    let box_w = text_w + 2.0 * pad_x;
    let box_h = text_h + 2.0 * pad_y;
    let box_x = canvas.center().x - box_w / 2.0;
    let box_y = canvas.y + canvas.h * CENTRE_Y - box_h / 2.0;

    fill_rounded_rect(out, box_x, box_y, box_w, box_h, font_size as f64 * 0.3, BACKDROP);
    bitmap.draw(
        out,
        (box_x + pad_x + (text_w - bitmap.width as f64) / 2.0).round() as i64,
        (box_y + pad_y).round() as i64,
        TEXT_COLOR,
    );
}

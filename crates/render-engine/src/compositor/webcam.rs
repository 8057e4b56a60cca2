//! Picture-in-picture webcam bubble.

use sheen_project_model::effects::{WebcamConfig, WebcamPosition, WebcamShape};
use sheen_project_model::geometry::Rect;

use crate::frame::RgbaFrame;
use crate::raster::{blend_at, rounded_rect_coverage, sample_bilinear};

const MIN_SIZE: f64 = 0.05;
const MAX_SIZE: f64 = 0.5;
/// Corner inset as a fraction of the shorter canvas edge.
const MARGIN_FRACTION: f64 = 0.03;
const BORDER_COLOR: [u8; 4] = [255, 255, 255, 90];

/// Where the bubble goes, in output pixels. Always inside `canvas`.
///
/// `scale` converts canvas pixels (the unit of the user offsets) to output
/// pixels. `camera_aspect` is width / height of the webcam frames.
pub fn webcam_rect(config: &WebcamConfig, canvas: &Rect, scale: f64, camera_aspect: f64) -> Option<Rect> {
    if !config.enabled || canvas.w <= 0.0 || canvas.h <= 0.0 {
        return None;
    }
    let aspect = if camera_aspect.is_finite() && camera_aspect > 0.0 {
        camera_aspect
    } else {
        1.0
    };

    let width = canvas.w * config.size.clamp(MIN_SIZE, MAX_SIZE);
    let height = match config.shape {
        WebcamShape::Circle => width,
        WebcamShape::RoundedRect | WebcamShape::Rectangle => width / aspect,
    };
    let margin = canvas.w.min(canvas.h) * MARGIN_FRACTION;

    let x = match config.position {
        WebcamPosition::TopLeft | WebcamPosition::BottomLeft => canvas.x + margin,
        WebcamPosition::TopRight | WebcamPosition::BottomRight => canvas.right() - margin - width,
    };
    let y = match config.position {
        WebcamPosition::TopLeft | WebcamPosition::TopRight => canvas.y + margin,
        WebcamPosition::BottomLeft | WebcamPosition::BottomRight => canvas.bottom() - margin - height,
    };

    let placed = Rect::new(
        x + config.offset_x * scale,
        y + config.offset_y * scale,
        width,
        height,
    );
    Some(placed.clamp_inside(canvas))
}

/// Coverage of the bubble shape at a point relative to the bubble origin.
fn shape_coverage(shape: WebcamShape, px: f64, py: f64, w: f64, h: f64, inset: f64) -> f32 {
    let (px, py, w, h) = (px - inset, py - inset, w - 2.0 * inset, h - 2.0 * inset);
    if w <= 0.0 || h <= 0.0 {
        return 0.0;
    }
    let radius = match shape {
        WebcamShape::Circle => w.min(h) / 2.0,
        WebcamShape::RoundedRect => w.min(h) * 0.12,
        WebcamShape::Rectangle => 0.0,
    };
    rounded_rect_coverage(px, py, w, h, radius)
}

/// Draw the webcam frame into `rect`, cover-fitted and clipped to the shape,
/// then stroke a translucent border.
pub fn draw_webcam(out: &mut RgbaFrame, camera: &RgbaFrame, rect: &Rect, shape: WebcamShape, border: f64) {
    if camera.width == 0 || camera.height == 0 || rect.w <= 0.0 || rect.h <= 0.0 {
        return;
    }
    let (x0, y0, x1, y1) = rect.pixel_span(out.width, out.height);
    let fit = (rect.w / camera.width as f64).max(rect.h / camera.height as f64);
    let centre = rect.center();

    for py in y0..y1 {
        for px in x0..x1 {
            let lx = px as f64 + 0.5 - rect.x;
            let ly = py as f64 + 0.5 - rect.y;
            let cov = shape_coverage(shape, lx, ly, rect.w, rect.h, 0.0);
            if cov <= 0.0 {
                continue;
            }
            let sx = camera.width as f64 / 2.0 + (px as f64 + 0.5 - centre.x) / fit;
            let sy = camera.height as f64 / 2.0 + (py as f64 + 0.5 - centre.y) / fit;
            let [r, g, b, _] = sample_bilinear(camera, sx, sy);
            let i = out.index(px, py);
            blend_at(&mut out.data, i, [r, g, b, 255], cov);

            if border > 0.0 {
                let inner = shape_coverage(shape, lx, ly, rect.w, rect.h, border);
                let ring = cov - inner;
                if ring > 0.0 {
                    blend_at(&mut out.data, i, BORDER_COLOR, ring);
                }
            }
        }
    }
}

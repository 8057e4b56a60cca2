//! Canvas geometry: where the recording sits inside the output frame.
//!
//! The canvas is the source frame plus padding on every side. It is scaled
//! uniformly to fit the output resolution and centred; the background fills
//! the whole output, including any letterbox bars.

use sheen_common::error::{SheenError, SheenResult};
use sheen_project_model::effects::FrameStyle;
use sheen_project_model::export::Resolution;
use sheen_project_model::geometry::Rect;

/// Smallest output edge the encoders accept.
pub const MIN_OUTPUT_DIMENSION: u32 = 64;

/// Integer pixel rectangle in output space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// Resolved layout for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    /// Raw source frame size.
    pub source_width: u32,
    pub source_height: u32,

    /// Canvas size before output scaling (source + 2 x padding).
    pub canvas_width: u32,
    pub canvas_height: u32,

    /// Final encoded frame size; always even.
    pub output_width: u32,
    pub output_height: u32,

    /// Output pixels per canvas pixel.
    pub scale: f64,

    /// Canvas placement within the output.
    pub canvas_rect: Rect,

    /// Recording placement within the output, snapped to whole pixels.
    pub content: PixelRect,

    /// Corner radius in output pixels.
    pub corner_radius: f64,
}

impl CanvasGeometry {
    pub fn new(
        source_width: u32,
        source_height: u32,
        frame: &FrameStyle,
        resolution: Resolution,
    ) -> SheenResult<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(SheenError::invalid_job(format!(
                "source frame size {source_width}x{source_height} is empty"
            )));
        }

        let canvas_width = source_width + 2 * frame.padding;
        let canvas_height = source_height + 2 * frame.padding;

        let (target_w, target_h) = resolution
            .dimensions()
            .unwrap_or((canvas_width, canvas_height));
        let output_width = even_floor(target_w.max(MIN_OUTPUT_DIMENSION));
        let output_height = even_floor(target_h.max(MIN_OUTPUT_DIMENSION));

        let output_rect = Rect::from_size(output_width as f64, output_height as f64);
        let (canvas_rect, scale) =
            output_rect.fit_centered(canvas_width as f64, canvas_height as f64);

        let pad = frame.padding as f64 * scale;
        let cx = (canvas_rect.x + pad).round();
        let cy = (canvas_rect.y + pad).round();
        let cw = (source_width as f64 * scale).round().max(1.0);
        let ch = (source_height as f64 * scale).round().max(1.0);
        let content = PixelRect {
            x: cx as u32,
            y: cy as u32,
            w: (cw as u32).min(output_width - cx as u32),
            h: (ch as u32).min(output_height - cy as u32),
        };

        Ok(Self {
            source_width,
            source_height,
            canvas_width,
            canvas_height,
            output_width,
            output_height,
            scale,
            canvas_rect,
            content,
            corner_radius: frame.corner_radius as f64 * scale,
        })
    }
}

fn even_floor(v: u32) -> u32 {
    v & !1
}

//! Text shaping and rasterization via cosmic-text.
//!
//! Font discovery is expensive, so one `FontSystem` and glyph cache are
//! shared by the whole process behind a mutex.

use std::sync::{Mutex, OnceLock};

use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache};

use crate::frame::RgbaFrame;
use crate::raster::blend_pixel;

struct TextEngine {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

fn engine() -> &'static Mutex<TextEngine> {
    static ENGINE: OnceLock<Mutex<TextEngine>> = OnceLock::new();
    ENGINE.get_or_init(|| {
        tracing::debug!("Loading system fonts");
        Mutex::new(TextEngine {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        })
    })
}

/// Rasterized text as a coverage mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl TextBitmap {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Blend the text onto `out` with its top-left corner at `(x, y)`.
    pub fn draw(&self, out: &mut RgbaFrame, x: i64, y: i64, color: [u8; 4]) {
        for row in 0..self.height {
            for col in 0..self.width {
                let a = self.coverage[(row * self.width + col) as usize];
                if a > 0 {
                    blend_pixel(out, x + col as i64, y + row as i64, color, a as f32 / 255.0);
                }
            }
        }
    }
}

/// Shape and rasterize `text` as sans-serif at `font_size` pixels.
///
/// Lines wrap at `max_width` when given. Returns an empty bitmap when no
/// fonts are available.
pub fn rasterize(text: &str, font_size: f32, max_width: Option<f32>) -> TextBitmap {
    let font_size = font_size.max(1.0);
    let line_height = (font_size * 1.25).ceil();

    let mut guard = engine().lock().unwrap_or_else(|e| e.into_inner());
    let TextEngine {
        font_system,
        swash_cache,
    } = &mut *guard;

    let mut buffer = Buffer::new(font_system, Metrics::new(font_size, line_height));
    buffer.set_size(font_system, Some(max_width.unwrap_or(8192.0)), None);
    buffer.set_text(
        font_system,
        text,
        &Attrs::new().family(Family::SansSerif),
        Shaping::Advanced,
        None,
    );
    buffer.shape_until_scroll(font_system, false);

    let mut text_w = 0.0f32;
    let mut text_h = 0.0f32;
    for run in buffer.layout_runs() {
        for glyph in run.glyphs.iter() {
            text_w = text_w.max(glyph.x + glyph.w);
        }
        text_h = text_h.max(run.line_y + line_height);
    }

    let width = text_w.ceil() as u32;
    let height = text_h.ceil() as u32;
    let mut coverage = vec![0u8; width as usize * height as usize];
    if width == 0 || height == 0 {
        return TextBitmap {
            width,
            height,
            coverage,
        };
    }

    buffer.draw(
        font_system,
        swash_cache,
        Color::rgba(255, 255, 255, 255),
        |x, y, w, h, color| {
            let a = color.a();
            if a == 0 {
                return;
            }
            for dy in 0..h as i32 {
                for dx in 0..w as i32 {
                    let px = x + dx;
                    let py = y + dy;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }
                    let idx = py as usize * width as usize + px as usize;
                    coverage[idx] = coverage[idx].max(a);
                }
            }
        },
    );

    TextBitmap {
        width,
        height,
        coverage,
    }
}

//! Per-export caches for artwork that depends only on geometry and style.
//!
//! The rounded mask, the blurred shadow silhouette and the background are
//! identical for every frame of an export, so each is built once and reused
//! until its key changes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::frame::RgbaFrame;
use crate::raster::{blur_mask, rounded_rect_mask};

use super::background::ResolvedBackground;
use super::text::{rasterize, TextBitmap};

const TEXT_CACHE_LIMIT: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MaskKey {
    width: u32,
    height: u32,
    radius_bits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ShadowKey {
    mask: MaskKey,
    blur: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BackgroundKey {
    width: u32,
    height: u32,
    background: ResolvedBackground,
}

/// Blurred shadow silhouette, larger than the content by `margin` per side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowSprite {
    pub margin: u32,
    pub width: u32,
    pub height: u32,
    pub alpha: Vec<u8>,
}

/// Cache statistics, mostly for tests and debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub mask_builds: u32,
    pub shadow_builds: u32,
    pub background_builds: u32,
}

#[derive(Debug, Default)]
pub struct GeometryCache {
    mask: Option<(MaskKey, Arc<Vec<u8>>)>,
    shadow: Option<(ShadowKey, Arc<ShadowSprite>)>,
    background: Option<(BackgroundKey, Arc<RgbaFrame>)>,
    text: HashMap<(String, u32, Option<u32>), Arc<TextBitmap>>,
    stats: CacheStats,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Rounded-rectangle coverage mask for the content rectangle.
    pub fn mask(&mut self, width: u32, height: u32, radius: f64) -> Arc<Vec<u8>> {
        let key = MaskKey {
            width,
            height,
            radius_bits: radius.max(0.0).to_bits(),
        };
        if let Some((k, mask)) = &self.mask {
            if *k == key {
                return Arc::clone(mask);
            }
        }
        let mask = Arc::new(rounded_rect_mask(width, height, radius));
        self.stats.mask_builds += 1;
        self.mask = Some((key, Arc::clone(&mask)));
        mask
    }

    /// Blurred silhouette of the content shape.
    pub fn shadow(&mut self, width: u32, height: u32, radius: f64, blur: u32) -> Arc<ShadowSprite> {
        let mask_key = MaskKey {
            width,
            height,
            radius_bits: radius.max(0.0).to_bits(),
        };
        let key = ShadowKey {
            mask: mask_key,
            blur,
        };
        if let Some((k, sprite)) = &self.shadow {
            if *k == key {
                return Arc::clone(sprite);
            }
        }

        let mask = self.mask(width, height, radius);
        let margin = blur;
        let sw = width + 2 * margin;
        let sh = height + 2 * margin;
        let mut silhouette = vec![0u8; sw as usize * sh as usize];
        for y in 0..height {
            let src = (y * width) as usize;
            let dst = ((y + margin) * sw + margin) as usize;
            silhouette[dst..dst + width as usize].copy_from_slice(&mask[src..src + width as usize]);
        }

        let sprite = Arc::new(ShadowSprite {
            margin,
            width: sw,
            height: sh,
            alpha: blur_mask(&silhouette, sw, sh, blur),
        });
        self.stats.shadow_builds += 1;
        tracing::debug!(width = sw, height = sh, blur, "Built shadow sprite");
        self.shadow = Some((key, Arc::clone(&sprite)));
        sprite
    }

    /// Full-output background image.
    pub fn background(
        &mut self,
        width: u32,
        height: u32,
        background: ResolvedBackground,
    ) -> Arc<RgbaFrame> {
        let key = BackgroundKey {
            width,
            height,
            background,
        };
        if let Some((k, frame)) = &self.background {
            if *k == key {
                return Arc::clone(frame);
            }
        }
        let frame = Arc::new(background.render(width, height));
        self.stats.background_builds += 1;
        self.background = Some((key, Arc::clone(&frame)));
        frame
    }

    /// Rasterized text, memoized by content, size and wrap width.
    pub fn text(&mut self, text: &str, font_size: f32, max_width: Option<f32>) -> Arc<TextBitmap> {
        let key = (
            text.to_string(),
            font_size.to_bits(),
            max_width.map(f32::to_bits),
        );
        if let Some(bitmap) = self.text.get(&key) {
            return Arc::clone(bitmap);
        }
        if self.text.len() >= TEXT_CACHE_LIMIT {
            self.text.clear();
        }
        let bitmap = Arc::new(rasterize(text, font_size, max_width));
        self.text.insert(key, Arc::clone(&bitmap));
        bitmap
    }
}

//! Pixel buffers, decoded samples, and the buffer pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sheen_common::error::{SheenError, SheenResult};

/// Straight-alpha RGBA8 image, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaFrame {
    /// Allocate a fully transparent frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; byte_len(width, height)],
        }
    }

    /// A frame filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            data: rgba.repeat(byte_len(width, height) / 4),
        }
    }

    /// Wrap an existing buffer, checking its length.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> SheenResult<Self> {
        if data.len() != byte_len(width, height) {
            return Err(SheenError::source_unavailable(format!(
                "frame buffer is {} bytes, expected {} for {width}x{height}",
                data.len(),
                byte_len(width, height)
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// A decoded video sample on the rebased (trim-relative) timeline.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub pts_secs: f64,
    pub image: RgbaFrame,
}

/// Interleaved 32-bit float PCM on the rebased timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub pts_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioChunk {
    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Recycles frame-sized byte buffers between the compositor and the encoder.
///
/// Buffers are keyed by dimensions. Each key keeps at most `per_size` idle
/// buffers; extras are dropped.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<Mutex<HashMap<(u32, u32), Vec<Vec<u8>>>>>,
    per_size: usize,
}

impl BufferPool {
    pub fn new(per_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            per_size,
        }
    }

    /// Take a buffer of the given size. Contents are unspecified.
    pub fn acquire(&self, width: u32, height: u32) -> RgbaFrame {
        let reused = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&(width, height))
            .and_then(Vec::pop);
        match reused {
            Some(data) => RgbaFrame {
                width,
                height,
                data,
            },
            None => RgbaFrame::new(width, height),
        }
    }

    /// Hand a buffer back for reuse.
    pub fn release(&self, frame: RgbaFrame) {
        if frame.data.len() != byte_len(frame.width, frame.height) {
            return;
        }
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let idle = map.entry((frame.width, frame.height)).or_default();
        if idle.len() < self.per_size {
            idle.push(frame.data);
        }
    }

    /// Idle buffers currently held for a size.
    pub fn idle_count(&self, width: u32, height: u32) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(width, height))
            .map_or(0, Vec::len)
    }

    /// Drop every idle buffer.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8)
    }
}

//! In-memory source for tests and synthetic input.

use std::path::PathBuf;
use std::sync::Arc;

use sheen_common::error::{SheenError, SheenResult};

use super::{estimated_sample_count, MediaInfo, MediaSource, SourceReader, TrimRange, TIME_EPSILON};
use crate::frame::{AudioChunk, RgbaFrame, VideoFrame};

/// Frames and audio held in memory, with the same trim and resampling
/// behaviour as a decoded file.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Arc<Vec<VideoFrame>>,
    audio: Arc<Vec<AudioChunk>>,
    duration_secs: f64,
}

impl MemorySource {
    /// `frames` need not be sorted. The duration extends one interval at
    /// `frame_rate` past the last frame.
    pub fn new(mut frames: Vec<VideoFrame>, frame_rate: f64) -> Self {
        frames.sort_by(|a, b| a.pts_secs.total_cmp(&b.pts_secs));
        let duration_secs = frames
            .last()
            .map(|f| f.pts_secs + 1.0 / frame_rate.max(1.0))
            .unwrap_or(0.0);
        Self {
            frames: Arc::new(frames),
            audio: Arc::new(Vec::new()),
            duration_secs,
        }
    }

    /// Generate `duration_secs` of video at `frame_rate` from `render(index, pts)`.
    pub fn synthetic(
        frame_rate: f64,
        duration_secs: f64,
        mut render: impl FnMut(u64, f64) -> RgbaFrame,
    ) -> Self {
        let count = (duration_secs * frame_rate - TIME_EPSILON).ceil().max(0.0) as u64;
        let frames = (0..count)
            .map(|i| {
                let pts = i as f64 / frame_rate;
                VideoFrame {
                    pts_secs: pts,
                    image: render(i, pts),
                }
            })
            .collect();
        Self {
            frames: Arc::new(frames),
            audio: Arc::new(Vec::new()),
            duration_secs,
        }
    }

    pub fn with_audio(mut self, mut chunks: Vec<AudioChunk>) -> Self {
        chunks.sort_by(|a, b| a.pts_secs.total_cmp(&b.pts_secs));
        self.audio = Arc::new(chunks);
        self
    }
}

impl MediaSource for MemorySource {
    fn describe(&self) -> SheenResult<MediaInfo> {
        let Some(first) = self.frames.first() else {
            return Err(SheenError::NoVideoTrack {
                path: PathBuf::from("<memory>"),
            });
        };
        Ok(MediaInfo {
            width: first.image.width,
            height: first.image.height,
            duration_secs: self.duration_secs,
            audio: self.audio.first().map(|c| (c.sample_rate, c.channels)),
        })
    }

    fn open(&self, range: TrimRange, fps: f64) -> SheenResult<Box<dyn SourceReader>> {
        if self.frames.is_empty() {
            return Err(SheenError::NoVideoTrack {
                path: PathBuf::from("<memory>"),
            });
        }
        if fps <= 0.0 {
            return Err(SheenError::invalid_job(format!("frame rate {fps} must be positive")));
        }
        // Video stops where the recording does, even inside a longer window.
        let end = range.out_secs.min(self.duration_secs);
        let total = if end - range.in_secs > TIME_EPSILON {
            estimated_sample_count(
                TrimRange {
                    in_secs: range.in_secs,
                    out_secs: end,
                },
                fps,
            )
        } else {
            0
        };
        Ok(Box::new(MemoryReader {
            frames: Arc::clone(&self.frames),
            audio: Arc::clone(&self.audio),
            range,
            fps,
            total,
            next_index: 0,
            next_audio: 0,
        }))
    }
}

struct MemoryReader {
    frames: Arc<Vec<VideoFrame>>,
    audio: Arc<Vec<AudioChunk>>,
    range: TrimRange,
    fps: f64,
    total: u64,
    next_index: u64,
    next_audio: usize,
}

impl SourceReader for MemoryReader {
    fn next_video(&mut self) -> SheenResult<Option<VideoFrame>> {
        if self.next_index >= self.total {
            return Ok(None);
        }
        let rebased = self.next_index as f64 / self.fps;
        let t = self.range.in_secs + rebased;
        // Constant-rate resampling: hold the latest frame at or before t.
        let idx = self
            .frames
            .partition_point(|f| f.pts_secs <= t + TIME_EPSILON)
            .saturating_sub(1);
        self.next_index += 1;
        Ok(Some(VideoFrame {
            pts_secs: rebased,
            image: self.frames[idx].image.clone(),
        }))
    }

    fn next_audio(&mut self) -> SheenResult<Option<AudioChunk>> {
        while let Some(chunk) = self.audio.get(self.next_audio) {
            self.next_audio += 1;
            if let Some(clipped) = clip_chunk(chunk, self.range) {
                return Ok(Some(clipped));
            }
        }
        Ok(None)
    }

    fn estimated_sample_count(&self) -> u64 {
        self.total
    }
}

/// The part of `chunk` inside `range`, rebased to the window start.
fn clip_chunk(chunk: &AudioChunk, range: TrimRange) -> Option<AudioChunk> {
    let rate = chunk.sample_rate.max(1) as f64;
    let channels = chunk.channels.max(1) as usize;
    let frames = chunk.frame_count();
    let start_t = chunk.pts_secs;

    let first = ((range.in_secs - start_t) * rate).ceil().max(0.0) as usize;
    let last = ((range.out_secs - start_t) * rate).ceil().clamp(0.0, frames as f64) as usize;
    if first >= last {
        return None;
    }
    Some(AudioChunk {
        pts_secs: (start_t + first as f64 / rate - range.in_secs).max(0.0),
        sample_rate: chunk.sample_rate,
        channels: chunk.channels,
        samples: chunk.samples[first * channels..last * channels].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shade(i: u64) -> RgbaFrame {
        RgbaFrame::filled(4, 4, [i as u8, 0, 0, 255])
    }

    #[test]
    fn test_trim_rebases_and_resamples() {
        let source = MemorySource::synthetic(10.0, 2.0, |i, _| shade(i));
        let range = TrimRange::resolve(Some(0.5), Some(1.0), 2.0).unwrap();
        let mut reader = source.open(range, 20.0).unwrap();
        assert_eq!(reader.estimated_sample_count(), 10);

        let mut frames = Vec::new();
        while let Some(f) = reader.next_video().unwrap() {
            frames.push(f);
        }
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[0].pts_secs, 0.0);
        assert_eq!(frames[0].image.pixel(0, 0)[0], 5);
        // 20 fps out of a 10 fps source repeats each frame twice.
        assert_eq!(frames[1].image.pixel(0, 0)[0], 5);
        assert_eq!(frames[2].image.pixel(0, 0)[0], 6);
        assert!(frames.windows(2).all(|w| w[0].pts_secs < w[1].pts_secs));
    }

    #[test]
    fn test_window_past_recording_end_stops_early() {
        let source = MemorySource::synthetic(10.0, 1.0, |i, _| shade(i));
        let range = TrimRange {
            in_secs: 0.5,
            out_secs: 3.0,
        };
        let mut reader = source.open(range, 10.0).unwrap();
        assert_eq!(reader.estimated_sample_count(), 5);
        let mut count = 0;
        while reader.next_video().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);

        let late = TrimRange {
            in_secs: 2.0,
            out_secs: 3.0,
        };
        assert!(source.open(late, 10.0).unwrap().next_video().unwrap().is_none());
    }

    #[test]
    fn test_empty_source_has_no_video_track() {
        let source = MemorySource::new(Vec::new(), 30.0);
        assert!(matches!(source.describe(), Err(SheenError::NoVideoTrack { .. })));
    }

    #[test]
    fn test_audio_clipped_to_window() {
        let chunk = AudioChunk {
            pts_secs: 0.0,
            sample_rate: 10,
            channels: 2,
            samples: (0..40).map(|i| i as f32).collect(),
        };
        let source = MemorySource::synthetic(10.0, 2.0, |i, _| shade(i)).with_audio(vec![chunk]);
        assert_eq!(source.describe().unwrap().audio, Some((10, 2)));

        let range = TrimRange::resolve(Some(0.5), Some(1.0), 2.0).unwrap();
        let mut reader = source.open(range, 10.0).unwrap();
        let clipped = reader.next_audio().unwrap().unwrap();
        assert_eq!(clipped.pts_secs, 0.0);
        assert_eq!(clipped.frame_count(), 5);
        assert_eq!(clipped.samples[0], 10.0);
        assert!(reader.next_audio().unwrap().is_none());
    }
}

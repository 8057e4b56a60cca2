//! Media sources: decoded video frames and audio for a trim window.
//!
//! A [`MediaSource`] is a handle to recorded media. Opening it for a trim
//! window `[in, out)` at a frame rate yields a [`SourceReader`] whose
//! samples are time-ordered and rebased so that `in` is zero.

mod ffmpeg;
mod memory;

pub use ffmpeg::FfmpegSource;
pub use memory::MemorySource;

use sheen_common::error::{SheenError, SheenResult};

use crate::frame::{AudioChunk, RgbaFrame, VideoFrame};

/// Tolerance for comparing sample times against window edges.
pub(crate) const TIME_EPSILON: f64 = 1e-6;

/// What a source contains.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    /// `(sample_rate, channels)` of the first audio stream.
    pub audio: Option<(u32, u16)>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Half-open export window on the recording timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRange {
    pub in_secs: f64,
    pub out_secs: f64,
}

impl TrimRange {
    /// Resolve optional trim points against a recording of `duration_secs`.
    ///
    /// Missing points default to the recording edges; `out` is clamped to
    /// the duration. An empty or inverted window is an invalid job.
    pub fn resolve(in_secs: Option<f64>, out_secs: Option<f64>, duration_secs: f64) -> SheenResult<Self> {
        let start = in_secs.unwrap_or(0.0).max(0.0);
        let end = out_secs.unwrap_or(duration_secs).min(duration_secs);
        if !start.is_finite() || !end.is_finite() || end - start <= TIME_EPSILON {
            return Err(SheenError::invalid_job(format!(
                "trim window [{start:.3}, {end:.3}) is empty for a {duration_secs:.3}s recording"
            )));
        }
        Ok(Self {
            in_secs: start,
            out_secs: end,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.out_secs - self.in_secs
    }
}

/// Number of frames a window holds at `fps`: ⌈duration × fps⌉.
pub fn estimated_sample_count(range: TrimRange, fps: f64) -> u64 {
    if fps <= 0.0 {
        return 0;
    }
    (range.duration_secs() * fps - TIME_EPSILON).ceil().max(0.0) as u64
}

/// Upstream media handle.
pub trait MediaSource: Send + Sync {
    /// Probe dimensions, duration and streams.
    fn describe(&self) -> SheenResult<MediaInfo>;

    /// Open a reader for `range`, resampling video to a constant `fps`.
    fn open(&self, range: TrimRange, fps: f64) -> SheenResult<Box<dyn SourceReader>>;
}

/// Time-ordered samples from one trim window.
pub trait SourceReader: Send {
    /// Next video frame, or `None` once the window is exhausted.
    fn next_video(&mut self) -> SheenResult<Option<VideoFrame>>;

    /// Next audio chunk, or `None` when there is no (more) audio.
    fn next_audio(&mut self) -> SheenResult<Option<AudioChunk>>;

    /// Advisory frame count for progress reporting.
    fn estimated_sample_count(&self) -> u64;
}

/// Matches webcam frames to main-frame times.
///
/// Returns the latest webcam frame whose timestamp is at most half a frame
/// interval past the requested time. Frames further in the future are held
/// back until the timeline catches up. Once the webcam recording has ended,
/// times more than one frame interval past its last frame have no match.
pub struct WebcamTrack {
    reader: Box<dyn SourceReader>,
    interval_secs: f64,
    tolerance_secs: f64,
    current: Option<VideoFrame>,
    pending: Option<VideoFrame>,
    exhausted: bool,
}

impl WebcamTrack {
    pub fn new(reader: Box<dyn SourceReader>, fps: f64) -> Self {
        let interval_secs = 1.0 / fps.max(1.0);
        Self {
            reader,
            interval_secs,
            tolerance_secs: interval_secs * 0.5,
            current: None,
            pending: None,
            exhausted: false,
        }
    }

    /// Webcam image for rebased time `t_secs`. Calls must not go backwards.
    pub fn frame_at(&mut self, t_secs: f64) -> SheenResult<Option<&RgbaFrame>> {
        let limit = t_secs + self.tolerance_secs + TIME_EPSILON;
        loop {
            if self.pending.is_none() && !self.exhausted {
                self.pending = self.reader.next_video()?;
                self.exhausted = self.pending.is_none();
            }
            match self.pending.take() {
                Some(frame) if frame.pts_secs <= limit => self.current = Some(frame),
                Some(frame) => {
                    self.pending = Some(frame);
                    break;
                }
                None => break,
            }
        }
        if self.exhausted {
            if let Some(last) = &self.current {
                if t_secs > last.pts_secs + self.interval_secs + TIME_EPSILON {
                    return Ok(None);
                }
            }
        }
        Ok(self.current.as_ref().map(|f| &f.image))
    }
}

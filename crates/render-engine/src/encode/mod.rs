//! Encoders: composited frames in, finished container out.
//!
//! Every encoder runs its heavy work on a worker thread fed through a
//! bounded channel, so a slow encoder applies backpressure to the render
//! loop instead of letting frames pile up in memory. Output is written to
//! a hidden partial file next to the destination and only renamed into
//! place by a successful [`Encoder::finish`].

mod palette;
mod video;

pub use palette::PaletteEncoder;
pub use video::VideoEncoder;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, SendTimeoutError, Sender};
use sheen_common::error::{SheenError, SheenResult};
use sheen_project_model::export::{AnimatedImageSettings, ExportFormat, FrameRate, Quality};

use crate::frame::{AudioChunk, BufferPool, RgbaFrame};

/// Frames allowed in flight between the render loop and the worker.
pub const CHANNEL_CAPACITY: usize = 4;

/// How long a push may wait on a stuck encoder before failing the job.
pub const DEFAULT_STALL_CEILING: Duration = Duration::from_secs(60);

const SEND_POLL: Duration = Duration::from_millis(250);
const STALL_WARN_EVERY: Duration = Duration::from_secs(5);

/// What an encoder needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub format: ExportFormat,
    pub quality: Quality,
    pub animated_image: AnimatedImageSettings,
}

/// Result of a sealed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    pub output: PathBuf,
    pub frames_encoded: u64,
}

/// Sink for composited frames and audio.
pub trait Encoder: Send {
    /// Whether [`push_audio`](Self::push_audio) does anything.
    fn accepts_audio(&self) -> bool;

    /// Queue one output-sized frame. `pts_secs` is relative to the trim start.
    fn push_frame(&mut self, frame: RgbaFrame, pts_secs: f64) -> SheenResult<()>;

    fn push_audio(&mut self, chunk: &AudioChunk) -> SheenResult<()>;

    /// Drain queued work, seal the container and move it into place.
    ///
    /// `cancel` is checked once more before the output is committed; if it
    /// is set the partial file is deleted and `None` is returned.
    fn finish(self: Box<Self>, cancel: &AtomicBool) -> SheenResult<Option<EncodeSummary>>;

    /// Stop immediately and delete partial output.
    fn abort(self: Box<Self>);
}

/// Build the encoder for `settings.format`.
pub fn create_encoder(
    settings: &EncoderSettings,
    destination: &Path,
    pool: BufferPool,
) -> SheenResult<Box<dyn Encoder>> {
    match settings.format {
        ExportFormat::General | ExportFormat::Archival => {
            Ok(Box::new(VideoEncoder::new(settings, destination, pool)?))
        }
        ExportFormat::AnimatedImage => Ok(Box::new(PaletteEncoder::new(settings, destination, pool)?)),
    }
}

/// Output file that only appears at its destination once committed.
///
/// Until then it lives as `.<stem>.<tag>.<ext>` in the destination
/// directory and is deleted on drop.
#[derive(Debug)]
pub struct PartialFile {
    partial: PathBuf,
    destination: PathBuf,
    committed: bool,
}

impl PartialFile {
    pub fn new(destination: &Path) -> SheenResult<Self> {
        Self::with_tag(destination, "sheen-partial")
    }

    pub fn with_tag(destination: &Path, tag: &str) -> SheenResult<Self> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| {
            SheenError::encoder_setup(format!(
                "cannot create output directory {}: {e}",
                parent.display()
            ))
        })?;

        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        let name = match destination.extension() {
            Some(ext) => format!(".{stem}.{tag}.{}", ext.to_string_lossy()),
            None => format!(".{stem}.{tag}"),
        };
        let partial = parent.join(name);
        if partial.exists() {
            tracing::debug!(path = %partial.display(), "Removing stale partial file");
            let _ = std::fs::remove_file(&partial);
        }

        Ok(Self {
            partial,
            destination: destination.to_path_buf(),
            committed: false,
        })
    }

    /// Where the encoder should write.
    pub fn path(&self) -> &Path {
        &self.partial
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Atomically move the partial file to its destination.
    pub fn commit(mut self) -> SheenResult<PathBuf> {
        std::fs::rename(&self.partial, &self.destination).map_err(|e| {
            SheenError::encoder_write(format!(
                "failed to move {} into place: {e}",
                self.destination.display()
            ))
        })?;
        self.committed = true;
        Ok(self.destination.clone())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed && self.partial.exists() {
            match std::fs::remove_file(&self.partial) {
                Ok(()) => tracing::debug!(path = %self.partial.display(), "Deleted partial output"),
                Err(e) => tracing::warn!(
                    path = %self.partial.display(),
                    error = %e,
                    "Failed to delete partial output"
                ),
            }
        }
    }
}

/// The part of an encoder that runs on the worker thread.
pub(crate) trait FrameSink: Send + 'static {
    fn write(&mut self, frame: &RgbaFrame, pts_secs: f64) -> SheenResult<()>;
}

/// Owns the worker thread and the sending half of its queue.
pub(crate) struct FrameWorker<S: FrameSink> {
    tx: Option<Sender<(RgbaFrame, f64)>>,
    handle: Option<JoinHandle<(S, SheenResult<()>)>>,
    stall_ceiling: Duration,
}

impl<S: FrameSink> FrameWorker<S> {
    pub(crate) fn spawn(name: &str, mut sink: S, pool: BufferPool) -> SheenResult<Self> {
        let (tx, rx) = bounded::<(RgbaFrame, f64)>(CHANNEL_CAPACITY);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for (frame, pts) in rx.iter() {
                    let result = sink.write(&frame, pts);
                    pool.release(frame);
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Encoder worker failed");
                        return (sink, Err(e));
                    }
                }
                (sink, Ok(()))
            })
            .map_err(|e| SheenError::encoder_setup(format!("failed to start encoder worker: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            stall_ceiling: DEFAULT_STALL_CEILING,
        })
    }

    pub(crate) fn set_stall_ceiling(&mut self, ceiling: Duration) {
        self.stall_ceiling = ceiling;
    }

    /// Queue a frame, waiting while the queue is full.
    pub(crate) fn send(&mut self, frame: RgbaFrame, pts_secs: f64) -> SheenResult<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(SheenError::encoder_write("encoder is already closed"));
        };
        let started = Instant::now();
        let mut last_warn = started;
        let mut item = (frame, pts_secs);
        loop {
            match tx.send_timeout(item, SEND_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => {
                    let waited = started.elapsed();
                    if waited >= self.stall_ceiling {
                        return Err(SheenError::encoder_write(format!(
                            "encoder stalled for {:.1}s",
                            waited.as_secs_f64()
                        )));
                    }
                    if last_warn.elapsed() >= STALL_WARN_EVERY {
                        tracing::warn!(waited_secs = waited.as_secs_f64(), "Encoder is not keeping up");
                        last_warn = Instant::now();
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(match self.join() {
                        Ok((_, Err(e))) => e,
                        Ok((_, Ok(()))) => SheenError::encoder_write("encoder worker exited early"),
                        Err(e) => e,
                    });
                }
            }
        }
    }

    /// Close the queue and wait for the worker to drain it.
    pub(crate) fn join(&mut self) -> SheenResult<(S, SheenResult<()>)> {
        drop(self.tx.take());
        let handle = self
            .handle
            .take()
            .ok_or_else(|| SheenError::encoder_write("encoder worker already joined"))?;
        handle
            .join()
            .map_err(|_| SheenError::encoder_write("encoder worker panicked"))
    }
}

//! Export orchestration: read, composite, encode, report.
//!
//! An [`ExportOrchestrator`] runs one job at a time. The job moves through
//! `Preparing → Rendering → EncodingAudio → Finalizing` and ends in
//! `Complete`, `Failed`, or back in `Idle` when cancelled. Status is
//! published on a `watch` channel; callers can also poll a snapshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use sheen_common::clock::{JobClock, RateController};
use sheen_common::error::{SheenError, SheenResult};
use sheen_processing_core::zoom::ZoomTransformer;
use sheen_project_model::effects::EffectsConfiguration;
use sheen_project_model::event::EventLogs;
use sheen_project_model::export::ExportSettings;
use sheen_project_model::recording::LoadedRecording;

use crate::canvas::CanvasGeometry;
use crate::compositor::{EffectsCompositor, FrameInputs, OverlayData};
use crate::encode::{create_encoder, Encoder, EncoderSettings};
use crate::frame::BufferPool;
use crate::source::{FfmpegSource, MediaSource, SourceReader, TrimRange, WebcamTrack};

/// Progress never reaches this until the render loop is done.
pub const RENDER_PROGRESS_CAP: f64 = 0.89;
const AUDIO_PROGRESS: f64 = 0.9;
const FINALIZE_PROGRESS: f64 = 0.95;
/// Maximum rate of progress updates.
const PROGRESS_HZ: u32 = 10;

/// Where a job is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    #[default]
    Idle,
    Preparing,
    Rendering,
    EncodingAudio,
    Finalizing,
    Complete,
    Failed,
}

impl ExportPhase {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Rendering | Self::EncodingAudio | Self::Finalizing
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Rendering => "rendering",
            Self::EncodingAudio => "encoding audio",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Read-only status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExportStatus {
    pub phase: ExportPhase,
    /// Fraction complete in `[0, 1]`; never decreases within a job.
    pub progress: f64,
    pub error_message: Option<String>,
    pub frames_rendered: u64,
    pub total_frames: u64,
    pub eta_secs: f64,
}

/// Raw inputs of an export: media plus metadata logs.
#[derive(Clone)]
pub struct RawRecording {
    pub source: Arc<dyn MediaSource>,
    pub webcam: Option<Arc<dyn MediaSource>>,
    pub events: EventLogs,
    /// Size of the captured region the cursor log refers to.
    pub capture_width: u32,
    pub capture_height: u32,
}

impl RawRecording {
    /// File-backed recording from a loaded bundle.
    pub fn from_bundle(recording: &LoadedRecording) -> Self {
        Self {
            source: Arc::new(FfmpegSource::new(recording.screen_path())),
            webcam: recording
                .webcam_path()
                .map(|p| Arc::new(FfmpegSource::new(p)) as Arc<dyn MediaSource>),
            events: recording.events.clone(),
            capture_width: recording.manifest.capture_width,
            capture_height: recording.manifest.capture_height,
        }
    }
}

impl std::fmt::Debug for RawRecording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRecording")
            .field("has_webcam", &self.webcam.is_some())
            .field("cursor_events", &self.events.cursor.len())
            .field("capture_width", &self.capture_width)
            .field("capture_height", &self.capture_height)
            .finish()
    }
}

/// What to export and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    /// Style snapshot; later edits to the caller's copy do not affect the job.
    pub effects: EffectsConfiguration,
    pub settings: ExportSettings,
    pub destination: PathBuf,
}

/// Summary of a completed export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub frames_rendered: u64,
    pub frames_encoded: u64,
    /// Length of the exported media.
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExportReport {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// How a job ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(ExportReport),
    Cancelled,
}

/// Runs exports one at a time and publishes their status.
pub struct ExportOrchestrator {
    status: Arc<watch::Sender<ExportStatus>>,
    /// Cancel flag of the running job, if any. Each job gets a fresh flag.
    active: ActiveJob,
    pool: BufferPool,
}

impl Default for ExportOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

type ActiveJob = Arc<Mutex<Option<Arc<AtomicBool>>>>;

fn lock_active(active: &ActiveJob) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
    active.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases the job slot however the job ends.
struct BusyGuard(ActiveJob);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        lock_active(&self.0).take();
    }
}

impl ExportOrchestrator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ExportStatus::default());
        Self {
            status: Arc::new(tx),
            active: Arc::new(Mutex::new(None)),
            pool: BufferPool::default(),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> ExportStatus {
        self.status.borrow().clone()
    }

    /// Status stream.
    pub fn subscribe(&self) -> watch::Receiver<ExportStatus> {
        self.status.subscribe()
    }

    pub fn is_exporting(&self) -> bool {
        lock_active(&self.active).is_some()
    }

    /// Ask the running job to stop at the next frame boundary, or before
    /// its output is committed if rendering is already done.
    pub fn cancel(&self) {
        if let Some(flag) = lock_active(&self.active).as_ref() {
            tracing::info!("Export cancellation requested");
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Run `job` to completion.
    ///
    /// Fails with [`SheenError::AlreadyExporting`] if a job is running.
    /// Cancellation is reported as [`ExportOutcome::Cancelled`].
    pub async fn export(
        &self,
        recording: Arc<RawRecording>,
        job: ExportJob,
    ) -> SheenResult<ExportOutcome> {
        let cancel = {
            let mut active = lock_active(&self.active);
            if active.is_some() {
                return Err(SheenError::AlreadyExporting);
            }
            let flag = Arc::new(AtomicBool::new(false));
            *active = Some(Arc::clone(&flag));
            flag
        };
        let _busy = BusyGuard(Arc::clone(&self.active));
        self.status.send_replace(ExportStatus {
            phase: ExportPhase::Preparing,
            ..ExportStatus::default()
        });

        tracing::info!(
            destination = %job.destination.display(),
            format = ?job.settings.format,
            resolution = ?job.settings.resolution,
            fps = job.settings.frame_rate.as_u32(),
            "Starting export"
        );

        let run = JobRun {
            recording,
            job,
            status: Arc::clone(&self.status),
            cancel,
            pool: self.pool.clone(),
        };
        let result = tokio::task::spawn_blocking(move || run.execute())
            .await
            .unwrap_or_else(|e| {
                Err(SheenError::Other(anyhow::anyhow!(
                    "export worker panicked: {e}"
                )))
            });

        match &result {
            Ok(ExportOutcome::Completed(report)) => {
                self.status.send_modify(|s| {
                    s.phase = ExportPhase::Complete;
                    s.progress = 1.0;
                    s.eta_secs = 0.0;
                    s.error_message = None;
                });
                tracing::info!(
                    output = %report.output.display(),
                    frames = report.frames_rendered,
                    elapsed_secs = report.elapsed_secs(),
                    "Export complete"
                );
            }
            Ok(ExportOutcome::Cancelled) => {
                self.status.send_modify(|s| {
                    s.phase = ExportPhase::Idle;
                    s.eta_secs = 0.0;
                });
                tracing::info!("Export cancelled");
            }
            Err(e) => {
                self.status.send_modify(|s| {
                    s.phase = ExportPhase::Failed;
                    s.error_message = Some(e.to_string());
                    s.eta_secs = 0.0;
                });
                tracing::error!(error = %e, "Export failed");
            }
        }
        self.pool.clear();
        result
    }
}

/// Everything the blocking worker owns.
struct JobRun {
    recording: Arc<RawRecording>,
    job: ExportJob,
    status: Arc<watch::Sender<ExportStatus>>,
    cancel: Arc<AtomicBool>,
    pool: BufferPool,
}

/// Whether a loop ran to the end or stopped on request.
enum Flow {
    Done(u64),
    Cancelled,
}

impl JobRun {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ExportPhase, progress: f64) {
        self.status.send_modify(|s| {
            s.phase = phase;
            s.progress = s.progress.max(progress);
        });
    }

    fn execute(self) -> SheenResult<ExportOutcome> {
        let clock = JobClock::start();
        let effects = &self.job.effects;
        let settings = &self.job.settings;

        let info = self.recording.source.describe()?;
        let trim = TrimRange::resolve(
            settings.trim_in.or(effects.trim.in_secs),
            settings.trim_out.or(effects.trim.out_secs),
            info.duration_secs,
        )?;
        let geometry = CanvasGeometry::new(info.width, info.height, &effects.frame, settings.resolution)?;
        let fps = settings.frame_rate.as_u32() as f64;

        let (cap_w, cap_h) = match (self.recording.capture_width, self.recording.capture_height) {
            (w, h) if w > 0 && h > 0 => (w, h),
            _ => (info.width, info.height),
        };

        tracing::debug!(
            in_secs = trim.in_secs,
            out_secs = trim.out_secs,
            canvas_width = geometry.canvas_width,
            canvas_height = geometry.canvas_height,
            output_width = geometry.output_width,
            output_height = geometry.output_height,
            "Export prepared"
        );

        let mut reader = self.recording.source.open(trim, fps)?;
        let mut webcam = match (&self.recording.webcam, effects.webcam.enabled) {
            (Some(cam), true) => Some(WebcamTrack::new(cam.open(trim, fps)?, fps)),
            _ => None,
        };
        let overlays = OverlayData::prepare(&self.recording.events, effects, cap_w, cap_h);
        let mut compositor = EffectsCompositor::new(effects.clone(), geometry, overlays);

        let encoder_settings = EncoderSettings {
            width: geometry.output_width,
            height: geometry.output_height,
            frame_rate: settings.frame_rate,
            format: settings.format,
            quality: settings.quality,
            animated_image: settings.animated_image.clone(),
        };
        let mut encoder = create_encoder(&encoder_settings, &self.job.destination, self.pool.clone())?;

        let total = reader.estimated_sample_count();
        self.status.send_modify(|s| s.total_frames = total);

        let rendered = match self.render(
            &clock,
            trim,
            reader.as_mut(),
            webcam.as_mut(),
            &mut compositor,
            encoder.as_mut(),
            (cap_w, cap_h),
        ) {
            Ok(Flow::Done(n)) => n,
            Ok(Flow::Cancelled) => {
                encoder.abort();
                return Ok(ExportOutcome::Cancelled);
            }
            Err(e) => {
                encoder.abort();
                return Err(e);
            }
        };
        tracing::debug!(frames = rendered, cache = ?compositor.cache_stats(), "Render loop finished");

        if encoder.accepts_audio() {
            self.set_phase(ExportPhase::EncodingAudio, AUDIO_PROGRESS);
            match self.feed_audio(reader.as_mut(), encoder.as_mut()) {
                Ok(Flow::Done(_)) => {}
                Ok(Flow::Cancelled) => {
                    encoder.abort();
                    return Ok(ExportOutcome::Cancelled);
                }
                Err(e) => {
                    encoder.abort();
                    return Err(e);
                }
            }
        }
        drop(reader);

        if self.cancelled() {
            encoder.abort();
            return Ok(ExportOutcome::Cancelled);
        }
        self.set_phase(ExportPhase::Finalizing, FINALIZE_PROGRESS);
        let Some(summary) = encoder.finish(&self.cancel)? else {
            return Ok(ExportOutcome::Cancelled);
        };

        Ok(ExportOutcome::Completed(ExportReport {
            output: summary.output,
            frames_rendered: rendered,
            frames_encoded: summary.frames_encoded,
            duration_secs: rendered as f64 / fps,
            started_at: clock.started_at(),
            finished_at: Utc::now(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn render(
        &self,
        clock: &JobClock,
        trim: TrimRange,
        reader: &mut dyn SourceReader,
        mut webcam: Option<&mut WebcamTrack>,
        compositor: &mut EffectsCompositor,
        encoder: &mut dyn Encoder,
        (cap_w, cap_h): (u32, u32),
    ) -> SheenResult<Flow> {
        let zoom_config = &self.job.effects.zoom;
        let cursor = &self.recording.events.cursor;
        let (out_w, out_h) = {
            let g = compositor.geometry();
            (g.output_width, g.output_height)
        };
        let total = reader.estimated_sample_count().max(1);
        let mut gate = RateController::new(PROGRESS_HZ);
        let mut rendered = 0u64;

        self.set_phase(ExportPhase::Rendering, 0.0);
        loop {
            if self.cancelled() {
                tracing::debug!(frames = rendered, "Render loop cancelled");
                return Ok(Flow::Cancelled);
            }
            let Some(frame) = reader.next_video()? else {
                break;
            };

            // Overlay logs live on the untrimmed recording timeline.
            let t_ns = JobClock::secs_to_ns(trim.in_secs + frame.pts_secs);
            let zoom = ZoomTransformer::transform_at(t_ns, cursor, zoom_config, cap_w as f64, cap_h as f64);
            let camera = match webcam.as_deref_mut() {
                Some(track) => track.frame_at(frame.pts_secs)?,
                None => None,
            };

            let mut out = self.pool.acquire(out_w, out_h);
            compositor.compose(
                &FrameInputs {
                    frame: &frame.image,
                    time_ns: t_ns,
                    zoom,
                    webcam: camera,
                },
                &mut out,
            )?;
            encoder.push_frame(out, frame.pts_secs)?;
            rendered += 1;

            if gate.should_tick(clock.elapsed_ns()) {
                let fraction = (rendered as f64 / total as f64).min(1.0);
                let progress = (fraction * RENDER_PROGRESS_CAP).min(RENDER_PROGRESS_CAP);
                let eta = clock.eta_secs(fraction);
                self.status.send_modify(|s| {
                    s.progress = s.progress.max(progress);
                    s.frames_rendered = rendered;
                    s.eta_secs = eta;
                });
            }
        }

        self.status.send_modify(|s| {
            s.frames_rendered = rendered;
            s.progress = s.progress.max(RENDER_PROGRESS_CAP);
        });
        if rendered == 0 {
            return Err(SheenError::source_unavailable("source produced no frames in the trim window"));
        }
        Ok(Flow::Done(rendered))
    }

    fn feed_audio(&self, reader: &mut dyn SourceReader, encoder: &mut dyn Encoder) -> SheenResult<Flow> {
        let mut chunks = 0u64;
        while let Some(chunk) = reader.next_audio()? {
            if self.cancelled() {
                return Ok(Flow::Cancelled);
            }
            encoder.push_audio(&chunk)?;
            chunks += 1;
        }
        tracing::debug!(chunks, "Audio fed to encoder");
        Ok(Flow::Done(chunks))
    }
}

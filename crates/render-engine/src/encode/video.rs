//! H.264/ProRes encoding through an ffmpeg child fed raw RGBA on stdin.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use sheen_common::error::{SheenError, SheenResult};
use sheen_project_model::export::{ExportFormat, Quality};
use tempfile::NamedTempFile;

use super::{EncodeSummary, Encoder, EncoderSettings, FrameSink, FrameWorker, PartialFile};
use crate::ffmpeg::{is_ffmpeg_on_path, kill_and_reap, stderr_tail, StderrDrain};
use crate::frame::{byte_len, AudioChunk, BufferPool, RgbaFrame};

/// Muxed audio sample rate.
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

fn crf(quality: Quality) -> u8 {
    match quality {
        Quality::Low => 28,
        Quality::Medium => 23,
        Quality::High => 20,
        Quality::Maximum => 17,
    }
}

/// prores_ks profile: proxy, lt, standard, hq.
fn prores_profile(quality: Quality) -> u8 {
    match quality {
        Quality::Low => 0,
        Quality::Medium => 1,
        Quality::High => 2,
        Quality::Maximum => 3,
    }
}

fn audio_bitrate(quality: Quality) -> &'static str {
    match quality {
        Quality::Low => "96k",
        Quality::Medium => "128k",
        Quality::High => "192k",
        Quality::Maximum => "320k",
    }
}

fn container(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Archival => "mov",
        _ => "mp4",
    }
}

/// Video codec arguments for `format` at `quality`.
fn codec_args(format: ExportFormat, quality: Quality, fps: u32) -> Vec<String> {
    let mut args: Vec<String> = match format {
        ExportFormat::Archival => vec![
            "-c:v".into(),
            "prores_ks".into(),
            "-profile:v".into(),
            prores_profile(quality).to_string(),
            "-pix_fmt".into(),
            "yuv422p10le".into(),
            "-vendor".into(),
            "apl0".into(),
        ],
        _ => vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            crf(quality).to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
        ],
    };
    args.extend(["-g".to_string(), (fps * 2).to_string()]);
    args
}

struct StdinSink {
    stdin: BufWriter<ChildStdin>,
    frame_len: usize,
    written: u64,
}

impl FrameSink for StdinSink {
    fn write(&mut self, frame: &RgbaFrame, _pts_secs: f64) -> SheenResult<()> {
        if frame.data.len() != self.frame_len {
            return Err(SheenError::encoder_write(format!(
                "frame has {} bytes, expected {}",
                frame.data.len(),
                self.frame_len
            )));
        }
        self.stdin
            .write_all(&frame.data)
            .map_err(|e| SheenError::encoder_write(format!("failed to write frame to ffmpeg: {e}")))?;
        self.written += 1;
        Ok(())
    }
}

/// Audio samples spooled to disk until the video stream is sealed.
struct AudioSpool {
    file: BufWriter<NamedTempFile>,
    sample_rate: u32,
    channels: u16,
    frames: u64,
}

/// ffmpeg-backed encoder for the general (MP4) and archival (MOV) formats.
pub struct VideoEncoder {
    settings: EncoderSettings,
    child: Option<Child>,
    stderr: Option<StderrDrain>,
    worker: Option<FrameWorker<StdinSink>>,
    partial: Option<PartialFile>,
    audio: Option<AudioSpool>,
}

impl VideoEncoder {
    pub fn new(settings: &EncoderSettings, destination: &Path, pool: BufferPool) -> SheenResult<Self> {
        let (w, h) = (settings.width, settings.height);
        if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
            return Err(SheenError::encoder_setup(format!(
                "output size {w}x{h} must be non-zero and even"
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(SheenError::encoder_setup(
                "ffmpeg is required for video export, but was not found on PATH",
            ));
        }

        let partial = PartialFile::new(destination)?;
        let fps = settings.frame_rate.as_u32();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-nostdin", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-s")
            .arg(format!("{w}x{h}"))
            .arg("-r")
            .arg(fps.to_string())
            .args(["-i", "pipe:0", "-an"])
            .args(codec_args(settings.format, settings.quality, fps))
            .arg("-f")
            .arg(container(settings.format))
            .arg(partial.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(cmd = ?cmd, "Spawning ffmpeg encoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| SheenError::encoder_setup(format!("failed to start ffmpeg: {e}")))?;
        let (Some(stdin), Some(stderr)) = (child.stdin.take(), child.stderr.take()) else {
            kill_and_reap(&mut child);
            return Err(SheenError::encoder_setup("failed to open ffmpeg pipes"));
        };
        tracing::info!(
            pid = child.id(),
            format = ?settings.format,
            quality = ?settings.quality,
            width = w,
            height = h,
            fps,
            "ffmpeg encoder started"
        );

        let sink = StdinSink {
            stdin: BufWriter::with_capacity(byte_len(w, h), stdin),
            frame_len: byte_len(w, h),
            written: 0,
        };
        let worker = match FrameWorker::spawn("sheen-video-encoder", sink, pool) {
            Ok(worker) => worker,
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(e);
            }
        };

        Ok(Self {
            settings: settings.clone(),
            child: Some(child),
            stderr: Some(StderrDrain::spawn(stderr)),
            worker: Some(worker),
            partial: Some(partial),
            audio: None,
        })
    }

    /// ffmpeg's exit status after stdin closed.
    fn wait_encoder(&mut self) -> SheenResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| SheenError::encoder_write(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self.stderr.as_mut().map(StderrDrain::collect).unwrap_or_default();
        if !status.success() {
            return Err(SheenError::encoder_write(format!(
                "ffmpeg exited with {status}: {}",
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }

    /// Remux the sealed video with the spooled audio into a second partial file.
    fn mux_audio(&self, video: &PartialFile, spool: AudioSpool) -> SheenResult<PartialFile> {
        let spool_file = spool
            .file
            .into_inner()
            .map_err(|e| SheenError::encoder_write(format!("failed to flush audio spool: {e}")))?;

        let muxed = PartialFile::with_tag(video.destination(), "sheen-mux")?;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-nostdin", "-loglevel", "error", "-i"])
            .arg(video.path())
            .args(["-f", "f32le", "-ar"])
            .arg(spool.sample_rate.to_string())
            .arg("-ac")
            .arg(spool.channels.to_string())
            .arg("-i")
            .arg(spool_file.path())
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac"])
            .arg("-ar")
            .arg(AUDIO_SAMPLE_RATE.to_string())
            .arg("-b:a")
            .arg(audio_bitrate(self.settings.quality))
            .arg("-shortest");
        if self.settings.format == ExportFormat::General {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg("-f").arg(container(self.settings.format)).arg(muxed.path());

        tracing::debug!(cmd = ?cmd, audio_frames = spool.frames, "Muxing audio");
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SheenError::encoder_write(format!("failed to start ffmpeg mux: {e}")))?;
        if !output.status.success() {
            return Err(SheenError::encoder_write(format!(
                "audio mux failed ({}): {}",
                output.status,
                stderr_tail(&String::from_utf8_lossy(&output.stderr))
            )));
        }
        Ok(muxed)
    }
}

impl Encoder for VideoEncoder {
    fn accepts_audio(&self) -> bool {
        true
    }

    fn push_frame(&mut self, frame: RgbaFrame, pts_secs: f64) -> SheenResult<()> {
        let worker = self
            .worker
            .as_mut()
            .ok_or_else(|| SheenError::encoder_write("encoder is closed"))?;
        worker.send(frame, pts_secs)
    }

    fn push_audio(&mut self, chunk: &AudioChunk) -> SheenResult<()> {
        if chunk.samples.is_empty() {
            return Ok(());
        }
        if self.audio.is_none() {
            let file = NamedTempFile::new().map_err(|e| {
                SheenError::encoder_write(format!("failed to create audio spool: {e}"))
            })?;
            self.audio = Some(AudioSpool {
                file: BufWriter::new(file),
                sample_rate: chunk.sample_rate,
                channels: chunk.channels,
                frames: 0,
            });
        }
        let Some(spool) = self.audio.as_mut() else {
            return Ok(());
        };
        if chunk.sample_rate != spool.sample_rate || chunk.channels != spool.channels {
            return Err(SheenError::encoder_write(format!(
                "audio format changed mid-stream: {} Hz x{} -> {} Hz x{}",
                spool.sample_rate, spool.channels, chunk.sample_rate, chunk.channels
            )));
        }
        for sample in &chunk.samples {
            spool
                .file
                .write_all(&sample.to_le_bytes())
                .map_err(|e| SheenError::encoder_write(format!("failed to spool audio: {e}")))?;
        }
        spool.frames += chunk.frame_count() as u64;
        Ok(())
    }

    fn finish(mut self: Box<Self>, cancel: &AtomicBool) -> SheenResult<Option<EncodeSummary>> {
        let mut worker = self
            .worker
            .take()
            .ok_or_else(|| SheenError::encoder_write("encoder is closed"))?;
        let (sink, result) = worker.join()?;
        let StdinSink {
            mut stdin, written, ..
        } = sink;
        result?;
        stdin
            .flush()
            .map_err(|e| SheenError::encoder_write(format!("failed to flush ffmpeg stdin: {e}")))?;
        // Closing stdin lets ffmpeg write the trailer.
        drop(stdin);
        self.wait_encoder()?;

        let partial = self
            .partial
            .take()
            .ok_or_else(|| SheenError::encoder_write("encoder output already committed"))?;
        if cancel.load(Ordering::SeqCst) {
            tracing::info!("Video export cancelled before commit");
            return Ok(None);
        }
        let output = match self.audio.take() {
            Some(spool) if spool.frames > 0 => {
                let muxed = self.mux_audio(&partial, spool)?;
                drop(partial);
                if cancel.load(Ordering::SeqCst) {
                    tracing::info!("Video export cancelled before commit");
                    return Ok(None);
                }
                muxed.commit()?
            }
            _ => partial.commit()?,
        };

        tracing::info!(output = %output.display(), frames = written, "Video export sealed");
        Ok(Some(EncodeSummary {
            output,
            frames_encoded: written,
        }))
    }

    fn abort(mut self: Box<Self>) {
        if let Some(child) = self.child.as_mut() {
            kill_and_reap(child);
        }
        self.child = None;
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.join();
        }
        tracing::info!("Video export aborted");
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            kill_and_reap(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheen_project_model::export::{AnimatedImageSettings, FrameRate};

    fn settings(format: ExportFormat) -> EncoderSettings {
        EncoderSettings {
            width: 64,
            height: 48,
            frame_rate: FrameRate::Fps30,
            format,
            quality: Quality::High,
            animated_image: AnimatedImageSettings::default(),
        }
    }

    #[test]
    fn test_codec_args_by_format() {
        let general = codec_args(ExportFormat::General, Quality::High, 30);
        assert!(general.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(general.windows(2).any(|w| w == ["-crf", "20"]));
        assert!(general.windows(2).any(|w| w == ["-g", "60"]));

        let archival = codec_args(ExportFormat::Archival, Quality::Maximum, 24);
        assert!(archival.windows(2).any(|w| w == ["-c:v", "prores_ks"]));
        assert!(archival.windows(2).any(|w| w == ["-profile:v", "3"]));
        assert!(archival.windows(2).any(|w| w == ["-g", "48"]));
    }

    #[test]
    fn test_quality_ladders_are_monotonic() {
        let q = [Quality::Low, Quality::Medium, Quality::High, Quality::Maximum];
        assert!(q.windows(2).all(|w| crf(w[0]) > crf(w[1])));
        assert!(q.windows(2).all(|w| prores_profile(w[0]) < prores_profile(w[1])));
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(ExportFormat::General);
        s.width = 63;
        let err = VideoEncoder::new(&s, &dir.path().join("a.mp4"), BufferPool::default())
            .err()
            .unwrap();
        assert!(matches!(err, SheenError::EncoderSetupFailed { .. }));
    }

    #[test]
    fn test_encodes_mp4_with_audio() {
        if !is_ffmpeg_on_path() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        let mut enc: Box<dyn Encoder> =
            Box::new(VideoEncoder::new(&settings(ExportFormat::General), &dest, BufferPool::default()).unwrap());
        for i in 0..30u32 {
            let frame = RgbaFrame::filled(64, 48, [(i * 8) as u8, 40, 90, 255]);
            enc.push_frame(frame, i as f64 / 30.0).unwrap();
        }
        enc.push_audio(&AudioChunk {
            pts_secs: 0.0,
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0; 48_000 * 2],
        })
        .unwrap();
        let summary = enc.finish(&AtomicBool::new(false)).unwrap().unwrap();
        assert_eq!(summary.frames_encoded, 30);
        assert!(dest.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_abort_leaves_nothing() {
        if !is_ffmpeg_on_path() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mov");
        let mut enc: Box<dyn Encoder> =
            Box::new(VideoEncoder::new(&settings(ExportFormat::Archival), &dest, BufferPool::default()).unwrap());
        enc.push_frame(RgbaFrame::filled(64, 48, [0, 0, 0, 255]), 0.0).unwrap();
        enc.abort();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

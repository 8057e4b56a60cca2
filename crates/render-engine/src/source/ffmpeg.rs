//! File-backed source decoded by ffmpeg child processes.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use sheen_common::error::{SheenError, SheenResult};

use super::{estimated_sample_count, MediaInfo, MediaSource, SourceReader, TrimRange};
use crate::ffmpeg::{kill_and_reap, read_full, secs_arg, stderr_tail, StderrDrain};
use crate::frame::{byte_len, AudioChunk, RgbaFrame, VideoFrame};

/// Sample frames per audio chunk.
const AUDIO_CHUNK_FRAMES: usize = 4096;

/// A media file probed with ffprobe and decoded with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
}

impl FfmpegSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe(path: &Path, json: &[u8]) -> SheenResult<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json).map_err(|e| {
        SheenError::source_unavailable(format!("unreadable ffprobe output for {}: {e}", path.display()))
    })?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SheenError::NoVideoTrack {
            path: path.to_path_buf(),
        })?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(SheenError::source_unavailable(format!(
                "video stream in {} has no dimensions",
                path.display()
            )))
        }
    };

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| {
            let rate = s.sample_rate.as_deref()?.parse::<u32>().ok()?;
            Some((rate, s.channels.unwrap_or(2).max(1)))
        });

    let duration_secs = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            SheenError::source_unavailable(format!("{} has no known duration", path.display()))
        })?;

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
        audio,
    })
}

impl MediaSource for FfmpegSource {
    fn describe(&self) -> SheenResult<MediaInfo> {
        if !self.path.exists() {
            return Err(SheenError::source_unavailable(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "stream=codec_type,width,height,sample_rate,channels:format=duration",
                "-of",
                "json",
            ])
            .arg(&self.path)
            .output()
            .map_err(|e| SheenError::source_unavailable(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(SheenError::source_unavailable(format!(
                "ffprobe could not read {}: {}",
                self.path.display(),
                stderr_tail(&String::from_utf8_lossy(&output.stderr))
            )));
        }
        let info = parse_probe(&self.path, &output.stdout)?;
        tracing::debug!(
            path = %self.path.display(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            has_audio = info.has_audio(),
            "Probed source"
        );
        Ok(info)
    }

    fn open(&self, range: TrimRange, fps: f64) -> SheenResult<Box<dyn SourceReader>> {
        if fps <= 0.0 {
            return Err(SheenError::invalid_job(format!("frame rate {fps} must be positive")));
        }
        let info = self.describe()?;
        let video = DecoderProcess::spawn(
            &self.path,
            range,
            &[
                "-map".to_string(),
                "0:v:0".to_string(),
                "-f".to_string(),
                "rawvideo".to_string(),
                "-pix_fmt".to_string(),
                "rgba".to_string(),
                "-r".to_string(),
                format!("{fps}"),
            ],
        )?;
        Ok(Box::new(FfmpegReader {
            path: self.path.clone(),
            info,
            range,
            total: estimated_sample_count(range, fps),
            fps,
            video: Some(video),
            audio: None,
            audio_done: false,
            frames_read: 0,
            audio_frames_read: 0,
        }))
    }
}

/// One ffmpeg decode child writing raw samples to stdout.
struct DecoderProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: StderrDrain,
}

impl DecoderProcess {
    fn spawn(path: &Path, range: TrimRange, output_args: &[String]) -> SheenResult<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-nostdin", "-v", "error", "-ss"])
            .arg(secs_arg(range.in_secs))
            .arg("-t")
            .arg(secs_arg(range.duration_secs()))
            .arg("-i")
            .arg(path)
            .args(output_args)
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(cmd = ?cmd, "Spawning ffmpeg decoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| SheenError::source_unavailable(format!("failed to start ffmpeg: {e}")))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_and_reap(&mut child);
            return Err(SheenError::source_unavailable("failed to capture ffmpeg output"));
        };
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr: StderrDrain::spawn(stderr),
        })
    }

    /// Reap after EOF; a non-zero exit is a source failure.
    fn finish(mut self, path: &Path) -> SheenResult<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| SheenError::source_unavailable(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self.stderr.collect();
        if !status.success() {
            return Err(SheenError::source_unavailable(format!(
                "decoding {} failed ({status}): {}",
                path.display(),
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            kill_and_reap(&mut self.child);
        }
    }
}

struct FfmpegReader {
    path: PathBuf,
    info: MediaInfo,
    range: TrimRange,
    fps: f64,
    total: u64,
    video: Option<DecoderProcess>,
    audio: Option<DecoderProcess>,
    audio_done: bool,
    frames_read: u64,
    audio_frames_read: u64,
}

impl SourceReader for FfmpegReader {
    fn next_video(&mut self) -> SheenResult<Option<VideoFrame>> {
        // ffmpeg may round the trimmed duration up by a frame.
        if self.frames_read >= self.total {
            self.video = None;
            return Ok(None);
        }
        let Some(decoder) = self.video.as_mut() else {
            return Ok(None);
        };

        let (w, h) = (self.info.width, self.info.height);
        let mut data = vec![0u8; byte_len(w, h)];
        let n = read_full(&mut decoder.stdout, &mut data)
            .map_err(|e| SheenError::source_unavailable(format!("reading decoded video: {e}")))?;

        if n == 0 {
            if let Some(decoder) = self.video.take() {
                decoder.finish(&self.path)?;
            }
            tracing::debug!(frames = self.frames_read, "Video decoder reached end of stream");
            return Ok(None);
        }
        if n < data.len() {
            self.video = None;
            return Err(SheenError::source_unavailable(format!(
                "truncated frame {} from {} ({n} of {} bytes)",
                self.frames_read,
                self.path.display(),
                data.len()
            )));
        }

        let pts_secs = self.frames_read as f64 / self.fps;
        self.frames_read += 1;
        Ok(Some(VideoFrame {
            pts_secs,
            image: RgbaFrame::from_raw(w, h, data)?,
        }))
    }

    fn next_audio(&mut self) -> SheenResult<Option<AudioChunk>> {
        let Some((sample_rate, channels)) = self.info.audio else {
            return Ok(None);
        };
        if self.audio_done {
            return Ok(None);
        }
        if self.audio.is_none() {
            self.audio = Some(DecoderProcess::spawn(
                &self.path,
                self.range,
                &[
                    "-map".to_string(),
                    "0:a:0".to_string(),
                    "-f".to_string(),
                    "f32le".to_string(),
                    "-ac".to_string(),
                    channels.to_string(),
                    "-ar".to_string(),
                    sample_rate.to_string(),
                ],
            )?);
        }
        let Some(decoder) = self.audio.as_mut() else {
            return Ok(None);
        };

        let frame_bytes = channels as usize * 4;
        let mut bytes = vec![0u8; AUDIO_CHUNK_FRAMES * frame_bytes];
        let n = read_full(&mut decoder.stdout, &mut bytes)
            .map_err(|e| SheenError::source_unavailable(format!("reading decoded audio: {e}")))?;
        let whole = n - n % frame_bytes;
        if whole == 0 {
            self.audio_done = true;
            if let Some(decoder) = self.audio.take() {
                decoder.finish(&self.path)?;
            }
            return Ok(None);
        }

        let samples: Vec<f32> = bytes[..whole]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let chunk = AudioChunk {
            pts_secs: self.audio_frames_read as f64 / sample_rate as f64,
            sample_rate,
            channels,
            samples,
        };
        self.audio_frames_read += chunk.frame_count() as u64;
        Ok(Some(chunk))
    }

    fn estimated_sample_count(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::is_ffmpeg_on_path;

    #[test]
    fn test_parse_probe_reads_streams() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080},
                {"codec_type": "audio", "sample_rate": "48000", "channels": 2}
            ],
            "format": {"duration": "10.000000"}
        }"#;
        let info = parse_probe(Path::new("a.mp4"), json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.audio, Some((48000, 2)));
        assert_eq!(info.duration_secs, 10.0);
    }

    #[test]
    fn test_parse_probe_without_video() {
        let json = br#"{"streams": [{"codec_type": "audio", "sample_rate": "44100"}], "format": {"duration": "3"}}"#;
        let err = parse_probe(Path::new("a.m4a"), json).unwrap_err();
        assert!(matches!(err, SheenError::NoVideoTrack { .. }));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let source = FfmpegSource::new("/definitely/not/here.mp4");
        let err = source.describe().unwrap_err();
        assert!(err.is_source_error());
    }

    #[test]
    fn test_decodes_generated_clip() {
        if !is_ffmpeg_on_path() || !crate::ffmpeg::is_ffprobe_on_path() {
            eprintln!("skipping: ffmpeg/ffprobe not on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let status = Command::new("ffmpeg")
            .args(["-v", "error", "-f", "lavfi", "-i", "testsrc=size=64x48:rate=10:duration=2"])
            .args(["-pix_fmt", "yuv420p", "-y"])
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());

        let source = FfmpegSource::new(&path);
        let info = source.describe().unwrap();
        assert_eq!((info.width, info.height), (64, 48));

        let range = TrimRange::resolve(Some(0.5), Some(1.5), info.duration_secs).unwrap();
        let mut reader = source.open(range, 10.0).unwrap();
        let mut count = 0;
        while let Some(frame) = reader.next_video().unwrap() {
            assert_eq!(frame.image.width, 64);
            count += 1;
        }
        assert!((9..=10).contains(&count), "got {count} frames");
        assert!(reader.next_audio().unwrap().is_none());
    }
}

//! Animated GIF output with per-frame palette quantization.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use color_quant::NeuQuant;
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, RgbaImage};
use sheen_common::error::{SheenError, SheenResult};

use super::{EncodeSummary, Encoder, EncoderSettings, FrameSink, FrameWorker, PartialFile};
use crate::frame::{AudioChunk, BufferPool, RgbaFrame};

/// NeuQuant sampling factor: 1 is slowest and best, 30 fastest.
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;
const GRID_EPSILON: f64 = 1e-6;
const GIF_TRAILER: u8 = 0x3B;

/// Picks frames on a fixed time grid so the output runs at `fps` no matter
/// how fast frames arrive.
#[derive(Debug, Clone)]
pub(crate) struct GridDecimator {
    interval: f64,
    next_slot: u64,
}

impl GridDecimator {
    pub(crate) fn new(fps: f64) -> Self {
        Self {
            interval: 1.0 / fps.max(1e-3),
            next_slot: 0,
        }
    }

    fn due(&self) -> f64 {
        self.next_slot as f64 * self.interval
    }

    /// Whether the frame at `pts` should be emitted.
    pub(crate) fn admit(&mut self, pts: f64) -> bool {
        if pts < self.due() - GRID_EPSILON {
            return false;
        }
        while self.due() <= pts + GRID_EPSILON {
            self.next_slot += 1;
        }
        true
    }
}

/// Output size after limiting the longer edge to `max_dimension`.
pub(crate) fn fit_dimensions(width: u32, height: u32, max_dimension: Option<u32>) -> (u32, u32) {
    let Some(max) = max_dimension.filter(|m| *m > 0) else {
        return (width, height);
    };
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let scale = max as f64 / longest as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Reduce `image` to at most `max_colors` opaque colors in place.
pub(crate) fn quantize(image: &mut RgbaImage, max_colors: usize) {
    let nq = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, max_colors, image.as_raw());
    let palette: Vec<[u8; 4]> = nq
        .color_map_rgba()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], 255])
        .collect();
    for px in image.pixels_mut() {
        let idx = nq.index_of(&px.0);
        px.0 = palette[idx];
    }
}

struct GifSink {
    encoder: GifEncoder<BufWriter<File>>,
    decimator: GridDecimator,
    frame_interval: f64,
    size: (u32, u32),
    max_colors: usize,
    /// Last admitted frame; its delay is known once the next one arrives.
    pending: Option<(RgbaImage, f64)>,
    /// Presentation time already covered by emitted frames, in centiseconds.
    emitted_cs: Option<u64>,
    written: u64,
}

impl GifSink {
    /// Write `image` so that it stays on screen until `end_secs`.
    ///
    /// GIF delays are whole centiseconds; rounding against the running total
    /// keeps the clip length exact instead of accumulating error.
    fn emit(&mut self, image: RgbaImage, start_secs: f64, end_secs: f64) -> SheenResult<()> {
        let shown = *self
            .emitted_cs
            .get_or_insert((start_secs * 100.0).round().max(0.0) as u64);
        let end_cs = (end_secs * 100.0).round().max(0.0) as u64;
        let delay_cs = end_cs.saturating_sub(shown).max(1);
        self.emitted_cs = Some(shown + delay_cs);
        let frame = Frame::from_parts(
            image,
            0,
            0,
            Delay::from_numer_denom_ms(delay_cs as u32 * 10, 1),
        );
        self.encoder
            .encode_frame(frame)
            .map_err(|e| SheenError::encoder_write(format!("failed to write GIF frame: {e}")))?;
        self.written += 1;
        Ok(())
    }

    fn prepare(&self, frame: &RgbaFrame) -> SheenResult<RgbaImage> {
        let raw = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| SheenError::encoder_write("frame buffer does not match its size"))?;
        let mut image = if (frame.width, frame.height) == self.size {
            raw
        } else {
            imageops::resize(&raw, self.size.0, self.size.1, FilterType::Triangle)
        };
        quantize(&mut image, self.max_colors);
        Ok(image)
    }

    /// Emit the held frame with a nominal one-interval delay.
    fn flush_pending(&mut self) -> SheenResult<()> {
        if let Some((image, pts)) = self.pending.take() {
            self.emit(image, pts, pts + self.frame_interval)?;
        }
        Ok(())
    }
}

impl FrameSink for GifSink {
    fn write(&mut self, frame: &RgbaFrame, pts_secs: f64) -> SheenResult<()> {
        if !self.decimator.admit(pts_secs) {
            return Ok(());
        }
        let image = self.prepare(frame)?;
        if let Some((prev, prev_pts)) = self.pending.replace((image, pts_secs)) {
            self.emit(prev, prev_pts, pts_secs)?;
        }
        Ok(())
    }
}

/// GIF encoder: decimates, downscales and quantizes on a worker thread.
pub struct PaletteEncoder {
    worker: Option<FrameWorker<GifSink>>,
    partial: Option<PartialFile>,
}

impl PaletteEncoder {
    pub fn new(settings: &EncoderSettings, destination: &Path, pool: BufferPool) -> SheenResult<Self> {
        let opts = &settings.animated_image;
        if settings.width == 0 || settings.height == 0 {
            return Err(SheenError::encoder_setup("output size must be non-zero"));
        }
        if opts.target_fps == 0 {
            return Err(SheenError::encoder_setup("animated image frame rate must be positive"));
        }
        let size = fit_dimensions(settings.width, settings.height, opts.max_dimension);
        if size.0 > u16::MAX as u32 || size.1 > u16::MAX as u32 {
            return Err(SheenError::encoder_setup(format!(
                "{}x{} exceeds the GIF size limit",
                size.0, size.1
            )));
        }

        let partial = PartialFile::new(destination)?;
        let file = File::create(partial.path())
            .map_err(|e| SheenError::encoder_setup(format!("cannot create {}: {e}", partial.path().display())))?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        let repeat = match opts.loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| SheenError::encoder_setup(format!("failed to set GIF loop count: {e}")))?;

        let max_colors = opts.max_colors.clamp(2, 256) as usize;
        tracing::info!(
            width = size.0,
            height = size.1,
            fps = opts.target_fps,
            max_colors,
            loop_count = opts.loop_count,
            "GIF encoder started"
        );

        let sink = GifSink {
            encoder,
            decimator: GridDecimator::new(opts.target_fps as f64),
            frame_interval: 1.0 / opts.target_fps as f64,
            size,
            max_colors,
            pending: None,
            emitted_cs: None,
            written: 0,
        };
        Ok(Self {
            worker: Some(FrameWorker::spawn("sheen-gif-encoder", sink, pool)?),
            partial: Some(partial),
        })
    }
}

/// Whether the file ends with the GIF trailer byte.
fn is_sealed(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == GIF_TRAILER)
}

impl Encoder for PaletteEncoder {
    fn accepts_audio(&self) -> bool {
        false
    }

    fn push_frame(&mut self, frame: RgbaFrame, pts_secs: f64) -> SheenResult<()> {
        let worker = self
            .worker
            .as_mut()
            .ok_or_else(|| SheenError::encoder_write("encoder is closed"))?;
        worker.send(frame, pts_secs)
    }

    fn push_audio(&mut self, _chunk: &AudioChunk) -> SheenResult<()> {
        Ok(())
    }

    fn finish(mut self: Box<Self>, cancel: &AtomicBool) -> SheenResult<Option<EncodeSummary>> {
        let mut worker = self
            .worker
            .take()
            .ok_or_else(|| SheenError::encoder_write("encoder is closed"))?;
        let (mut sink, result) = worker.join()?;
        result?;
        sink.flush_pending()?;
        let frames = sink.written;
        // Dropping the encoder writes the trailer and flushes the file.
        drop(sink);

        let partial = self
            .partial
            .take()
            .ok_or_else(|| SheenError::encoder_write("encoder output already committed"))?;
        if frames == 0 {
            return Err(SheenError::encoder_write("no frames were encoded"));
        }
        match is_sealed(partial.path()) {
            Ok(true) => {}
            Ok(false) => return Err(SheenError::encoder_write("GIF container was not sealed")),
            Err(e) => return Err(SheenError::encoder_write(format!("cannot verify GIF output: {e}"))),
        }
        if cancel.load(Ordering::SeqCst) {
            tracing::info!("GIF export cancelled before commit");
            return Ok(None);
        }
        let output = partial.commit()?;
        tracing::info!(output = %output.display(), frames, "GIF export sealed");
        Ok(Some(EncodeSummary {
            output,
            frames_encoded: frames,
        }))
    }

    fn abort(mut self: Box<Self>) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.partial = None;
        tracing::info!("GIF export aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::AnimationDecoder;
    use sheen_project_model::export::{AnimatedImageSettings, ExportFormat, FrameRate, Quality};

    fn settings(target_fps: u32, max_colors: u16, max_dimension: Option<u32>) -> EncoderSettings {
        EncoderSettings {
            width: 96,
            height: 64,
            frame_rate: FrameRate::Fps30,
            format: ExportFormat::AnimatedImage,
            quality: Quality::Medium,
            animated_image: AnimatedImageSettings {
                target_fps,
                max_colors,
                loop_count: 0,
                max_dimension,
            },
        }
    }

    fn gradient(w: u32, h: u32, shift: u32) -> RgbaFrame {
        let mut frame = RgbaFrame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                frame.put_pixel(x, y, [((x * 3 + shift) % 256) as u8, (y * 4 % 256) as u8, ((x + y) % 256) as u8, 255]);
            }
        }
        frame
    }

    #[test]
    fn test_decimator_grid() {
        let mut d = GridDecimator::new(15.0);
        let admitted = (0..180).filter(|i| d.admit(*i as f64 / 30.0)).count();
        assert_eq!(admitted, 90);

        // Slower input than target emits every frame.
        let mut d = GridDecimator::new(15.0);
        assert_eq!((0..10).filter(|i| d.admit(*i as f64 / 10.0)).count(), 10);
    }

    #[test]
    fn test_fit_dimensions() {
        assert_eq!(fit_dimensions(1920, 1080, Some(960)), (960, 540));
        assert_eq!(fit_dimensions(640, 480, Some(960)), (640, 480));
        assert_eq!(fit_dimensions(640, 480, None), (640, 480));
    }

    #[test]
    fn test_quantize_bounds_colors() {
        let frame = gradient(96, 64, 0);
        let mut image = RgbaImage::from_raw(96, 64, frame.data).unwrap();
        quantize(&mut image, 16);
        let distinct: std::collections::HashSet<_> = image.pixels().map(|p| p.0).collect();
        assert!(distinct.len() <= 16);
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_gif_frame_count_and_palette() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.gif");
        let mut enc: Box<dyn Encoder> =
            Box::new(PaletteEncoder::new(&settings(15, 32, Some(48)), &dest, BufferPool::default()).unwrap());
        assert!(!enc.accepts_audio());
        for i in 0..60u32 {
            enc.push_frame(gradient(96, 64, i), i as f64 / 30.0).unwrap();
        }
        let summary = enc.finish(&AtomicBool::new(false)).unwrap().unwrap();
        assert_eq!(summary.frames_encoded, 30);

        let file = std::io::BufReader::new(File::open(&dest).unwrap());
        let frames = image::codecs::gif::GifDecoder::new(file)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 30);
        let total_ms: u32 = frames
            .iter()
            .map(|f| {
                let (n, d) = f.delay().numer_denom_ms();
                n / d
            })
            .sum();
        assert_eq!(total_ms, 2000);
        for frame in &frames {
            assert_eq!(frame.buffer().dimensions(), (48, 32));
            let distinct: std::collections::HashSet<_> = frame.buffer().pixels().map(|p| p.0).collect();
            assert!(distinct.len() <= 32);
        }
    }

    #[test]
    fn test_cancel_during_finish_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.gif");
        let mut enc: Box<dyn Encoder> =
            Box::new(PaletteEncoder::new(&settings(10, 64, None), &dest, BufferPool::default()).unwrap());
        for i in 0..10u32 {
            enc.push_frame(gradient(96, 64, i), i as f64 / 10.0).unwrap();
        }
        let summary = enc.finish(&AtomicBool::new(true)).unwrap();
        assert!(summary.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_abort_deletes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.gif");
        let mut enc: Box<dyn Encoder> =
            Box::new(PaletteEncoder::new(&settings(10, 64, None), &dest, BufferPool::default()).unwrap());
        enc.push_frame(gradient(96, 64, 0), 0.0).unwrap();
        enc.abort();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

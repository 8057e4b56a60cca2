//! Sheen Render Engine
//!
//! Offline pipeline that turns a raw recording plus an effects snapshot
//! into a finished video or animated image.
//!
//! # Pipeline Architecture
//!
//! ```text
//! screen media ──► SourceReader ──► EffectsCompositor ──► Encoder ──► output
//!                     (trim, cfr)        │    ▲             (mp4 / mov / gif)
//! webcam media ──► WebcamTrack ──────────┘    │
//! cursor / keys / captions ──► OverlayData ───┤
//! clicks ──► ZoomTransformer ─────────────────┘
//! ```
//!
//! [`ExportOrchestrator`] drives the loop on a blocking worker, publishes
//! progress and handles cancellation.

pub mod canvas;
pub mod compositor;
pub mod encode;
pub mod export;
pub mod ffmpeg;
pub mod frame;
pub mod raster;
pub mod source;

pub use canvas::CanvasGeometry;
pub use compositor::{EffectStage, EffectsCompositor, FrameInputs, OverlayData};
pub use encode::{create_encoder, EncodeSummary, Encoder, EncoderSettings};
pub use export::*;
pub use frame::{AudioChunk, BufferPool, RgbaFrame, VideoFrame};
pub use source::{FfmpegSource, MediaInfo, MediaSource, MemorySource, SourceReader, TrimRange, WebcamTrack};

//! Sheen Project Model
//!
//! Defines the data contracts shared by the render pipeline:
//! - **Events:** Timestamped cursor, keystroke, and caption records
//! - **Effects:** The style snapshot the compositor renders with
//! - **Export:** Job settings (format, quality, resolution, cadence, trim)
//! - **Recording:** The read-only bundle produced by a capture session
//!
//! Cursor coordinates stay in capture pixels (origin bottom-left); render
//! code converts them to canvas space at draw time.

pub mod effects;
pub mod event;
pub mod export;
pub mod geometry;
pub mod recording;

pub use effects::*;
pub use event::*;
pub use export::*;
pub use geometry::*;
pub use recording::*;

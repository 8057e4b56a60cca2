//! Sheen Processing Core
//!
//! Time-based decisions the renderer needs for each frame:
//! - **Zoom:** Click-driven camera scale/offset
//! - **Cursor Smoothing:** Motion smoothing and nearest-sample lookup
//! - **Keystrokes:** Modifier folding and visible badge selection
//! - **Captions:** Active transcript segment lookup
//!
//! This crate is pure computation: no I/O, no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod captions;
pub mod cursor_smooth;
pub mod keystrokes;
pub mod zoom;

pub use captions::active_caption;
pub use cursor_smooth::{CursorSmoother, SmoothingAlgorithm};
pub use keystrokes::{fold_key_presses, visible_badges, KeyPress, KeystrokeBadge};
pub use zoom::{ZoomTiming, ZoomTransform, ZoomTransformer};

//! Click-driven zoom.
//!
//! Each primary or secondary click starts a zoom animation centred on the
//! click position: ease in, hold, ease out. The transform is a pure function
//! of time, so any frame can be rendered independently.
//!
//! # Coordinate model
//!
//! The transform scales the frame about its centre and then translates it.
//! With `offset = -(n - 0.5) * dim * (scale - 1)` the clicked point stays
//! fixed on screen while everything around it grows, and for `n` in `[0, 1]`
//! the scaled frame always covers the whole viewport.

use sheen_project_model::effects::{ZoomConfig, ZoomStyle};
use sheen_project_model::event::{CursorEvent, TimestampNs};

/// Zoom-in leg duration at speed multiplier 1.0.
pub const BASE_ZOOM_IN_SECS: f64 = 0.4;
/// Hold duration at speed multiplier 1.0.
pub const BASE_HOLD_SECS: f64 = 1.2;
/// Zoom-out leg duration at speed multiplier 1.0.
pub const BASE_ZOOM_OUT_SECS: f64 = 0.6;

/// Camera transform for one frame, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub active: bool,
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        active: false,
    };

    pub fn is_identity(&self) -> bool {
        !self.active || ((self.scale - 1.0).abs() < 1e-12 && self.offset_x == 0.0 && self.offset_y == 0.0)
    }

    /// Map a render-space frame point to where it appears after zooming.
    pub fn apply(&self, x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
        let cx = width / 2.0;
        let cy = height / 2.0;
        (
            cx + (x - cx) * self.scale + self.offset_x,
            cy + (y - cy) * self.scale + self.offset_y,
        )
    }

    /// Inverse of [`apply`](Self::apply): which frame point lands at `(x, y)`.
    pub fn invert(&self, x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
        let cx = width / 2.0;
        let cy = height / 2.0;
        let s = self.scale.max(1e-9);
        (
            cx + (x - cx - self.offset_x) / s,
            cy + (y - cy - self.offset_y) / s,
        )
    }
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Durations of the three animation legs for a style, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTiming {
    pub zoom_in: f64,
    pub hold: f64,
    pub zoom_out: f64,
}

impl ZoomTiming {
    pub fn for_style(style: ZoomStyle) -> Self {
        let m = style.speed_multiplier();
        Self {
            zoom_in: BASE_ZOOM_IN_SECS / m,
            hold: BASE_HOLD_SECS / m,
            zoom_out: BASE_ZOOM_OUT_SECS / m,
        }
    }

    pub fn total(&self) -> f64 {
        self.zoom_in + self.hold + self.zoom_out
    }

    /// Eased zoom progress `age` seconds after a click.
    ///
    /// 0 before the click and after the window, 1 during the hold.
    pub fn progress(&self, age: f64) -> f64 {
        if !(0.0..=self.total()).contains(&age) {
            return 0.0;
        }
        if age < self.zoom_in {
            ease_in_out_cubic(age / self.zoom_in)
        } else if age <= self.zoom_in + self.hold {
            1.0
        } else {
            let out = (age - self.zoom_in - self.hold) / self.zoom_out;
            1.0 - ease_in_out_cubic(out)
        }
    }
}

/// Stateless zoom calculator.
pub struct ZoomTransformer;

impl ZoomTransformer {
    /// Compute the transform at `t_ns` on the recording timeline.
    ///
    /// `events` must be sorted by time; only click-downs are considered.
    /// `width`/`height` are the capture dimensions the cursor coordinates are
    /// expressed in, and also the frame size the offsets apply to.
    pub fn transform_at(
        t_ns: TimestampNs,
        events: &[CursorEvent],
        config: &ZoomConfig,
        width: f64,
        height: f64,
    ) -> ZoomTransform {
        if !config.enabled || config.max_scale <= 1.0 || width <= 0.0 || height <= 0.0 {
            return ZoomTransform::IDENTITY;
        }

        let timing = ZoomTiming::for_style(config.style);
        let Some(click) = Self::active_click(t_ns, events, &timing) else {
            return ZoomTransform::IDENTITY;
        };

        let age = (t_ns - click.timestamp_ns) as f64 / 1_000_000_000.0;
        let progress = timing.progress(age);
        let scale = 1.0 + (config.max_scale - 1.0) * progress;

        let nx = (click.x / width).clamp(0.0, 1.0);
        // Capture space is y-up; render space is y-down.
        let ny = (1.0 - click.y / height).clamp(0.0, 1.0);

        ZoomTransform {
            scale,
            offset_x: -(nx - 0.5) * width * (scale - 1.0),
            offset_y: -(ny - 0.5) * height * (scale - 1.0),
            active: true,
        }
    }

    /// Most recent click-down whose animation window still covers `t_ns`.
    fn active_click<'a>(
        t_ns: TimestampNs,
        events: &'a [CursorEvent],
        timing: &ZoomTiming,
    ) -> Option<&'a CursorEvent> {
        let window_ns = (timing.total() * 1_000_000_000.0) as u64;
        let end = events.partition_point(|e| e.timestamp_ns <= t_ns);
        events[..end]
            .iter()
            .rev()
            .take_while(|e| t_ns - e.timestamp_ns <= window_ns)
            .find(|e| e.kind.is_click())
    }
}

/// Cubic ease-in-out on `[0, 1]`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sheen_project_model::event::CursorEventKind;

    const SEC: u64 = 1_000_000_000;

    fn click(t: u64, x: f64, y: f64) -> CursorEvent {
        CursorEvent::new(t, x, y, CursorEventKind::LeftDown)
    }

    fn config(style: ZoomStyle) -> ZoomConfig {
        ZoomConfig {
            enabled: true,
            max_scale: 2.0,
            style,
        }
    }

    #[test]
    fn test_identity_without_clicks() {
        let events = vec![CursorEvent::moved(0, 10.0, 10.0)];
        let z = ZoomTransformer::transform_at(SEC, &events, &config(ZoomStyle::Quick), 100.0, 100.0);
        assert_eq!(z, ZoomTransform::IDENTITY);
    }

    #[test]
    fn test_identity_when_disabled() {
        let events = vec![click(0, 50.0, 50.0)];
        let mut cfg = config(ZoomStyle::Quick);
        cfg.enabled = false;
        let z = ZoomTransformer::transform_at(SEC / 2, &events, &cfg, 100.0, 100.0);
        assert_eq!(z, ZoomTransform::IDENTITY);
    }

    #[test]
    fn test_hold_reaches_max_scale() {
        let events = vec![click(SEC, 25.0, 75.0)];
        let z = ZoomTransformer::transform_at(SEC + SEC, &events, &config(ZoomStyle::Quick), 100.0, 100.0);
        assert!(z.active);
        assert!((z.scale - 2.0).abs() < 1e-9);
        // Click at capture (25, 75) is render (25, 25): offsets push toward the top-left.
        assert!((z.offset_x - 25.0).abs() < 1e-9);
        assert!((z.offset_y - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_point_stays_fixed() {
        let events = vec![click(0, 30.0, 60.0)];
        let z = ZoomTransformer::transform_at(SEC, &events, &config(ZoomStyle::Quick), 200.0, 100.0);
        let (x, y) = z.apply(30.0, 40.0, 200.0, 100.0);
        assert!((x - 30.0).abs() < 1e-9);
        assert!((y - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_expires() {
        let events = vec![click(0, 50.0, 50.0)];
        let cfg = config(ZoomStyle::Quick);
        let total = ZoomTiming::for_style(ZoomStyle::Quick).total();
        let after = ((total + 0.01) * SEC as f64) as u64;
        assert_eq!(
            ZoomTransformer::transform_at(after, &events, &cfg, 100.0, 100.0),
            ZoomTransform::IDENTITY
        );
    }

    #[test]
    fn test_future_click_ignored() {
        let events = vec![click(5 * SEC, 50.0, 50.0)];
        let z = ZoomTransformer::transform_at(SEC, &events, &config(ZoomStyle::Quick), 100.0, 100.0);
        assert_eq!(z, ZoomTransform::IDENTITY);
    }

    #[test]
    fn test_endpoint_scales_for_every_style() {
        for style in ZoomStyle::ALL {
            let timing = ZoomTiming::for_style(style);
            assert_eq!(timing.progress(0.0), 0.0);
            assert_eq!(timing.progress(timing.zoom_in), 1.0);
            assert!(timing.progress(timing.total()).abs() < 1e-12);

            let events = vec![click(0, 50.0, 50.0)];
            let z0 = ZoomTransformer::transform_at(0, &events, &config(style), 100.0, 100.0);
            assert!((z0.scale - 1.0).abs() < 1e-12);
            let peak_ns = (timing.zoom_in * SEC as f64).ceil() as u64;
            let z1 = ZoomTransformer::transform_at(peak_ns, &events, &config(style), 100.0, 100.0);
            assert!((z1.scale - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_slower_styles_last_longer() {
        let mut prev = f64::INFINITY;
        for style in ZoomStyle::ALL {
            let total = ZoomTiming::for_style(style).total();
            assert!(total < prev);
            prev = total;
        }
    }

    #[test]
    fn test_invert_roundtrip() {
        let z = ZoomTransform {
            scale: 1.5,
            offset_x: -12.0,
            offset_y: 7.0,
            active: true,
        };
        let (x, y) = z.apply(33.0, 44.0, 120.0, 80.0);
        let (bx, by) = z.invert(x, y, 120.0, 80.0);
        assert!((bx - 33.0).abs() < 1e-9);
        assert!((by - 44.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_scale_within_bounds(
            t in 0u64..10 * SEC,
            click_t in 0u64..10 * SEC,
            x in 0.0f64..1920.0,
            y in 0.0f64..1080.0,
            max_scale in 1.0f64..4.0,
        ) {
            let events = vec![click(click_t, x, y)];
            let cfg = ZoomConfig { enabled: true, max_scale, style: ZoomStyle::Mellow };
            let z = ZoomTransformer::transform_at(t, &events, &cfg, 1920.0, 1080.0);
            prop_assert!(z.scale >= 1.0 - 1e-12);
            prop_assert!(z.scale <= max_scale + 1e-9);
        }

        #[test]
        fn prop_zoomed_frame_covers_viewport(
            t in 0u64..3 * SEC,
            x in -100.0f64..2000.0,
            y in -100.0f64..1200.0,
        ) {
            let events = vec![click(0, x, y)];
            let z = ZoomTransformer::transform_at(t, &events, &config(ZoomStyle::Rapid), 1920.0, 1080.0);
            let (left, top) = z.apply(0.0, 0.0, 1920.0, 1080.0);
            let (right, bottom) = z.apply(1920.0, 1080.0, 1920.0, 1080.0);
            prop_assert!(left <= 1e-6 && top <= 1e-6);
            prop_assert!(right >= 1920.0 - 1e-6 && bottom >= 1080.0 - 1e-6);
        }
    }
}

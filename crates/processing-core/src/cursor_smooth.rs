//! Cursor motion smoothing and lookup.
//!
//! Smoothing rewrites positions only; timestamps and event kinds are kept so
//! the smoothed log can still drive click ripples and zoom.

use sheen_project_model::effects::{CursorConfig, CursorSmoothing};
use sheen_project_model::event::{CursorEvent, TimestampNs};
use sheen_project_model::geometry::Point2D;

/// Cursor smoothing engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSmoother {
    algorithm: SmoothingAlgorithm,
}

/// Available smoothing algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingAlgorithm {
    /// Exponential Moving Average with configurable strength.
    ///
    /// `strength` is in [0.0, 1.0], where larger values mean more smoothing.
    Ema { strength: f64 },

    /// 1D Kalman filter per axis.
    ///
    /// `strength` is in [0.0, 1.0], where larger values mean more smoothing.
    Kalman { strength: f64 },

    /// Centered moving average over a window of N samples.
    MovingAverage { window: usize },

    /// Pass raw samples through.
    None,
}

impl CursorSmoother {
    pub fn new(algorithm: SmoothingAlgorithm) -> Self {
        Self { algorithm }
    }

    /// EMA with strength 0.3.
    pub fn default_ema() -> Self {
        Self::new(SmoothingAlgorithm::Ema { strength: 0.3 })
    }

    /// Build a smoother from the cursor style.
    pub fn from_config(config: &CursorConfig) -> Self {
        let strength = clamp01(config.smoothing_strength);
        let algorithm = match config.smoothing {
            CursorSmoothing::Ema => SmoothingAlgorithm::Ema { strength },
            CursorSmoothing::Kalman => SmoothingAlgorithm::Kalman { strength },
            CursorSmoothing::MovingAverage => SmoothingAlgorithm::MovingAverage {
                window: 1 + 2 * (strength * 6.0).round() as usize,
            },
            CursorSmoothing::None => SmoothingAlgorithm::None,
        };
        Self::new(algorithm)
    }

    /// Smooth a time-sorted cursor log. Output has the same length and order.
    pub fn smooth(&self, events: &[CursorEvent]) -> Vec<CursorEvent> {
        let positions: Vec<(f64, f64)> = events.iter().map(|e| (e.x, e.y)).collect();

        let smoothed = match self.algorithm {
            SmoothingAlgorithm::Ema { strength } => smooth_ema(&positions, strength),
            SmoothingAlgorithm::Kalman { strength } => smooth_kalman(&positions, strength),
            SmoothingAlgorithm::MovingAverage { window } => {
                smooth_moving_average(&positions, window)
            }
            SmoothingAlgorithm::None => positions,
        };

        events
            .iter()
            .zip(smoothed)
            .map(|(e, (x, y))| CursorEvent { x, y, ..e.clone() })
            .collect()
    }

    /// Index of the sample nearest to `timestamp_ns` in a time-sorted log.
    ///
    /// Ties resolve to the earlier sample.
    pub fn nearest_index(events: &[CursorEvent], timestamp_ns: TimestampNs) -> Option<usize> {
        if events.is_empty() {
            return None;
        }
        let idx = events.partition_point(|e| e.timestamp_ns < timestamp_ns);
        if idx == 0 {
            return Some(0);
        }
        if idx == events.len() {
            return Some(events.len() - 1);
        }
        let before = timestamp_ns - events[idx - 1].timestamp_ns;
        let after = events[idx].timestamp_ns - timestamp_ns;
        Some(if after < before { idx } else { idx - 1 })
    }

    /// Position of the nearest sample, in capture space.
    pub fn nearest_position(events: &[CursorEvent], timestamp_ns: TimestampNs) -> Option<Point2D> {
        Self::nearest_index(events, timestamp_ns).map(|i| Point2D::new(events[i].x, events[i].y))
    }
}

/// EMA smoothing.
///
/// `alpha = 1 - strength`, then `smoothed = alpha * current + (1 - alpha) * previous`.
fn smooth_ema(raw: &[(f64, f64)], strength: f64) -> Vec<(f64, f64)> {
    let Some(&first) = raw.first() else {
        return vec![];
    };

    let alpha = clamp01(1.0 - strength);
    let (mut prev_x, mut prev_y) = first;

    let mut result = Vec::with_capacity(raw.len());
    result.push(first);
    for &(x, y) in &raw[1..] {
        prev_x = alpha * x + (1.0 - alpha) * prev_x;
        prev_y = alpha * y + (1.0 - alpha) * prev_y;
        result.push((prev_x, prev_y));
    }
    result
}

fn smooth_kalman(raw: &[(f64, f64)], strength: f64) -> Vec<(f64, f64)> {
    let Some(&(mut x, mut y)) = raw.first() else {
        return vec![];
    };

    let strength = clamp01(strength);
    let q = 0.001 + (1.0 - strength) * 0.01;
    let r = 0.001 + strength * 0.04;

    let mut px = 1.0;
    let mut py = 1.0;
    let mut result = Vec::with_capacity(raw.len());

    for &(sx, sy) in raw {
        px += q;
        py += q;

        let kx = px / (px + r);
        let ky = py / (py + r);

        x += kx * (sx - x);
        y += ky * (sy - y);

        px *= 1.0 - kx;
        py *= 1.0 - ky;

        result.push((x, y));
    }
    result
}

fn smooth_moving_average(raw: &[(f64, f64)], window: usize) -> Vec<(f64, f64)> {
    if raw.is_empty() || window <= 1 {
        return raw.to_vec();
    }

    (0..raw.len())
        .map(|i| {
            let start = i.saturating_sub(window / 2);
            let end = (i + window / 2 + 1).min(raw.len());
            let count = (end - start) as f64;
            let (sx, sy) = raw[start..end]
                .iter()
                .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / count, sy / count)
        })
        .collect()
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

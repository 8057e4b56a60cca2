//! Clock and timing utilities for export jobs.
//!
//! Recordings use a zero-based nanosecond timeline; exports report
//! wall-clock start/finish times and throttle their progress output.
//! This module provides utilities for:
//! - Timing a job against both monotonic and wall-clock time
//! - Converting between nanoseconds and seconds
//! - Rate-limiting periodic work (progress events)

use std::time::Instant;

use chrono::{DateTime, Utc};

/// A job clock anchored to the moment an export started.
#[derive(Debug, Clone)]
pub struct JobClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch.
    epoch_wall: DateTime<Utc>,
}

impl JobClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: Utc::now(),
        }
    }

    /// Get nanoseconds elapsed since the job started.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Get seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.epoch_wall
    }

    /// Estimated seconds remaining given a completed fraction in `[0, 1]`.
    pub fn eta_secs(&self, fraction: f64) -> f64 {
        if fraction <= 0.0 {
            return 0.0;
        }
        let elapsed = self.elapsed_secs();
        ((elapsed / fraction.min(1.0)) - elapsed).max(0.0)
    }

    /// Convert an elapsed nanosecond value to seconds.
    pub fn ns_to_secs(ns: u64) -> f64 {
        ns as f64 / 1_000_000_000.0
    }

    /// Convert seconds to nanoseconds. Negative input clamps to zero.
    pub fn secs_to_ns(secs: f64) -> u64 {
        (secs.max(0.0) * 1_000_000_000.0).round() as u64
    }
}

/// Rate controller for periodic work such as progress events.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = JobClock::start();
        assert!(clock.elapsed_ns() < 1_000_000_000);
        assert!(clock.started_at() <= Utc::now());
    }

    #[test]
    fn test_ns_to_secs_conversion() {
        assert!((JobClock::ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert_eq!(JobClock::secs_to_ns(2.0), 2_000_000_000);
        assert_eq!(JobClock::secs_to_ns(-1.0), 0);
    }

    #[test]
    fn test_eta_is_zero_without_progress() {
        let clock = JobClock::start();
        assert_eq!(clock.eta_secs(0.0), 0.0);
        assert!(clock.eta_secs(0.5) >= 0.0);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(60);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(1_000_000)); // 1ms later, too soon
        assert!(ctrl.should_tick(17_000_000)); // ~17ms later (60Hz ~ 16.67ms)
    }
}

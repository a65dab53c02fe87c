//! Scroll performance samples and thresholds.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};

/// Frames slower than this (two 60 Hz frames) count as dropped
pub const DROPPED_FRAME_THRESHOLD_MS: f64 = 33.33;

/// Frame statistics of one measured scroll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPerformanceSample {
    /// Frames per second over the requested duration
    pub fps: f64,
    /// Mean frame time in milliseconds
    pub avg_frame_time: f64,
    /// Slowest frame in milliseconds
    pub max_frame_time: f64,
    /// Frames slower than [`DROPPED_FRAME_THRESHOLD_MS`]
    pub dropped_frames: usize,
    /// Measured duration in milliseconds
    pub duration: f64,
    /// Pixels actually scrolled
    pub distance: f64,
    /// Most items rendered at once during the scroll
    pub items_rendered: usize,
}

impl ScrollPerformanceSample {
    /// Compute statistics from per-frame deltas.
    ///
    /// `fps` divides by the requested duration, not the measured one.
    #[must_use]
    pub fn from_frames(
        frame_times: &[f64],
        requested_duration_ms: u64,
        measured_duration_ms: f64,
        distance: f64,
        items_rendered: usize,
    ) -> Self {
        let frame_count = frame_times.len();
        let fps = if requested_duration_ms == 0 {
            0.0
        } else {
            frame_count as f64 / (requested_duration_ms as f64 / 1000.0)
        };
        let avg_frame_time = if frame_count == 0 {
            0.0
        } else {
            frame_times.iter().sum::<f64>() / frame_count as f64
        };
        let max_frame_time = frame_times.iter().copied().fold(0.0, f64::max);
        let dropped_frames = frame_times
            .iter()
            .filter(|t| **t > DROPPED_FRAME_THRESHOLD_MS)
            .count();

        Self {
            fps,
            avg_frame_time,
            max_frame_time,
            dropped_frames,
            duration: measured_duration_ms,
            distance,
            items_rendered,
        }
    }

    /// Check against `thresholds`
    pub fn assert_scroll_performance(&self, thresholds: &ScrollThresholds) -> ProbeResult<()> {
        thresholds.check(self)
    }
}

/// Limits for [`ScrollPerformanceSample::assert_scroll_performance`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollThresholds {
    /// Minimum frames per second
    pub min_fps: Option<f64>,
    /// Maximum mean frame time in milliseconds
    pub max_avg_frame_time: Option<f64>,
    /// Maximum dropped frames
    pub max_dropped_frames: Option<usize>,
}

impl ScrollThresholds {
    /// No limits
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_fps: None,
            max_avg_frame_time: None,
            max_dropped_frames: None,
        }
    }

    /// Set minimum fps
    #[must_use]
    pub const fn with_min_fps(mut self, fps: f64) -> Self {
        self.min_fps = Some(fps);
        self
    }

    /// Set maximum mean frame time
    #[must_use]
    pub const fn with_max_avg_frame_time(mut self, ms: f64) -> Self {
        self.max_avg_frame_time = Some(ms);
        self
    }

    /// Set maximum dropped frames
    #[must_use]
    pub const fn with_max_dropped_frames(mut self, frames: usize) -> Self {
        self.max_dropped_frames = Some(frames);
        self
    }

    /// Check a sample, failing on the first violated limit
    pub fn check(&self, sample: &ScrollPerformanceSample) -> ProbeResult<()> {
        if let Some(min_fps) = self.min_fps {
            if sample.fps < min_fps {
                return Err(ProbeError::assertion(
                    "scroll fps",
                    format!(">= {min_fps:.1}"),
                    format!("{:.1}", sample.fps),
                ));
            }
        }

        if let Some(max_avg) = self.max_avg_frame_time {
            if sample.avg_frame_time > max_avg {
                return Err(ProbeError::assertion(
                    "average frame time",
                    format!("<= {max_avg:.2}ms"),
                    format!("{:.2}ms", sample.avg_frame_time),
                ));
            }
        }

        if let Some(max_dropped) = self.max_dropped_frames {
            if sample.dropped_frames > max_dropped {
                return Err(ProbeError::assertion(
                    "dropped frames",
                    format!("<= {max_dropped}"),
                    sample.dropped_frames,
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth() -> ScrollPerformanceSample {
        ScrollPerformanceSample::from_frames(&[16.0; 120], 2000, 1990.0, 5000.0, 30)
    }

    #[test]
    fn test_fps_uses_requested_duration() {
        let sample = smooth();
        assert!((sample.fps - 60.0).abs() < 1e-9);
        assert!((sample.avg_frame_time - 16.0).abs() < 1e-9);
        assert!((sample.duration - 1990.0).abs() < 1e-9);
    }

    #[test]
    fn test_dropped_frames() {
        let sample =
            ScrollPerformanceSample::from_frames(&[16.0, 40.0, 33.33, 33.34, 100.0], 1000, 1000.0, 0.0, 0);
        assert_eq!(sample.dropped_frames, 3);
        assert!((sample.max_frame_time - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_frames() {
        let sample = ScrollPerformanceSample::from_frames(&[], 2000, 0.0, 0.0, 0);
        assert!(sample.fps.abs() < 1e-9);
        assert!(sample.avg_frame_time.abs() < 1e-9);
        assert_eq!(sample.dropped_frames, 0);
    }

    #[test]
    fn test_thresholds() {
        let sample = smooth();
        let strict = ScrollThresholds::new()
            .with_min_fps(55.0)
            .with_max_avg_frame_time(17.0)
            .with_max_dropped_frames(0);
        assert!(sample.assert_scroll_performance(&strict).is_ok());
        assert!(sample
            .assert_scroll_performance(&ScrollThresholds::new().with_min_fps(90.0))
            .is_err());
        assert!(sample
            .assert_scroll_performance(&ScrollThresholds::new().with_max_avg_frame_time(10.0))
            .is_err());
        assert!(ScrollThresholds::default().check(&sample).is_ok());
    }
}

//! Rolling-window anomaly tracking for host-defined metrics (e.g. reward
//! rate, consolidation cycle duration, recall latency).
//!
//! Each named metric gets a fixed-size ring buffer of recent samples; a new
//! sample is flagged anomalous when its distance from the buffer's mean
//! exceeds a configurable number of standard deviations.

use std::collections::{HashMap, VecDeque};

/// Default ring-buffer capacity per metric.
pub const DEFAULT_WINDOW: usize = 100;

/// Default z-score threshold beyond which a sample is anomalous.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Minimum number of samples a metric must have before [`AnomalyTracker::is_anomaly`]
/// will flag anything; below this, a baseline is too noisy to trust.
pub const MIN_SAMPLES: usize = 5;

/// Mean and standard deviation of a metric's current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (population, not Bessel-corrected).
    pub std_dev: f64,
}

/// A single ring buffer tracking one metric's recent samples.
struct MetricWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl MetricWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn baseline(&self) -> Option<Baseline> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().sum::<f64>() / n;
        let variance = self.samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Baseline {
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

/// Tracks rolling baselines for an arbitrary set of named metrics and
/// flags out-of-distribution samples.
///
/// # Examples
///
/// ```
/// use engram_core::anomaly::AnomalyTracker;
///
/// let mut tracker = AnomalyTracker::new();
/// for v in [11.0, 12.0, 13.0, 12.0, 11.0, 13.0, 12.0, 12.0].into_iter().cycle().take(20) {
///     tracker.record("recall_latency_ms", v);
/// }
/// assert!(!tracker.is_anomaly("recall_latency_ms", 13.5));
/// assert!(tracker.is_anomaly("recall_latency_ms", 500.0));
/// ```
pub struct AnomalyTracker {
    window_size: usize,
    z_threshold: f64,
    metrics: HashMap<String, MetricWindow>,
}

impl Default for AnomalyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyTracker {
    /// A tracker using [`DEFAULT_WINDOW`] and [`DEFAULT_Z_THRESHOLD`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(DEFAULT_WINDOW, DEFAULT_Z_THRESHOLD)
    }

    /// A tracker with an explicit window size and z-score threshold.
    #[must_use]
    pub fn with_params(window_size: usize, z_threshold: f64) -> Self {
        Self {
            window_size,
            z_threshold,
            metrics: HashMap::new(),
        }
    }

    /// Record a new sample for `metric`, creating its window on first use.
    /// Does not itself judge the sample anomalous — call
    /// [`AnomalyTracker::is_anomaly`] first if you need a verdict against
    /// the baseline *before* this sample is folded in.
    pub fn record(&mut self, metric: &str, value: f64) {
        self.metrics
            .entry(metric.to_string())
            .or_insert_with(|| MetricWindow::new(self.window_size))
            .push(value);
    }

    /// The current mean/std-dev baseline for a metric, or `None` if it has
    /// never been recorded.
    #[must_use]
    pub fn baseline(&self, metric: &str) -> Option<Baseline> {
        self.metrics.get(metric)?.baseline()
    }

    /// Whether `value` falls more than the z-score threshold away from
    /// `metric`'s current baseline. Requires at least [`MIN_SAMPLES`]
    /// recorded samples; below that, never flags, since the baseline isn't
    /// trustworthy yet. When the baseline has zero variance, the z-score is
    /// undefined, so any value that differs from the mean at all is treated
    /// as anomalous.
    #[must_use]
    pub fn is_anomaly(&self, metric: &str, value: f64) -> bool {
        let Some(window) = self.metrics.get(metric) else {
            return false;
        };
        if window.len() < MIN_SAMPLES {
            return false;
        }
        let Some(baseline) = window.baseline() else {
            return false;
        };
        if baseline.std_dev == 0.0 {
            return value != baseline.mean;
        }
        let z = (value - baseline.mean).abs() / baseline.std_dev;
        z > self.z_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_none_before_any_samples() {
        let tracker = AnomalyTracker::new();
        assert!(tracker.baseline("latency").is_none());
    }

    #[test]
    fn is_anomaly_false_without_variance_below_min_samples() {
        let mut tracker = AnomalyTracker::new();
        tracker.record("latency", 10.0);
        assert!(!tracker.is_anomaly("latency", 10.0));
        assert!(!tracker.is_anomaly("latency", 1000.0));
    }

    #[test]
    fn is_anomaly_flags_any_deviation_from_a_zero_variance_baseline() {
        let mut tracker = AnomalyTracker::new();
        for _ in 0..5 {
            tracker.record("latency", 10.0);
        }
        assert!(!tracker.is_anomaly("latency", 10.0));
        assert!(tracker.is_anomaly("latency", 10.0001));
        assert!(tracker.is_anomaly("latency", 9.9999));
    }

    #[test]
    fn is_anomaly_flags_extreme_outlier() {
        let mut tracker = AnomalyTracker::new();
        for v in [10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 11.0, 9.0, 10.5, 9.5] {
            tracker.record("latency", v);
        }
        assert!(!tracker.is_anomaly("latency", 10.5));
        assert!(tracker.is_anomaly("latency", 10_000.0));
    }

    #[test]
    fn is_anomaly_requires_minimum_sample_count() {
        let mut tracker = AnomalyTracker::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            tracker.record("latency", v);
        }
        assert!(!tracker.is_anomaly("latency", 10_000.0));
        tracker.record("latency", 5.0);
        assert!(tracker.is_anomaly("latency", 10_000.0));
    }

    #[test]
    fn window_respects_capacity() {
        let mut tracker = AnomalyTracker::with_params(3, 3.0);
        for v in [1.0, 2.0, 3.0, 100.0] {
            tracker.record("m", v);
        }
        let baseline = tracker.baseline("m").unwrap();
        assert!((baseline.mean - (2.0 + 3.0 + 100.0) / 3.0).abs() < 1e-9);
    }
}

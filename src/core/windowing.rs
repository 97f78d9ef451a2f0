//! Time-bounded sample windows.
//!
//! A [`WindowedSeries`] keeps the samples of the last `horizon` seconds for
//! "recent behaviour" statistics. It may also own a [`RunningBaseline`] that
//! sees every sample ever pushed, giving the "typical behaviour" reference
//! that z-scores compare against. Eviction only touches the window.

use crate::core::baseline::RunningBaseline;
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Default horizon of the recent-behaviour windows, in seconds.
pub const DEFAULT_HORIZON_SECS: f64 = 30.0;

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Misuse of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesError {
    /// A z-score was requested from a series created without a baseline.
    BaselineNotConfigured,
}

impl std::fmt::Display for SeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesError::BaselineNotConfigured => {
                write!(f, "z-score requested on a series without a baseline")
            }
        }
    }
}

impl std::error::Error for SeriesError {}

/// Ordered samples of the last `horizon` seconds, with an optional
/// lifetime baseline.
#[derive(Debug, Clone)]
pub struct WindowedSeries {
    samples: VecDeque<Sample>,
    horizon: f64,
    baseline: Option<RunningBaseline>,
}

impl WindowedSeries {
    /// Create a window without a baseline.
    pub fn new(horizon: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            horizon,
            baseline: None,
        }
    }

    /// Create a window whose pushes also feed `baseline`.
    pub fn with_baseline(horizon: f64, baseline: RunningBaseline) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::new(horizon)
        }
    }

    /// Evict every sample older than `now - horizon`.
    pub fn clean(&mut self, now: f64) {
        let cutoff = now - self.horizon;
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    /// Append a sample, evicting relative to its timestamp first.
    pub fn push(&mut self, sample: Sample) {
        self.clean(sample.timestamp);
        self.samples.push_back(sample);
        if let Some(ref mut baseline) = self.baseline {
            baseline.update(sample.value);
        }
    }

    pub fn push_value(&mut self, timestamp: f64, value: f64) {
        self.push(Sample::new(timestamp, value));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.timestamp)
    }

    pub fn baseline(&self) -> Option<&RunningBaseline> {
        self.baseline.as_ref()
    }

    /// Mean of the retained values, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.values().mean()
    }

    /// Population variance of the retained values, 0 when empty.
    pub fn var(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.values().population_variance()
    }

    /// Population standard deviation of the retained values, 0 when empty.
    pub fn std(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.values().population_std_dev()
    }

    /// Deviation of the window mean from the baseline mean, in baseline
    /// standard deviations.
    pub fn mean_zscore(&self) -> Result<f64, SeriesError> {
        let baseline = self
            .baseline
            .as_ref()
            .ok_or(SeriesError::BaselineNotConfigured)?;
        Ok(zscore(self.mean(), baseline))
    }

    /// Deviation of the window standard deviation from the baseline's,
    /// relative to the baseline standard deviation.
    pub fn std_zscore(&self) -> Result<f64, SeriesError> {
        let baseline = self
            .baseline
            .as_ref()
            .ok_or(SeriesError::BaselineNotConfigured)?;
        let std = baseline.std();
        Ok(if std > 0.0 {
            (self.std() - std) / std
        } else {
            0.0
        })
    }

    /// Katz fractal dimension of the (timestamp, value) curve.
    ///
    /// `None` when undefined: fewer than two samples, a zero-length curve,
    /// or a log ratio that is non-positive or zero.
    pub fn fractal_dimension(&self) -> Option<f64> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }

        let length: f64 = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(a, b)| (b.timestamp - a.timestamp).hypot(b.value - a.value))
            .sum();
        if length <= 0.0 {
            return None;
        }

        let first = self.samples.front()?;
        let d_max = self
            .samples
            .iter()
            .map(|s| (s.timestamp - first.timestamp).hypot(s.value - first.value))
            .fold(0.0, f64::max);

        let ratio = n as f64 * d_max / length;
        if ratio <= 0.0 {
            return None;
        }
        let denominator = ratio.ln();
        if denominator == 0.0 {
            return None;
        }

        let dimension = (n as f64).ln() / denominator;
        dimension.is_finite().then_some(dimension)
    }
}

/// `(value - mean) / std`, or 0 for a degenerate baseline.
fn zscore(value: f64, baseline: &RunningBaseline) -> f64 {
    let std = baseline.std();
    if std > 0.0 {
        (value - baseline.mean()) / std
    } else {
        0.0
    }
}

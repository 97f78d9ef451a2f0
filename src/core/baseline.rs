//! Lifetime running baseline.
//!
//! A Welford estimator seeded with a prior, as though `virtual_samples`
//! observations with the prior mean and variance had already been seen.
//! The prior keeps early real observations from swinging the baseline; it
//! only drifts once hundreds of real samples have accumulated.

use serde::{Deserialize, Serialize};

/// Default number of pseudo-observations backing the prior.
pub const DEFAULT_VIRTUAL_SAMPLES: u64 = 400;

/// Prior estimate for a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mean: f64,
    pub variance: f64,
}

impl Prior {
    pub const fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }
}

/// Incremental mean/variance estimator.
#[derive(Debug, Clone)]
pub struct RunningBaseline {
    /// Real plus virtual observations
    count: u64,
    virtual_samples: u64,
    mean: f64,
    sum_sq_dev: f64,
}

impl RunningBaseline {
    pub fn new(prior_mean: f64, prior_variance: f64, virtual_samples: u64) -> Self {
        Self {
            count: virtual_samples,
            virtual_samples,
            mean: prior_mean,
            sum_sq_dev: prior_variance * virtual_samples.saturating_sub(1) as f64,
        }
    }

    pub fn from_prior(prior: Prior, virtual_samples: u64) -> Self {
        Self::new(prior.mean, prior.variance, virtual_samples)
    }

    /// Fold one observation into the estimate.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_sq_dev += delta * (x - self.mean);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation.
    pub fn std(&self) -> f64 {
        (self.sum_sq_dev / self.count.saturating_sub(1).max(1) as f64).sqrt()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of real (non-virtual) observations.
    pub fn observations(&self) -> u64 {
        self.count - self.virtual_samples
    }

    /// Mean, once more than `min_observations` real samples were folded in.
    pub fn settled_mean(&self, min_observations: u64) -> Option<f64> {
        (self.observations() > min_observations).then_some(self.mean)
    }
}

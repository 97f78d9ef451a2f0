//! Keystroke-dynamics statistics engine.
//!
//! This module contains:
//! - Lifetime baselines seeded with population priors
//! - Time-bounded sample windows
//! - The press/release event processor
//! - Fatigue scoring and the shared, periodically sampled monitor

pub mod baseline;
pub mod features;
pub mod monitor;
pub mod stats;
pub mod windowing;

// Re-export commonly used types
pub use baseline::{Prior, RunningBaseline};
pub use features::{words_per_minute, FatigueLevel, FatigueScorer, FatigueSnapshot};
pub use monitor::{FatigueMonitor, SamplerHandle};
pub use stats::KeystrokeStats;
pub use windowing::{Sample, SeriesError, WindowedSeries};

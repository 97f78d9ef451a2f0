//! Fatigue scoring from keystroke statistics.
//!
//! Recent windows are compared with lifetime baselines as z-scores and
//! combined into a single composite score. All values are computed from
//! timing data only.

use crate::config::LevelThresholds;
use crate::core::stats::KeystrokeStats;
use crate::core::windowing::WindowedSeries;
use serde::{Deserialize, Serialize};

/// Standard word length used to turn characters per minute into WPM.
const CHARS_PER_WORD: f64 = 5.0;

/// Typing speed over the most recent uninterrupted run of presses.
///
/// Presses before the last gap longer than `pause_gap` seconds are ignored
/// so an idle period does not drag the estimate down. Returns 0 when fewer
/// than two presses remain.
pub fn words_per_minute(press_times: &WindowedSeries, pause_gap: f64) -> f64 {
    let times: Vec<f64> = press_times.timestamps().collect();
    if times.len() < 2 {
        return 0.0;
    }

    let start = times
        .windows(2)
        .rposition(|pair| pair[1] - pair[0] > pause_gap)
        .map_or(0, |i| i + 1);
    let run = &times[start..];
    if run.len() < 2 {
        return 0.0;
    }

    let span = run[run.len() - 1] - run[0];
    if span <= 0.0 {
        return 0.0;
    }

    run.len() as f64 / span * 60.0 / CHARS_PER_WORD
}

/// Coarse fatigue classification of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueLevel {
    Rested,
    Normal,
    Tired,
    Exhausted,
}

impl FatigueLevel {
    pub fn from_score(score: f64, thresholds: &LevelThresholds) -> Self {
        if score < thresholds.rested_below {
            FatigueLevel::Rested
        } else if score < thresholds.normal_below {
            FatigueLevel::Normal
        } else if score < thresholds.tired_below {
            FatigueLevel::Tired
        } else {
            FatigueLevel::Exhausted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueLevel::Rested => "rested",
            FatigueLevel::Normal => "normal",
            FatigueLevel::Tired => "tired",
            FatigueLevel::Exhausted => "exhausted",
        }
    }

    /// Break suggestion for levels that warrant one.
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            FatigueLevel::Rested | FatigueLevel::Normal => None,
            FatigueLevel::Tired => Some("You seem tired, maybe take a break?"),
            FatigueLevel::Exhausted => Some("You seem exhausted, time to step away for a while."),
        }
    }
}

impl std::fmt::Display for FatigueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All metrics computed at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatigueSnapshot {
    /// Monotonic time the snapshot was taken at (seconds)
    pub timestamp: f64,
    pub fatigue: f64,
    pub level: FatigueLevel,
    pub wpm: f64,
    pub wpm_zscore: f64,
    /// Fraction of recent presses that were backspace
    pub backspace_rate: f64,
    pub hold_mean: f64,
    pub flight_mean: f64,
    pub latency_mean: f64,
    pub pre_correction_mean: f64,
    /// Katz fractal dimension of recent inter-event latencies (diagnostic)
    pub latency_fractal_dimension: Option<f64>,
    pub lifetime_hold_mean: Option<f64>,
    pub lifetime_flight_mean: Option<f64>,
    pub lifetime_backspace_rate: Option<f64>,
    pub lifetime_wpm: Option<f64>,
    pub events_applied: u64,
    pub unreleased_keys: usize,
}

/// Read-only metric view over [`KeystrokeStats`] whose windows were
/// cleaned at `now`.
#[derive(Debug, Clone, Copy)]
pub struct FatigueScorer<'a> {
    stats: &'a KeystrokeStats,
    now: f64,
}

impl<'a> FatigueScorer<'a> {
    /// Callers are expected to have cleaned `stats` at `now`;
    /// [`KeystrokeStats::scorer_at`] does both.
    pub fn new(stats: &'a KeystrokeStats, now: f64) -> Self {
        Self { stats, now }
    }

    pub fn wpm(&self) -> f64 {
        words_per_minute(self.stats.press_times(), self.stats.settings().wpm_pause_secs)
    }

    /// Deviation of the current WPM from the lifetime WPM baseline, 0 before
    /// the first press.
    pub fn wpm_zscore(&self) -> f64 {
        if self.stats.presses_seen() == 0 {
            return 0.0;
        }
        let baseline = self.stats.wpm_baseline();
        let std = baseline.std();
        if std > 0.0 {
            (self.wpm() - baseline.mean()) / std
        } else {
            0.0
        }
    }

    pub fn backspace_rate(&self) -> f64 {
        self.stats.backspace_flags().mean()
    }

    /// Composite fatigue: slower flight, longer holds and more corrections
    /// than usual add to the score; faster typing than usual subtracts.
    pub fn fatigue(&self) -> f64 {
        deviation(self.stats.flight_times())
            + deviation(self.stats.hold_times())
            + deviation(self.stats.backspace_flags())
            - self.wpm_zscore()
    }

    pub fn lifetime_hold_mean(&self) -> Option<f64> {
        self.settled(self.stats.hold_times())
    }

    pub fn lifetime_flight_mean(&self) -> Option<f64> {
        self.settled(self.stats.flight_times())
    }

    pub fn lifetime_backspace_rate(&self) -> Option<f64> {
        self.settled(self.stats.backspace_flags())
    }

    pub fn lifetime_wpm(&self) -> Option<f64> {
        self.stats
            .wpm_baseline()
            .settled_mean(self.stats.settings().lifetime_min_observations)
    }

    fn settled(&self, series: &WindowedSeries) -> Option<f64> {
        series
            .baseline()?
            .settled_mean(self.stats.settings().lifetime_min_observations)
    }

    pub fn snapshot(&self, levels: &LevelThresholds) -> FatigueSnapshot {
        let fatigue = self.fatigue();

        FatigueSnapshot {
            timestamp: self.now,
            fatigue,
            level: FatigueLevel::from_score(fatigue, levels),
            wpm: self.wpm(),
            wpm_zscore: self.wpm_zscore(),
            backspace_rate: self.backspace_rate(),
            hold_mean: self.stats.hold_times().mean(),
            flight_mean: self.stats.flight_times().mean(),
            latency_mean: self.stats.latencies().mean(),
            pre_correction_mean: self.stats.pre_correction_times().mean(),
            latency_fractal_dimension: self.stats.latencies().fractal_dimension(),
            lifetime_hold_mean: self.lifetime_hold_mean(),
            lifetime_flight_mean: self.lifetime_flight_mean(),
            lifetime_backspace_rate: self.lifetime_backspace_rate(),
            lifetime_wpm: self.lifetime_wpm(),
            events_applied: self.stats.events_applied(),
            unreleased_keys: self.stats.unreleased_count(),
        }
    }
}

/// Window mean of a scored series as a z-score.
///
/// [`KeystrokeStats::new`] builds every scored series with a baseline, so
/// the z-score cannot fail here.
fn deviation(series: &WindowedSeries) -> f64 {
    series
        .mean_zscore()
        .expect("scored series are created with a baseline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{Key, KeyEvent};
    use crate::config::EngineConfig;
    use crate::core::windowing::DEFAULT_HORIZON_SECS;

    fn presses(times: &[f64]) -> WindowedSeries {
        let mut series = WindowedSeries::new(DEFAULT_HORIZON_SECS);
        for &t in times {
            series.push_value(t, t);
        }
        series
    }

    /// Type `count` keys with a steady rhythm starting at `start`.
    fn type_keys(stats: &mut KeystrokeStats, start: f64, count: usize, hold: f64, gap: f64) -> f64 {
        let mut t = start;
        for i in 0..count {
            let key = Key::Code(i as u32 % 26);
            stats.consume(KeyEvent::press(key, t));
            stats.consume(KeyEvent::release(key, t + hold));
            t += hold + gap;
        }
        t
    }

    #[test]
    fn test_wpm_needs_two_presses() {
        assert_eq!(words_per_minute(&presses(&[]), 5.0), 0.0);
        assert_eq!(words_per_minute(&presses(&[1.0]), 5.0), 0.0);
    }

    #[test]
    fn test_wpm_uses_run_after_last_pause() {
        let series = presses(&[0.0, 0.2, 0.4, 6.5, 6.7, 6.9]);
        let wpm = words_per_minute(&series, 5.0);
        // 3 presses over 0.4 s
        assert!((wpm - 3.0 / 0.4 * 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_wpm_single_press_after_pause_is_zero() {
        let series = presses(&[0.0, 0.2, 0.4, 10.0]);
        assert_eq!(words_per_minute(&series, 5.0), 0.0);
    }

    #[test]
    fn test_wpm_gap_of_exactly_pause_is_not_a_boundary() {
        let series = presses(&[0.0, 5.0, 5.5]);
        let wpm = words_per_minute(&series, 5.0);
        assert!((wpm - 3.0 / 5.5 * 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_wpm_identical_timestamps() {
        assert_eq!(words_per_minute(&presses(&[2.0, 2.0]), 5.0), 0.0);
    }

    #[test]
    fn test_cold_start_metrics_are_neutral() {
        let mut stats = KeystrokeStats::default();
        let scorer = stats.scorer_at(0.0);

        assert_eq!(scorer.wpm(), 0.0);
        assert_eq!(scorer.wpm_zscore(), 0.0);
        assert_eq!(scorer.backspace_rate(), 0.0);
        assert!(scorer.fatigue().is_finite());
        assert_eq!(scorer.lifetime_hold_mean(), None);
        assert_eq!(scorer.lifetime_wpm(), None);
    }

    #[test]
    fn test_fatigue_formula_sign_convention() {
        let mut stats = KeystrokeStats::default();
        let end = type_keys(&mut stats, 0.0, 20, 0.1, 0.15);
        let scorer = stats.scorer_at(end);

        let s = scorer.stats;
        let expected = s.flight_times().mean_zscore().unwrap()
            + s.hold_times().mean_zscore().unwrap()
            + s.backspace_flags().mean_zscore().unwrap()
            - scorer.wpm_zscore();
        assert!((scorer.fatigue() - expected).abs() < 1e-12);
        // Typing faster than the WPM prior lowers the score
        assert!(scorer.wpm() > 40.0);
        assert!(scorer.wpm_zscore() > 0.0);
    }

    #[test]
    fn test_scored_series_carry_baselines() {
        let stats = KeystrokeStats::new(EngineConfig {
            window_horizon_secs: 5.0,
            virtual_samples: 1,
            ..EngineConfig::default()
        });
        for series in [stats.flight_times(), stats.hold_times(), stats.backspace_flags()] {
            assert!(series.baseline().is_some());
            assert!(series.mean_zscore().is_ok());
        }
    }

    #[test]
    fn test_sluggish_typing_scores_higher_than_brisk_typing() {
        let mut brisk = KeystrokeStats::default();
        let end = type_keys(&mut brisk, 0.0, 40, 0.08, 0.1);
        let brisk_score = brisk.scorer_at(end).fatigue();

        let mut sluggish = KeystrokeStats::default();
        let end = type_keys(&mut sluggish, 0.0, 40, 0.2, 0.5);
        let sluggish_score = sluggish.scorer_at(end).fatigue();

        assert!(sluggish_score > brisk_score);
    }

    #[test]
    fn test_backspace_rate_is_fraction_of_presses() {
        let mut stats = KeystrokeStats::default();
        let keys = [Key::Code(1), Key::Code(2), Key::Backspace, Key::Code(3)];
        for (i, key) in keys.into_iter().enumerate() {
            let t = i as f64 * 0.3;
            stats.consume(KeyEvent::press(key, t));
            stats.consume(KeyEvent::release(key, t + 0.1));
        }
        let scorer = stats.scorer_at(1.0);
        assert!((scorer.backspace_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_lifetime_values_appear_after_cutoff() {
        let config = EngineConfig {
            lifetime_min_observations: 5,
            ..EngineConfig::default()
        };
        let mut stats = KeystrokeStats::new(config);
        let end = type_keys(&mut stats, 0.0, 5, 0.1, 0.1);
        assert_eq!(stats.scorer_at(end).lifetime_hold_mean(), None);

        let end = type_keys(&mut stats, end, 1, 0.1, 0.1);
        let scorer = stats.scorer_at(end);
        assert!(scorer.lifetime_hold_mean().is_some());
        // 12 events have updated the WPM baseline
        assert!(scorer.lifetime_wpm().is_some());
        // Flight times come from 5 release-to-press gaps
        assert_eq!(scorer.lifetime_flight_mean(), None);
    }

    #[test]
    fn test_snapshot_after_idle_period() {
        let mut stats = KeystrokeStats::default();
        type_keys(&mut stats, 0.0, 10, 0.1, 0.1);

        let snapshot = stats
            .scorer_at(500.0)
            .snapshot(&LevelThresholds::default());
        assert_eq!(snapshot.wpm, 0.0);
        assert_eq!(snapshot.backspace_rate, 0.0);
        assert_eq!(snapshot.hold_mean, 0.0);
        assert_eq!(snapshot.latency_fractal_dimension, None);
        assert_eq!(snapshot.events_applied, 20);
        assert!(snapshot.fatigue.is_finite());
    }

    #[test]
    fn test_level_thresholds() {
        let levels = LevelThresholds::default();
        assert_eq!(FatigueLevel::from_score(-2.0, &levels), FatigueLevel::Rested);
        assert_eq!(FatigueLevel::from_score(-1.0, &levels), FatigueLevel::Normal);
        assert_eq!(FatigueLevel::from_score(2.0, &levels), FatigueLevel::Tired);
        assert_eq!(FatigueLevel::from_score(3.0, &levels), FatigueLevel::Exhausted);

        assert!(FatigueLevel::Normal.advice().is_none());
        assert!(FatigueLevel::Tired.advice().unwrap().contains("break"));
        assert!(FatigueLevel::Exhausted > FatigueLevel::Tired);
    }
}

//! Keystroke event processing.
//!
//! [`KeystrokeStats`] consumes press/release events in timestamp order,
//! pairs presses with releases and routes the derived timings into one
//! [`WindowedSeries`] per metric.

use crate::collector::types::{Key, KeyEvent};
use crate::config::EngineConfig;
use crate::core::baseline::{Prior, RunningBaseline};
use crate::core::features::{words_per_minute, FatigueScorer};
use crate::core::windowing::{Sample, WindowedSeries};
use std::collections::HashMap;

/// Timestamp and direction of the last applied event.
#[derive(Debug, Clone, Copy)]
struct LastEvent {
    timestamp: f64,
    is_press: bool,
}

/// Aggregate keystroke state for one monitoring session.
#[derive(Debug, Clone)]
pub struct KeystrokeStats {
    settings: EngineConfig,
    /// Presses waiting for their release
    unreleased: HashMap<Key, Sample>,
    /// Times of all key events
    key_times: WindowedSeries,
    press_times: WindowedSeries,
    release_times: WindowedSeries,
    /// Press-to-release time of the same key
    hold_times: WindowedSeries,
    /// 1 for a backspace press, 0 for any other press
    backspace_flags: WindowedSeries,
    /// Release-to-next-press time
    flight_times: WindowedSeries,
    /// Time from the last event before a correction burst to its first backspace
    pre_correction_times: WindowedSeries,
    /// Time between consecutive events
    latencies: WindowedSeries,
    wpm_baseline: RunningBaseline,
    last_event: Option<LastEvent>,
    presses_seen: u64,
    events_applied: u64,
    events_ignored: u64,
}

impl KeystrokeStats {
    pub fn new(settings: EngineConfig) -> Self {
        let horizon = settings.window_horizon_secs;
        let priors = settings.priors.clone();
        let baseline = |prior: Prior| RunningBaseline::from_prior(prior, settings.virtual_samples);

        Self {
            unreleased: HashMap::new(),
            key_times: WindowedSeries::new(horizon),
            press_times: WindowedSeries::new(horizon),
            release_times: WindowedSeries::new(horizon),
            hold_times: WindowedSeries::with_baseline(horizon, baseline(priors.hold)),
            backspace_flags: WindowedSeries::with_baseline(horizon, baseline(priors.backspace)),
            flight_times: WindowedSeries::with_baseline(horizon, baseline(priors.flight)),
            pre_correction_times: WindowedSeries::with_baseline(
                horizon,
                baseline(priors.pre_correction),
            ),
            latencies: WindowedSeries::with_baseline(horizon, baseline(priors.latency)),
            wpm_baseline: baseline(priors.wpm),
            last_event: None,
            presses_seen: 0,
            events_applied: 0,
            events_ignored: 0,
            settings,
        }
    }

    /// Apply one event. Returns false when the event was ignored: an
    /// unknown key, a non-finite timestamp, or a timestamp earlier than the
    /// previous event.
    pub fn consume(&mut self, event: KeyEvent) -> bool {
        let t = event.timestamp;

        if event.key == Key::Unknown || !t.is_finite() {
            self.events_ignored += 1;
            tracing::trace!("Ignoring unidentified event {event}");
            return false;
        }

        let previous = self.last_event;
        if previous.is_some_and(|last| t < last.timestamp) {
            self.events_ignored += 1;
            tracing::debug!("Dropping out-of-order event {event}");
            return false;
        }

        self.key_times.push_value(t, t);
        if let Some(last) = previous {
            self.latencies.push_value(t, t - last.timestamp);
        }

        if event.is_press {
            self.on_press(event, previous);
        } else {
            self.on_release(event);
        }

        self.last_event = Some(LastEvent {
            timestamp: t,
            is_press: event.is_press,
        });
        self.events_applied += 1;

        self.press_times.clean(t);
        let wpm = words_per_minute(&self.press_times, self.settings.wpm_pause_secs);
        self.wpm_baseline.update(wpm);

        true
    }

    fn on_press(&mut self, event: KeyEvent, previous: Option<LastEvent>) {
        let t = event.timestamp;

        self.unreleased.insert(event.key, Sample::new(t, t));
        self.press_times.push_value(t, t);
        self.presses_seen += 1;

        if let Some(last) = previous.filter(|last| !last.is_press) {
            let flight = t - last.timestamp;
            if flight < self.settings.max_flight_secs {
                self.flight_times.push_value(t, flight);
            }
        }

        if event.key.is_backspace() {
            // Only the first backspace of a burst is credited with the hesitation
            self.backspace_flags.clean(t);
            let follows_typing = self.backspace_flags.last().is_some_and(|s| s.value == 0.0);
            if let Some(last) = previous.filter(|_| follows_typing) {
                self.pre_correction_times.push_value(t, t - last.timestamp);
            }
            self.backspace_flags.push_value(t, 1.0);
        } else {
            self.backspace_flags.push_value(t, 0.0);
        }
    }

    fn on_release(&mut self, event: KeyEvent) {
        let t = event.timestamp;

        self.release_times.push_value(t, t);

        // A release without a recorded press yields no hold time
        if let Some(press) = self.unreleased.remove(&event.key) {
            let hold = t - press.timestamp;
            if hold < self.settings.max_hold_secs {
                self.hold_times.push_value(t, hold);
            }
        }
    }

    /// Evict every window relative to `now`. Call before reading metrics.
    pub fn clean(&mut self, now: f64) {
        for series in [
            &mut self.key_times,
            &mut self.press_times,
            &mut self.release_times,
            &mut self.hold_times,
            &mut self.backspace_flags,
            &mut self.flight_times,
            &mut self.pre_correction_times,
            &mut self.latencies,
        ] {
            series.clean(now);
        }
    }

    /// Clean all windows at `now` and return a scorer over the result.
    pub fn scorer_at(&mut self, now: f64) -> FatigueScorer<'_> {
        self.clean(now);
        FatigueScorer::new(self, now)
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn key_times(&self) -> &WindowedSeries {
        &self.key_times
    }

    pub fn press_times(&self) -> &WindowedSeries {
        &self.press_times
    }

    pub fn release_times(&self) -> &WindowedSeries {
        &self.release_times
    }

    pub fn hold_times(&self) -> &WindowedSeries {
        &self.hold_times
    }

    pub fn backspace_flags(&self) -> &WindowedSeries {
        &self.backspace_flags
    }

    pub fn flight_times(&self) -> &WindowedSeries {
        &self.flight_times
    }

    pub fn pre_correction_times(&self) -> &WindowedSeries {
        &self.pre_correction_times
    }

    pub fn latencies(&self) -> &WindowedSeries {
        &self.latencies
    }

    pub fn wpm_baseline(&self) -> &RunningBaseline {
        &self.wpm_baseline
    }

    /// Whether `key` has been pressed and not yet released.
    pub fn is_unreleased(&self, key: Key) -> bool {
        self.unreleased.contains_key(&key)
    }

    pub fn unreleased_count(&self) -> usize {
        self.unreleased.len()
    }

    pub fn presses_seen(&self) -> u64 {
        self.presses_seen
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    pub fn events_ignored(&self) -> u64 {
        self.events_ignored
    }
}

impl Default for KeystrokeStats {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Key = Key::Code(0);
    const B: Key = Key::Code(11);

    fn apply(stats: &mut KeystrokeStats, events: &[KeyEvent]) {
        for &event in events {
            assert!(stats.consume(event), "event rejected: {event}");
        }
    }

    fn values(series: &WindowedSeries) -> Vec<f64> {
        series.values().collect()
    }

    #[test]
    fn test_press_release_press_scenario() {
        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 0.05),
                KeyEvent::press(A, 0.20),
            ],
        );

        let holds = values(stats.hold_times());
        assert_eq!(holds.len(), 1);
        assert!((holds[0] - 0.05).abs() < 1e-9);

        let flights = values(stats.flight_times());
        assert_eq!(flights.len(), 1);
        assert!((flights[0] - 0.15).abs() < 1e-9);

        assert_eq!(stats.key_times().len(), 3);
        assert_eq!(stats.latencies().len(), 2);
        assert_eq!(stats.press_times().len(), 2);
        assert_eq!(stats.release_times().len(), 1);
        assert!(stats.is_unreleased(A));
    }

    #[test]
    fn test_first_press_has_no_flight_time() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 0.0)]);
        assert!(stats.flight_times().is_empty());
        assert!(stats.latencies().is_empty());
    }

    #[test]
    fn test_flight_requires_release_immediately_before() {
        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 0.1),
                KeyEvent::press(B, 0.2),
                // Rollover: the previous event is a press, not a release
                KeyEvent::press(A, 0.25),
            ],
        );
        assert_eq!(stats.flight_times().len(), 1);
    }

    #[test]
    fn test_hold_cutoff_is_strict() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 0.0), KeyEvent::release(A, 0.5)]);
        assert!(stats.hold_times().is_empty());

        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 0.0), KeyEvent::release(A, 0.499)]);
        assert_eq!(stats.hold_times().len(), 1);
    }

    #[test]
    fn test_flight_cutoff_is_strict() {
        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 1.0),
                KeyEvent::press(A, 2.0),
            ],
        );
        assert!(stats.flight_times().is_empty());

        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 1.0),
                KeyEvent::press(A, 1.999),
            ],
        );
        assert_eq!(stats.flight_times().len(), 1);
    }

    #[test]
    fn test_release_without_press_records_no_hold() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::release(A, 0.3)]);

        assert_eq!(stats.release_times().len(), 1);
        assert!(stats.hold_times().is_empty());
        assert_eq!(stats.unreleased_count(), 0);
    }

    #[test]
    fn test_release_clears_pending_press() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 0.0), KeyEvent::press(B, 0.05)]);
        assert_eq!(stats.unreleased_count(), 2);

        apply(&mut stats, &[KeyEvent::release(A, 0.1)]);
        assert!(!stats.is_unreleased(A));
        assert!(stats.is_unreleased(B));
    }

    #[test]
    fn test_backspace_burst_credits_first_backspace_only() {
        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 0.08),
                KeyEvent::press(Key::Backspace, 0.6),
                KeyEvent::release(Key::Backspace, 0.65),
                KeyEvent::press(Key::Backspace, 0.8),
            ],
        );

        let corrections = values(stats.pre_correction_times());
        assert_eq!(corrections.len(), 1);
        // Measured from the event right before the first backspace
        assert!((corrections[0] - 0.52).abs() < 1e-9);

        assert_eq!(values(stats.backspace_flags()), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_leading_backspace_has_no_pre_correction() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(Key::Backspace, 0.0)]);
        assert!(stats.pre_correction_times().is_empty());
        assert_eq!(values(stats.backspace_flags()), vec![1.0]);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut stats = KeystrokeStats::default();
        assert!(!stats.consume(KeyEvent::press(Key::Unknown, 0.0)));
        assert!(!stats.consume(KeyEvent::release(Key::Unknown, 0.1)));

        assert!(stats.key_times().is_empty());
        assert_eq!(stats.events_applied(), 0);
        assert_eq!(stats.events_ignored(), 2);
        assert_eq!(stats.wpm_baseline().observations(), 0);
    }

    #[test]
    fn test_out_of_order_events_are_dropped() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 1.0)]);
        assert!(!stats.consume(KeyEvent::release(A, 0.5)));
        assert!(stats.is_unreleased(A));
        assert_eq!(stats.key_times().len(), 1);
    }

    #[test]
    fn test_wpm_baseline_updates_on_every_event() {
        let mut stats = KeystrokeStats::default();
        apply(
            &mut stats,
            &[
                KeyEvent::press(A, 0.0),
                KeyEvent::release(A, 0.05),
                KeyEvent::press(B, 0.2),
            ],
        );
        assert_eq!(stats.wpm_baseline().observations(), 3);
        assert_eq!(stats.presses_seen(), 2);
    }

    #[test]
    fn test_windows_forget_old_events() {
        let mut stats = KeystrokeStats::default();
        apply(&mut stats, &[KeyEvent::press(A, 0.0), KeyEvent::release(A, 0.1)]);

        stats.clean(100.0);
        assert!(stats.key_times().is_empty());
        assert!(stats.hold_times().is_empty());
        // Lifetime state survives eviction
        assert_eq!(stats.hold_times().baseline().unwrap().observations(), 1);
    }
}

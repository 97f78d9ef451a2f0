//! Shared fatigue monitor.
//!
//! The keyboard hook and the periodic sampler both act on one
//! [`KeystrokeStats`]. Every read and write goes through a single mutex so
//! the sampler never observes a half-applied event.

use crate::collector::types::{KeyEvent, MonotonicClock};
use crate::config::{Config, LevelThresholds};
use crate::core::features::{FatigueLevel, FatigueSnapshot};
use crate::core::stats::KeystrokeStats;
use crate::core::windowing::{Sample, WindowedSeries};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Snapshots buffered for the consumer before new ones are dropped.
const SNAPSHOT_BUFFER: usize = 64;

#[derive(Debug)]
struct MonitorState {
    stats: KeystrokeStats,
    /// Sampled fatigue values
    history: WindowedSeries,
    last_level: Option<FatigueLevel>,
}

/// Thread-safe handle to the keystroke statistics and fatigue history.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone)]
pub struct FatigueMonitor {
    state: Arc<Mutex<MonitorState>>,
    clock: MonotonicClock,
    levels: LevelThresholds,
}

impl FatigueMonitor {
    pub fn new(config: &Config, clock: MonotonicClock) -> Self {
        let state = MonitorState {
            stats: KeystrokeStats::new(config.engine.clone()),
            history: WindowedSeries::new(config.history_horizon_secs),
            last_level: None,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
            levels: config.levels,
        }
    }

    // Every mutation is a single-pass numeric update, so state behind a
    // poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> MonotonicClock {
        self.clock
    }

    /// Apply one key event.
    pub fn consume(&self, event: KeyEvent) -> bool {
        self.lock().stats.consume(event)
    }

    /// Compute a snapshot now and record its fatigue in the history.
    pub fn sample(&self) -> FatigueSnapshot {
        let mut state = self.lock();
        // Read the clock under the lock so concurrent samples stay ordered
        let now = self.clock.now();
        self.record(&mut state, now)
    }

    /// Compute a snapshot at `now` and record its fatigue in the history.
    ///
    /// A `now` earlier than the newest history entry is recorded at that
    /// entry's time so the history stays ordered.
    pub fn sample_at(&self, now: f64) -> FatigueSnapshot {
        let mut state = self.lock();
        self.record(&mut state, now)
    }

    fn record(&self, state: &mut MonitorState, now: f64) -> FatigueSnapshot {
        let snapshot = state.stats.scorer_at(now).snapshot(&self.levels);
        let at = state.history.last().map_or(now, |last| now.max(last.timestamp));
        state.history.push_value(at, snapshot.fatigue);

        let previous = state.last_level.replace(snapshot.level);
        if previous.is_some_and(|level| snapshot.level > level) {
            if let Some(advice) = snapshot.level.advice() {
                tracing::warn!(fatigue = snapshot.fatigue, level = %snapshot.level, "{advice}");
            }
        }

        snapshot
    }

    /// Most recently sampled fatigue, 0 before the first sample.
    pub fn latest_fatigue(&self) -> f64 {
        self.lock().history.last().map_or(0.0, |s| s.value)
    }

    /// Sum of the fatigue values still in the history window.
    pub fn fatigue_sum(&self) -> f64 {
        self.lock().history.values().sum()
    }

    /// Retained `(time, fatigue)` samples, oldest first.
    pub fn history(&self) -> Vec<Sample> {
        self.lock().history.iter().copied().collect()
    }

    /// Run `f` with exclusive access to the statistics.
    pub fn with_stats<T>(&self, f: impl FnOnce(&mut KeystrokeStats) -> T) -> T {
        f(&mut self.lock().stats)
    }

    /// Start a thread that samples every `interval` until stopped.
    pub fn spawn_sampler(&self, interval: Duration) -> SamplerHandle {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (snapshot_tx, snapshot_rx) = bounded(SNAPSHOT_BUFFER);
        let monitor = self.clone();

        let handle = thread::spawn(move || {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Fatigue sampler started");
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if snapshot_tx.try_send(monitor.sample()).is_err() {
                            tracing::trace!("Snapshot buffer full, dropping sample");
                        }
                    },
                }
            }
            tracing::info!("Fatigue sampler stopped");
        });

        SamplerHandle {
            stop_tx: Some(stop_tx),
            snapshots: snapshot_rx,
            handle: Some(handle),
        }
    }
}

/// Handle to a running sampler thread. Dropping it stops the sampler.
#[derive(Debug)]
pub struct SamplerHandle {
    stop_tx: Option<Sender<()>>,
    snapshots: Receiver<FatigueSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Snapshots produced by the sampler.
    pub fn receiver(&self) -> &Receiver<FatigueSnapshot> {
        &self.snapshots
    }

    /// Signal the sampler and wait for it to exit.
    pub fn stop(&mut self) {
        // Disconnecting the stop channel wakes the select
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Fatigue sampler thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

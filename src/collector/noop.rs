//! Fallback for platforms without a keyboard hook.
//!
//! This exists so the crate (and binary) compile on targets other than macOS
//! and Windows. Starting it fails; recorded sessions can still be analysed
//! there through [`crate::collector::replay`].

use crate::collector::types::{KeyEvent, MonotonicClock};
use crossbeam_channel::{bounded, Receiver, Sender};

/// Configuration for the keyboard hook.
///
/// Accepted for API parity; no system events are captured.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Capacity of the channel between the hook and the engine
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10_000,
        }
    }
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    Unsupported,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::Unsupported => write!(
                f,
                "Keyboard capture is not supported on this platform; use `breather replay`"
            ),
        }
    }
}

impl std::error::Error for CollectorError {}

/// A collector that never emits events.
pub struct NoopCollector {
    _config: CollectorConfig,
    _clock: MonotonicClock,
    _sender: Sender<KeyEvent>,
    receiver: Receiver<KeyEvent>,
}

impl NoopCollector {
    /// Create a new noop collector.
    pub fn new(config: CollectorConfig, clock: MonotonicClock) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            _config: config,
            _clock: clock,
            _sender: sender,
            receiver,
        }
    }

    /// Always fails: there is no keyboard hook to start.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        tracing::warn!("No keyboard hook on this platform");
        Err(CollectorError::Unsupported)
    }

    pub fn stop(&mut self) {}

    pub fn is_running(&self) -> bool {
        false
    }

    /// Get the receiver for key events.
    pub fn receiver(&self) -> &Receiver<KeyEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<KeyEvent> {
        self.receiver.try_recv().ok()
    }
}

/// There is no permission gate without a hook.
pub fn check_permission() -> bool {
    true
}

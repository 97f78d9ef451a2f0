//! Keyboard event types exchanged between the OS hook and the statistics engine.
//!
//! Only timing is kept, plus enough identity to pair a press with its
//! release and to recognise backspace. Characters are never decoded.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Identifier of a physical key.
///
/// `Code` carries an opaque platform key code; it is only compared for
/// equality so a press can be matched with its release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Backspace,
    Code(u32),
    /// The hook could not identify the key. Ignored by the engine.
    Unknown,
}

impl Key {
    pub fn is_backspace(&self) -> bool {
        matches!(self, Key::Backspace)
    }
}

/// A single key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    /// Whether this is a key press (true) or release (false)
    pub is_press: bool,
    /// Monotonic timestamp in seconds
    pub timestamp: f64,
}

impl KeyEvent {
    pub fn new(key: Key, is_press: bool, timestamp: f64) -> Self {
        Self {
            key,
            is_press,
            timestamp,
        }
    }

    pub fn press(key: Key, timestamp: f64) -> Self {
        Self::new(key, true, timestamp)
    }

    pub fn release(key: Key, timestamp: f64) -> Self {
        Self::new(key, false, timestamp)
    }
}

impl std::fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {} at {:.3}s",
            self.key,
            if self.is_press { "pressed" } else { "released" },
            self.timestamp
        )
    }
}

/// Monotonic time source shared by the collector and the monitor.
///
/// Timestamps are seconds elapsed since the clock was created, so events
/// stamped by the hook and reads issued by the sampler use the same axis.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds since the clock's epoch.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_constructors() {
        let press = KeyEvent::press(Key::Code(4), 1.5);
        assert!(press.is_press);
        assert_eq!(press.timestamp, 1.5);

        let release = KeyEvent::release(Key::Backspace, 2.0);
        assert!(!release.is_press);
        assert!(release.key.is_backspace());
    }

    #[test]
    fn test_key_event_json_shape() {
        let event = KeyEvent::press(Key::Code(30), 0.25);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"key":{"code":30},"is_press":true,"timestamp":0.25}"#);

        let parsed: KeyEvent =
            serde_json::from_str(r#"{"key":"backspace","is_press":false,"timestamp":1.0}"#)
                .unwrap();
        assert_eq!(parsed, KeyEvent::release(Key::Backspace, 1.0));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}

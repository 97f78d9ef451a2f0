//! macOS implementation of event collection using CGEvent tap.
//!
//! This module observes key presses and releases at the system level using
//! macOS's Core Graphics event tap API. It requires Input Monitoring permission.

use crate::collector::types::{Key, KeyEvent, MonotonicClock};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Virtual key code of the Delete (backspace) key.
const KEYCODE_DELETE: i64 = 51;

/// Configuration for the keyboard hook.
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

/// The macOS event collector using CGEvent tap.
pub struct MacOSCollector {
    clock: MonotonicClock,
    sender: Sender<KeyEvent>,
    receiver: Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    /// Create a new macOS collector stamping events with `clock`.
    pub fn new(config: CollectorConfig, clock: MonotonicClock) -> Self {
        // When full, the hook drops events instead of blocking
        let (sender, receiver) = bounded(config.channel_capacity);

        Self {
            clock,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Returns an error if the collector is already running. Tap creation
    /// failures (usually a missing permission) are logged from the hook thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let clock = self.clock;

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone(), clock) {
                tracing::error!("Event loop error: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events. Events already queued are left in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
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

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    PermissionDenied,
    TapCreationFailed,
    RunLoopSourceFailed,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            CollectorError::TapCreationFailed => write!(f, "Failed to create CGEvent tap"),
            CollectorError::RunLoopSourceFailed => {
                write!(f, "Failed to create run loop source")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    sender: Sender<KeyEvent>,
    running: Arc<AtomicBool>,
    clock: MonotonicClock,
) -> Result<(), CollectorError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp],
        move |_proxy, event_type, event| {
            if let Some(key_event) = to_key_event(event_type, event, clock.now()) {
                // Never block the hook; a full channel drops the event
                if sender.try_send(key_event).is_err() {
                    tracing::trace!("Event channel full, dropping {key_event}");
                }
            }
            // Passive observer: the event continues unchanged
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();
    tracing::info!("Keyboard tap enabled");

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    tracing::info!("Keyboard tap stopped");
    Ok(())
}

/// Convert a CGEvent into a [`KeyEvent`].
///
/// Autorepeat key-downs are skipped: a held key counts as a single press.
fn to_key_event(event_type: CGEventType, event: &CGEvent, now: f64) -> Option<KeyEvent> {
    let is_press = match event_type {
        CGEventType::KeyDown => true,
        CGEventType::KeyUp => false,
        _ => return None,
    };

    if is_press && event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0 {
        return None;
    }

    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
    Some(KeyEvent::new(map_keycode(code), is_press, now))
}

fn map_keycode(code: i64) -> Key {
    match code {
        KEYCODE_DELETE => Key::Backspace,
        c if c >= 0 => Key::Code(c as u32),
        _ => Key::Unknown,
    }
}

/// Check if the application has Input Monitoring permission.
///
/// macOS offers no direct query; creating a passive tap fails when the
/// permission is missing.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = MacOSCollector::new(CollectorConfig::default(), MonotonicClock::new());
        assert!(!collector.is_running());
    }

    #[test]
    fn test_keycode_mapping() {
        assert_eq!(map_keycode(51), Key::Backspace);
        assert_eq!(map_keycode(0), Key::Code(0));
        assert_eq!(map_keycode(-1), Key::Unknown);
    }
}

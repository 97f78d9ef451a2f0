//! Windows implementation of event collection using a low-level keyboard hook.
//!
//! The hook runs on a dedicated thread with its own message loop. Only the
//! virtual-key code is read, to pair presses with releases and to recognise
//! backspace.

use crate::collector::types::{Key, KeyEvent, MonotonicClock};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

/// Virtual-key code of Backspace.
const VK_BACK: u32 = 0x08;

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

/// The Windows event collector using a low-level keyboard hook.
pub struct WindowsCollector {
    clock: MonotonicClock,
    sender: Sender<KeyEvent>,
    receiver: Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
    /// Id of the hook thread, 0 while no message loop is running
    hook_thread: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    /// Create a new Windows collector stamping events with `clock`.
    pub fn new(config: CollectorConfig, clock: MonotonicClock) -> Self {
        // When full, the hook drops events instead of blocking
        let (sender, receiver) = bounded(config.channel_capacity);

        Self {
            clock,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            hook_thread: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Returns an error if the collector is already running. Hook
    /// installation failures are logged from the hook thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let hook_thread = self.hook_thread.clone();
        let clock = self.clock;

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, running.clone(), hook_thread, clock) {
                tracing::error!("Hook loop error: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events. Events still queued are not delivered.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        // GetMessageW blocks until a message arrives
        let thread_id = self.hook_thread.swap(0, Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Keyboard hook thread panicked");
            }
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

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    HookInstallationFailed,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::HookInstallationFailed => {
                write!(f, "Failed to install Windows keyboard hook")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

/// State reachable from the hook callback, owned by the hook thread.
struct HookState {
    sender: Sender<KeyEvent>,
    clock: MonotonicClock,
    /// Keys currently down, used to drop autorepeat key-downs
    held: HashSet<u32>,
}

impl HookState {
    fn new(sender: Sender<KeyEvent>, clock: MonotonicClock) -> Self {
        Self {
            sender,
            clock,
            held: HashSet::new(),
        }
    }

    fn observe(&mut self, vk_code: u32, is_press: bool) {
        if let Some(event) = self.to_key_event(vk_code, is_press) {
            // Never block the hook; a full channel drops the event
            if self.sender.try_send(event).is_err() {
                tracing::trace!("Event channel full, dropping {event}");
            }
        }
    }

    /// A held key repeats WM_KEYDOWN; only the first one is a press.
    fn to_key_event(&mut self, vk_code: u32, is_press: bool) -> Option<KeyEvent> {
        if is_press {
            if !self.held.insert(vk_code) {
                return None;
            }
        } else {
            self.held.remove(&vk_code);
        }

        Some(KeyEvent::new(
            map_virtual_key(vk_code),
            is_press,
            self.clock.now(),
        ))
    }
}

thread_local! {
    static HOOK_STATE: RefCell<Option<HookState>> = const { RefCell::new(None) };
}

fn map_virtual_key(vk_code: u32) -> Key {
    match vk_code {
        VK_BACK => Key::Backspace,
        // 0 and 0xFF are not assigned to keys
        0 | 0xFF => Key::Unknown,
        code => Key::Code(code),
    }
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

        let is_press = match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(true),
            WM_KEYUP | WM_SYSKEYUP => Some(false),
            _ => None,
        };

        if let Some(is_press) = is_press {
            HOOK_STATE.with(|state| {
                if let Some(state) = state.borrow_mut().as_mut() {
                    state.observe(kb_struct.vkCode, is_press);
                }
            });
        }
    }

    // Pass the event to the next hook
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook and pump messages until stopped.
fn run_hook_loop(
    sender: Sender<KeyEvent>,
    running: Arc<AtomicBool>,
    hook_thread: Arc<AtomicU32>,
    clock: MonotonicClock,
) -> Result<(), CollectorError> {
    HOOK_STATE.with(|state| {
        *state.borrow_mut() = Some(HookState::new(sender, clock));
    });

    unsafe {
        let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .map_err(|_| CollectorError::HookInstallationFailed)?;
        hook_thread.store(GetCurrentThreadId(), Ordering::SeqCst);
        tracing::info!("Keyboard hook installed");

        // The hook runs inside GetMessageW; WM_QUIT from stop() ends the loop
        let mut msg = MSG::default();
        while running.load(Ordering::SeqCst) {
            if GetMessageW(&mut msg, HWND::default(), 0, 0).0 <= 0 {
                break;
            }
        }

        let _ = UnhookWindowsHookEx(hook);
    }

    HOOK_STATE.with(|state| state.borrow_mut().take());
    tracing::info!("Keyboard hook removed");
    Ok(())
}

/// Check if the application can capture keyboard events.
///
/// Low-level hooks need no explicit permission, but installation can still
/// fail under restricted sessions. A temporary hook is installed to verify.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = WindowsCollector::new(CollectorConfig::default(), MonotonicClock::new());
        assert!(!collector.is_running());
    }

    #[test]
    fn test_virtual_key_mapping() {
        assert_eq!(map_virtual_key(0x08), Key::Backspace);
        assert_eq!(map_virtual_key(0x41), Key::Code(0x41));
        assert_eq!(map_virtual_key(0), Key::Unknown);
    }

    #[test]
    fn test_autorepeat_key_downs_are_dropped() {
        let (sender, receiver) = bounded(16);
        let mut state = HookState::new(sender, MonotonicClock::new());

        state.observe(0x41, true);
        state.observe(0x41, true);
        state.observe(0x41, true);
        state.observe(0x41, false);
        state.observe(0x41, true);

        let events: Vec<KeyEvent> = receiver.try_iter().collect();
        let kinds: Vec<bool> = events.iter().map(|e| e.is_press).collect();
        assert_eq!(kinds, vec![true, false, true]);
        assert!(events.iter().all(|e| e.key == Key::Code(0x41)));
    }

    #[test]
    fn test_full_channel_drops_events() {
        let (sender, receiver) = bounded(1);
        let mut state = HookState::new(sender, MonotonicClock::new());

        state.observe(0x41, true);
        state.observe(0x42, true);

        assert_eq!(receiver.len(), 1);
    }
}

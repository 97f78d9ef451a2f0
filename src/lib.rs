//! Breather - keystroke-dynamics fatigue monitor.
//!
//! This library derives a real-time fatigue signal from how someone types:
//! flight time between keys, hold duration, correction frequency and speed,
//! each compared with a slowly adapting personal baseline.
//!
//! # Privacy Guarantees
//!
//! - **No text**: Characters are never decoded; keys are opaque codes
//! - **Timing only**: Only press/release times and a backspace flag feed the statistics
//! - **No history on disk**: All state lives in memory and ends with the process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Breather Monitor                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│  Keystroke  │──▶│   Fatigue   │       │
//! │  │  (OS hook)  │   │    Stats    │   │   Scorer    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                     windows + baselines      │              │
//! │                                              ▼              │
//! │                                      ┌─────────────┐       │
//! │                                      │   Sampler   │       │
//! │                                      │ (every 5s)  │       │
//! │                                      └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use breather::{Config, FatigueMonitor, Key, KeyEvent, MonotonicClock};
//!
//! let monitor = FatigueMonitor::new(&Config::default(), MonotonicClock::new());
//!
//! monitor.consume(KeyEvent::press(Key::Code(4), 0.0));
//! monitor.consume(KeyEvent::release(Key::Code(4), 0.08));
//! monitor.consume(KeyEvent::press(Key::Code(5), 0.2));
//!
//! let snapshot = monitor.sample_at(0.3);
//! assert!(snapshot.fatigue.is_finite());
//! ```

pub mod collector;
pub mod config;
pub mod core;

// Re-export key types at crate root for convenience
pub use crate::collector::{Collector, CollectorConfig, CollectorError, Key, KeyEvent, MonotonicClock};
pub use crate::config::{Config, ConfigError, EngineConfig, LevelThresholds};
pub use crate::core::{
    FatigueLevel, FatigueMonitor, FatigueScorer, FatigueSnapshot, KeystrokeStats,
    RunningBaseline, SamplerHandle, SeriesError, WindowedSeries,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                BREATHER - PRIVACY DECLARATION                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Breather watches how you type to estimate fatigue.              ║
║                                                                  ║
║  ✓ WHAT WE OBSERVE:                                              ║
║    • When keys are pressed and released (timing only)           ║
║    • Whether a key was backspace                                 ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which characters you type (no passwords, messages, etc.)    ║
║    • What applications you use                                   ║
║    • Any screen content                                          ║
║                                                                  ║
║  Everything stays in memory. Recent timings are kept for 30      ║
║  seconds and nothing is written to disk.                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

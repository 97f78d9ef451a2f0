//! Demonstration of live keystroke capture feeding the fatigue monitor.
//!
//! This example shows how to:
//! 1. Check for Input Monitoring permission
//! 2. Create and start a collector
//! 3. Feed key events into a shared monitor
//! 4. Sample fatigue snapshots on a background thread
//!
//! Run with: cargo run --example capture_demo
//!
//! Note: Requires Input Monitoring permission on macOS.
//! Grant permission in System Settings > Privacy & Security > Input Monitoring

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use breather::{
    collector::{check_permission, Collector, CollectorConfig},
    Config, FatigueMonitor, MonotonicClock, PRIVACY_DECLARATION,
};
use crossbeam_channel::RecvTimeoutError;

fn main() {
    println!("Breather - Capture Demo");
    println!("=======================");
    println!();
    println!("{PRIVACY_DECLARATION}");
    println!();

    print!("Checking Input Monitoring permission... ");
    if check_permission() {
        println!("OK ✓");
    } else {
        println!("FAILED ✗");
        println!();
        println!("Please grant Input Monitoring permission:");
        println!("1. Open System Settings");
        println!("2. Go to Privacy & Security > Input Monitoring");
        println!("3. Add this application");
        println!("4. Restart this demo");
        return;
    }
    println!();

    let clock = MonotonicClock::new();
    let monitor = FatigueMonitor::new(&Config::default(), clock);
    let mut collector = Collector::new(CollectorConfig::default(), clock);

    println!("Starting capture for 30 seconds...");
    println!("Try typing normally!");
    println!();

    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let sampler = monitor.spawn_sampler(Duration::from_secs(5));
    let start = Instant::now();
    let receiver = collector.receiver().clone();
    let mut event_count = 0;

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(30) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                event_count += 1;
                if event_count <= 10 {
                    println!("  {event}");
                }
                monitor.consume(event);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Ok(snapshot) = sampler.receiver().try_recv() {
            println!();
            println!("=== Sample at {:.1}s ===", snapshot.timestamp);
            println!("  Fatigue: {:+.3} ({})", snapshot.fatigue, snapshot.level);
            println!("  Speed: {:.1} wpm (z {:+.2})", snapshot.wpm, snapshot.wpm_zscore);
            println!("  Backspace rate: {:.1}%", snapshot.backspace_rate * 100.0);
            println!("  Hold: {:.0}ms", snapshot.hold_mean * 1000.0);
            println!("  Flight: {:.0}ms", snapshot.flight_mean * 1000.0);
            if let Some(d) = snapshot.latency_fractal_dimension {
                println!("  Latency fractal dimension: {d:.3}");
            }
            println!();
        }
    }

    println!();
    println!("Stopping capture...");
    collector.stop();
    drop(sampler);

    println!();
    println!("=== Summary ===");
    println!("  Events received: {event_count}");
    println!("  Samples taken: {}", monitor.history().len());
    println!("  Latest fatigue: {:.3}", monitor.latest_fatigue());
    println!();
    println!("Demo complete!");
}

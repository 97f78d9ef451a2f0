//! Breather CLI
//!
//! Keystroke-dynamics fatigue monitor.

use anyhow::{bail, Context, Result};
use breather::{
    collector::{check_permission, read_events, Collector, CollectorConfig, SampleSchedule},
    config::Config,
    core::{FatigueMonitor, FatigueSnapshot},
    MonotonicClock, PRIVACY_DECLARATION, VERSION,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use crossbeam_channel::select;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "breather")]
#[command(version = VERSION)]
#[command(about = "Keystroke-dynamics fatigue monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring the keyboard
    Start {
        /// Sampling interval in seconds (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,

        /// Print each sample as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Score a recorded session (JSON lines of key events)
    Replay {
        /// Path to the recorded events
        file: PathBuf,

        /// Also sample every N seconds of recorded time
        #[arg(long)]
        every: Option<f64>,

        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Display privacy declaration
    Privacy,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Start { interval, json } => cmd_start(interval, json),
        Commands::Replay { file, every, json } => cmd_replay(&file, every, json),
        Commands::Config { init } => cmd_config(init),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(interval: Option<u64>, json: bool) -> Result<()> {
    println!("Breather v{VERSION}");
    println!();

    if !check_permission() {
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        bail!("Input Monitoring permission not granted");
    }

    let mut config = Config::load().context("loading configuration")?;
    if let Some(secs) = interval {
        if secs == 0 {
            bail!("--interval must be at least 1 second");
        }
        config.sample_interval = Duration::from_secs(secs);
    }

    println!("Starting monitor...");
    println!("  Sample interval: {}s", config.sample_interval.as_secs());
    println!("  Window: {}s", config.engine.window_horizon_secs);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let clock = MonotonicClock::new();
    let monitor = FatigueMonitor::new(&config, clock);
    let mut collector = Collector::new(CollectorConfig::default(), clock);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("setting Ctrl+C handler")?;

    collector.start().context("starting collector")?;
    let mut sampler = monitor.spawn_sampler(config.sample_interval);

    let events = collector.receiver().clone();
    let snapshots = sampler.receiver().clone();

    while running.load(Ordering::SeqCst) {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    monitor.consume(event);
                }
                Err(_) => {
                    tracing::error!("Collector disconnected unexpectedly");
                    break;
                }
            },
            recv(snapshots) -> snapshot => {
                if let Ok(snapshot) = snapshot {
                    print_snapshot(&snapshot, json, true);
                }
            },
            default(Duration::from_millis(100)) => {}
        }
    }

    println!();
    println!("Stopping monitor...");
    collector.stop();
    sampler.stop();

    let history = monitor.history();
    if !history.is_empty() {
        println!(
            "Last {} samples: latest fatigue {:.2}, total {:.2}",
            history.len(),
            monitor.latest_fatigue(),
            monitor.fatigue_sum()
        );
    }

    Ok(())
}

fn cmd_replay(path: &Path, every: Option<f64>, json: bool) -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let events = read_events(BufReader::new(file))?;
    if events.is_empty() {
        bail!("no events in {path:?}");
    }

    let mut schedule = every
        .map(|step| SampleSchedule::new(events[0].timestamp, step))
        .transpose()
        .context("invalid --every")?;

    let monitor = FatigueMonitor::new(&config, MonotonicClock::new());
    let mut ignored = 0usize;

    for event in &events {
        if let Some(at) = schedule.as_mut().and_then(|s| s.due(event.timestamp)) {
            print_snapshot(&monitor.sample_at(at), json, false);
        }
        if !monitor.consume(*event) {
            ignored += 1;
        }
    }

    let end = events.iter().map(|e| e.timestamp).fold(f64::MIN, f64::max);
    let snapshot = monitor.sample_at(end);

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!();
        println!("Replayed {} events ({ignored} ignored)", events.len());
        print_snapshot(&snapshot, false, false);
        if let Some(advice) = snapshot.level.advice() {
            println!("{advice}");
        }
    }

    Ok(())
}

fn cmd_config(init: bool) -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    if init {
        config.save().context("saving configuration")?;
        println!("Wrote {:?}", Config::config_path());
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

/// Print one sample. Live samples are labelled with the wall clock,
/// replayed ones with their recorded time.
fn print_snapshot(snapshot: &FatigueSnapshot, json: bool, live: bool) {
    if json {
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("Could not serialize snapshot: {e}"),
        }
        return;
    }

    let lifetime_wpm = snapshot
        .lifetime_wpm
        .map_or_else(|| "n/a".to_string(), |w| format!("{w:.1}"));

    let label = if live {
        Local::now().format("%H:%M:%S").to_string()
    } else {
        format!("t={:.1}s", snapshot.timestamp)
    };

    println!(
        "[{}] fatigue {:+.2} ({}) | {:.1} wpm (typical {}) | backspace {:.0}% | hold {:.0}ms | flight {:.0}ms",
        label,
        snapshot.fatigue,
        snapshot.level,
        snapshot.wpm,
        lifetime_wpm,
        snapshot.backspace_rate * 100.0,
        snapshot.hold_mean * 1000.0,
        snapshot.flight_mean * 1000.0,
    );
}

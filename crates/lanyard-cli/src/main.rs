//! Operator CLI for lanyard.
//!
//! One-shot commands over the same core the server hosts: list the
//! backend's active events, flip event activation, run the scan pipeline in
//! the foreground, or drain pending records once.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lanyard_core::{
    DedupWindow, EventAction, EventBackend, HttpBackend, RecordStore, ScanCycleController,
    ScanOutcome, ScannerConfig, SessionHandle, EventSummary, SYNC_RETAIN_TAIL, WINDOW_TTL_MS,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "lanyard", version, about = "BLE attendance scanner operator CLI")]
struct Cli {
    /// Path to config.toml (defaults to the platform config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active events from the backend
    Events,

    /// Activate or deactivate an event on the backend
    Control {
        /// Backend event identifier
        event_id: String,

        /// What to do with it
        #[arg(value_enum)]
        action: CliAction,
    },

    /// Scan for sightings in the foreground until interrupted
    Scan {
        /// Event to attribute sightings to
        #[arg(long)]
        event: String,

        /// Stop after this many seconds (0 = run until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Drain pending records to the backend once
    Sync,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAction {
    Start,
    Stop,
}

impl From<CliAction> for EventAction {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::Start => Self::Start,
            CliAction::Stop => Self::Stop,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => ScannerConfig::default_path()?,
    };
    let config = ScannerConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let backend = Arc::new(HttpBackend::new(&config.backend_base_url, &config.api_key)?);

    match cli.command {
        Commands::Events => list_events(backend.as_ref()).await,
        Commands::Control { event_id, action } => {
            control_event(backend.as_ref(), &event_id, action.into()).await
        }
        Commands::Scan { event, duration } => scan(&config, backend, &event, duration).await,
        Commands::Sync => sync_once(&config, backend.as_ref()).await,
    }
}

async fn list_events(backend: &HttpBackend) -> anyhow::Result<()> {
    let events = backend.active_events().await?;
    if events.is_empty() {
        println!("No active events found.");
        return Ok(());
    }

    println!("Active events:");
    for event in &events {
        print_event(event);
    }
    Ok(())
}

fn print_event(event: &EventSummary) {
    let status = if event.is_active { "active" } else { "inactive" };
    println!("  {} ({status})", event.name);
    println!("    id:    {}", event.id);
    println!(
        "    start: {}   end: {}",
        format_time(event.start_time),
        format_time(event.end_time)
    );
}

fn format_time(ms: Option<u64>) -> String {
    ms.and_then(|ms| chrono::DateTime::from_timestamp_millis(i64::try_from(ms).ok()?))
        .map_or_else(
            || "not set".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        )
}

async fn control_event(
    backend: &HttpBackend,
    event_id: &str,
    action: EventAction,
) -> anyhow::Result<()> {
    let event = backend.event_control(event_id, action).await?;
    println!(
        "Event '{}' is now {}.",
        event.name,
        if event.is_active { "active" } else { "inactive" }
    );
    Ok(())
}

async fn scan(
    config: &ScannerConfig,
    backend: Arc<HttpBackend>,
    event_id: &str,
    duration: u64,
) -> anyhow::Result<()> {
    let session = SessionHandle::new();
    session.select_event(event_id, event_id);
    session.start_scanning()?;

    let store = RecordStore::new(&config.log_path);
    let window = Arc::new(Mutex::new(DedupWindow::new()));

    #[cfg(feature = "bluetooth")]
    let radio = lanyard_core::BleRadio::new()
        .await
        .context("initializing the Bluetooth adapter")?;
    #[cfg(not(feature = "bluetooth"))]
    let radio = {
        tracing::warn!("built without the bluetooth feature; using the mock radio");
        lanyard_core::MockRadio::new()
    };

    let mut controller = ScanCycleController::new(
        radio,
        backend,
        store.clone(),
        session.clone(),
        Arc::clone(&window),
        config,
    );

    println!("Scanning for event '{event_id}'. Press Ctrl-C to stop.");
    let started = tokio::time::Instant::now();
    let mut next_rollover = started + Duration::from_millis(WINDOW_TTL_MS);
    let mut ticker = tokio::time::interval(Duration::from_secs(config.scan_interval_seconds));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {}
        }
        if duration > 0 && started.elapsed() >= Duration::from_secs(duration) {
            break;
        }
        if tokio::time::Instant::now() >= next_rollover {
            window
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .reset();
            next_rollover += Duration::from_millis(WINDOW_TTL_MS);
            println!("Deduplication window rolled over.");
        }

        match controller.run_cycle().await {
            ScanOutcome::Completed { discovered, logged } => {
                println!("Scan cycle: {discovered} devices seen, {logged} logged.");
            }
            ScanOutcome::Aborted => {
                let snapshot = session.snapshot();
                println!(
                    "Scan cycle failed: {}",
                    snapshot.last_error.as_deref().unwrap_or("unknown error")
                );
            }
            ScanOutcome::Skipped => {}
        }
    }

    let snapshot = session.snapshot();
    println!(
        "Stopped. {} cycles, {} records logged, log at {}.",
        snapshot.total_scans,
        snapshot.records_logged,
        config.log_path.display()
    );
    Ok(())
}

async fn sync_once(config: &ScannerConfig, backend: &HttpBackend) -> anyhow::Result<()> {
    let store = RecordStore::new(&config.log_path);
    let records = store.read_all()?;
    if records.is_empty() {
        println!("No records to sync.");
        return Ok(());
    }

    let outcome = backend.batch_checkin(&records).await?;
    println!(
        "Synced: processed={} successful={} duplicates={} errors={}",
        outcome.processed, outcome.successful, outcome.duplicates, outcome.errors
    );
    store.truncate_to_tail(SYNC_RETAIN_TAIL)?;
    Ok(())
}

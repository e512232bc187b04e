//! # lanyard-server
//!
//! Hosts the BLE attendance pipeline: the scan loop, the sync loop, the
//! dedup-window rollover and the HTTP control surface.
//!
//! ## Running
//!
//! ```bash
//! # Development (pretty logs, config from the user config dir)
//! cargo run --package lanyard-server
//!
//! # Production (on the scanner unit)
//! LANYARD_ENV=production LANYARD_CONFIG=/etc/lanyard/config.toml ./lanyard-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use lanyard_core::{
    DedupWindow, HttpBackend, RecordStore, ScanCycleController, ScannerConfig, SessionHandle,
    SyncController, WINDOW_TTL_MS,
};
use lanyard_server::{api, logging, state::AppState, workers};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("LANYARD_ENV").is_ok_and(|v| v == "production");
    logging::init(is_production)?;

    let run_id = uuid::Uuid::new_v4();
    info!(%run_id, version = env!("CARGO_PKG_VERSION"), "starting lanyard-server");

    let config_path = match std::env::var_os("LANYARD_CONFIG") {
        Some(path) => PathBuf::from(path),
        None => ScannerConfig::default_path()?,
    };
    let config = ScannerConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!(path = %config_path.display(), scanner = %config.scanner_id, "configuration loaded");

    let session = SessionHandle::new();
    let store = RecordStore::new(&config.log_path);
    let backend = Arc::new(HttpBackend::new(&config.backend_base_url, &config.api_key)?);
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

    let scan_controller = ScanCycleController::new(
        radio,
        Arc::clone(&backend),
        store.clone(),
        session.clone(),
        Arc::clone(&window),
        &config,
    );
    let sync_controller = SyncController::new(Arc::clone(&backend), store.clone(), session.clone());

    workers::spawn_scan_loop(
        scan_controller,
        Duration::from_secs(config.scan_interval_seconds),
    );
    workers::spawn_sync_loop(
        sync_controller,
        Duration::from_secs(config.sync_interval_seconds),
    );
    workers::spawn_window_rollover(window, Duration::from_millis(WINDOW_TTL_MS));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let state = AppState::new(config_path, config, session, store, backend);
    let app = api::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    // An in-flight sync POST abandoned here is safe: the store is only
    // mutated after a confirmed response.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lanyard-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

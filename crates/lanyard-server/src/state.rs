//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use lanyard_core::{HttpBackend, RecordStore, ScannerConfig, SessionHandle};
use tokio::sync::RwLock;

/// Shared application state handed to every handler.
pub type SharedState = Arc<AppState>;

/// Everything the control surface needs to answer requests.
///
/// The worker loops do not go through this state; they were built over the
/// same session handle, store and backend at startup, so control-surface
/// reads never block on a loop's I/O.
pub struct AppState {
    /// Where the active configuration was loaded from (and is saved to).
    pub config_path: PathBuf,

    /// Active configuration. Updates are persisted immediately; fields the
    /// workers captured at startup take effect on restart.
    pub config: RwLock<ScannerConfig>,

    /// Session state shared with the scan and sync loops.
    pub session: SessionHandle,

    /// The record store, for pending-count reporting.
    pub store: RecordStore,

    /// Backend client, for event listing and activation control.
    pub backend: Arc<HttpBackend>,
}

impl AppState {
    /// Assemble the shared state.
    #[must_use]
    pub fn new(
        config_path: PathBuf,
        config: ScannerConfig,
        session: SessionHandle,
        store: RecordStore,
        backend: Arc<HttpBackend>,
    ) -> SharedState {
        Arc::new(Self {
            config_path,
            config: RwLock::new(config),
            session,
            store,
            backend,
        })
    }
}

//! Event session state: the single mutable hub the pipeline reads and
//! mutates.
//!
//! Three logical actors share this state: the scan loop, the sync loop and
//! the control surface. Every mutation is one atomic operation behind the
//! handle's mutex, and reads go through a point-in-time [`SessionSnapshot`].
//! Gate checks ("is scanning, event selected") are therefore allowed to go
//! stale immediately after they are taken; the next tick simply re-evaluates.
//!
//! The session is never persisted. A restart loses the counters but not the
//! record store contents.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{LanyardError, Result};

#[derive(Debug, Default)]
struct EventSession {
    selected_event_id: String,
    selected_event_name: String,
    is_scanning: bool,
    is_event_active: bool,
    total_scans: u64,
    devices_found: u64,
    records_logged: u64,
    records_synced: u64,
    last_sync_ms: Option<u64>,
    last_error: Option<String>,
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionSnapshot {
    /// Selected event id; empty means no event selected.
    pub selected_event_id: String,
    /// Selected event display name.
    pub selected_event_name: String,
    /// Whether the background loops are collecting.
    pub is_scanning: bool,
    /// Backend-side activation state; may lag `is_scanning` when the
    /// backend rejects activation.
    pub is_event_active: bool,
    /// Scan cycles that passed the gate.
    pub total_scans: u64,
    /// Sightings returned by discovery, before filtering.
    pub devices_found: u64,
    /// Records appended to the store.
    pub records_logged: u64,
    /// Records the backend has accepted.
    pub records_synced: u64,
    /// When the last successful sync completed, ms since epoch.
    pub last_sync_ms: Option<u64>,
    /// Most recent background failure, cleared by a successful sync.
    pub last_error: Option<String>,
}

/// Cheaply clonable handle over the shared session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<EventSession>>,
}

impl SessionHandle {
    /// Fresh session: nothing selected, nothing counted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EventSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select an event. Forces scanning off and clears backend activation:
    /// switching events must never keep collecting under the old context.
    pub fn select_event(&self, event_id: &str, event_name: &str) {
        let mut session = self.lock();
        session.selected_event_id = event_id.to_string();
        session.selected_event_name = event_name.to_string();
        session.is_scanning = false;
        session.is_event_active = false;
    }

    /// Start collecting for the selected event.
    ///
    /// # Errors
    ///
    /// [`LanyardError::NoEventSelected`] when no event is selected.
    pub fn start_scanning(&self) -> Result<()> {
        let mut session = self.lock();
        if session.selected_event_id.is_empty() {
            return Err(LanyardError::NoEventSelected);
        }
        session.is_scanning = true;
        Ok(())
    }

    /// Stop collecting. Counters and the record store are untouched; only
    /// in-flight collection halts, at the next cycle boundary.
    ///
    /// # Errors
    ///
    /// [`LanyardError::NotScanning`] when already stopped.
    pub fn stop_scanning(&self) -> Result<()> {
        let mut session = self.lock();
        if !session.is_scanning {
            return Err(LanyardError::NotScanning);
        }
        session.is_scanning = false;
        Ok(())
    }

    /// Record the backend's activation state for the selected event.
    pub fn set_event_active(&self, active: bool) {
        self.lock().is_event_active = active;
    }

    /// Count one scan cycle that passed the gate.
    pub fn record_scan(&self) {
        self.lock().total_scans += 1;
    }

    /// Count sightings returned by a discovery pass.
    pub fn add_devices_found(&self, n: u64) {
        self.lock().devices_found += n;
    }

    /// Count records appended to the store.
    pub fn add_records_logged(&self, n: u64) {
        self.lock().records_logged += n;
    }

    /// Count records accepted by the backend and stamp the sync time.
    pub fn add_records_synced(&self, n: u64, now_ms: u64) {
        let mut session = self.lock();
        session.records_synced += n;
        session.last_sync_ms = Some(now_ms);
    }

    /// Surface a background failure.
    pub fn set_error(&self, message: impl Into<String>) {
        self.lock().last_error = Some(message.into());
    }

    /// Clear the surfaced failure, typically after a successful sync.
    pub fn clear_error(&self) {
        self.lock().last_error = None;
    }

    /// Point-in-time copy of the whole session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock();
        SessionSnapshot {
            selected_event_id: session.selected_event_id.clone(),
            selected_event_name: session.selected_event_name.clone(),
            is_scanning: session.is_scanning,
            is_event_active: session.is_event_active,
            total_scans: session.total_scans,
            devices_found: session.devices_found,
            records_logged: session.records_logged,
            records_synced: session.records_synced,
            last_sync_ms: session.last_sync_ms,
            last_error: session.last_error.clone(),
        }
    }
}

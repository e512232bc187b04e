//! Sync controller: drains the record store to the backend.
//!
//! Runs on its own interval, independent of scan cycles. One cycle is
//! strictly read → batch → send → trim; the store is only mutated after a
//! confirmed response, so an abandoned in-flight post at shutdown cannot
//! lose or corrupt records. Failed syncs are never dropped, only delayed to
//! the next tick.
//!
//! Trimming keeps the last [`SYNC_RETAIN_TAIL`] records by count, not by
//! acknowledged identity. After a crash between accept and trim the same
//! records are resent and the backend deduplicates them; the store is never
//! shrunk below what the backend has accepted.

use std::sync::Arc;

use crate::backend::EventBackend;
use crate::session::SessionHandle;
use crate::store::RecordStore;
use crate::types::{epoch_ms, BatchOutcome};

/// Records kept after a successful sync, as a replay/debugging buffer.
pub const SYNC_RETAIN_TAIL: usize = 100;

/// What one sync cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Gate closed: not scanning or no event selected.
    Skipped,
    /// Nothing pending; no request was made.
    Idle,
    /// The backend accepted the batch.
    Synced(BatchOutcome),
    /// The attempt failed; the store is untouched and the next tick
    /// retries.
    Failed,
}

/// Periodically posts pending records in one batch.
pub struct SyncController<B> {
    backend: Arc<B>,
    store: RecordStore,
    session: SessionHandle,
    retain_tail: usize,
}

impl<B: EventBackend> SyncController<B> {
    /// Controller with the standard retention tail of [`SYNC_RETAIN_TAIL`].
    pub fn new(backend: Arc<B>, store: RecordStore, session: SessionHandle) -> Self {
        Self {
            backend,
            store,
            session,
            retain_tail: SYNC_RETAIN_TAIL,
        }
    }

    /// Override the retention tail.
    #[must_use]
    pub fn with_retain_tail(mut self, retain_tail: usize) -> Self {
        self.retain_tail = retain_tail;
        self
    }

    /// Run one cycle. Never returns an error: all failures are converted to
    /// session state at this boundary.
    pub async fn run_cycle(&mut self) -> SyncOutcome {
        let snapshot = self.session.snapshot();
        if !snapshot.is_scanning || snapshot.selected_event_id.is_empty() {
            return SyncOutcome::Skipped;
        }

        let records = match self.store.read_all() {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(%err, "failed to read pending records");
                self.session.set_error(err.to_string());
                return SyncOutcome::Failed;
            }
        };
        if records.is_empty() {
            return SyncOutcome::Idle;
        }

        match self.backend.batch_checkin(&records).await {
            Ok(outcome) => {
                self.session
                    .add_records_synced(u64::from(outcome.successful), epoch_ms());
                self.session.clear_error();
                tracing::info!(
                    processed = outcome.processed,
                    successful = outcome.successful,
                    duplicates = outcome.duplicates,
                    errors = outcome.errors,
                    "batch sync accepted"
                );
                if let Err(err) = self.store.truncate_to_tail(self.retain_tail) {
                    tracing::error!(%err, "failed to trim record store after sync");
                    self.session.set_error(err.to_string());
                }
                SyncOutcome::Synced(outcome)
            }
            Err(err) => {
                tracing::warn!(%err, pending = records.len(), "batch sync failed, will retry");
                self.session.set_error(err.to_string());
                SyncOutcome::Failed
            }
        }
    }
}

//! Background worker loops.
//!
//! Three independent periodic tasks: the scan loop, the sync loop and the
//! dedup-window rollover. Each has its own cadence and its own bounded
//! per-iteration timeout inside the controller, so a slow backend call
//! never serializes with a discovery pass. Session-state transitions from
//! the control surface take effect at the next cycle boundary; nothing here
//! is preempted mid-cycle.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lanyard_core::{
    DedupWindow, EventBackend, RadioSource, ScanCycleController, ScanOutcome, SyncController,
    SyncOutcome,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the scan loop: one cycle per `period`.
pub fn spawn_scan_loop<R, B>(
    mut controller: ScanCycleController<R, B>,
    period: Duration,
) -> JoinHandle<()>
where
    R: RadioSource + 'static,
    B: EventBackend + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match controller.run_cycle().await {
                ScanOutcome::Skipped => {}
                ScanOutcome::Aborted => {
                    tracing::debug!("scan cycle aborted; retrying next tick");
                }
                ScanOutcome::Completed { discovered, logged } => {
                    tracing::debug!(discovered, logged, "scan cycle completed");
                }
            }
        }
    })
}

/// Spawn the sync loop: one attempt per `period`. A failed attempt retries
/// on the same cadence, never faster.
pub fn spawn_sync_loop<B>(mut controller: SyncController<B>, period: Duration) -> JoinHandle<()>
where
    B: EventBackend + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match controller.run_cycle().await {
                SyncOutcome::Skipped | SyncOutcome::Idle => {}
                SyncOutcome::Synced(outcome) => {
                    tracing::debug!(successful = outcome.successful, "sync cycle completed");
                }
                SyncOutcome::Failed => {
                    tracing::debug!("sync cycle failed; retrying next tick");
                }
            }
        }
    })
}

/// Spawn the dedup-window rollover: an unconditional clear every `period`,
/// independent of scan cycle timing. Long-parked devices are deliberately
/// re-logged after each rollover.
pub fn spawn_window_rollover(
    window: Arc<Mutex<DedupWindow>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of a tokio interval fires immediately; skip it so
        // the first clear happens one full period in
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut window = window.lock().unwrap_or_else(PoisonError::into_inner);
            let dropped = window.tracked();
            window.reset();
            drop(window);
            tracing::debug!(dropped, "dedup window rolled over");
        }
    })
}

//! Scan cycle controller.
//!
//! One cycle runs discovery, filters the sightings and appends the accepted
//! ones to the record store: Idle → Discovering → Filtering → Logging →
//! Idle. Failures never escape a cycle; they become session state
//! (`last_error`) and the outer scheduler retries on the next tick.
//!
//! Filtering order is load-bearing: the prefix allowlist and the
//! registration filter run before the dedup window is consulted, so a
//! rejected device never consumes a dedup slot.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::EventBackend;
use crate::bluetooth::RadioSource;
use crate::config::ScannerConfig;
use crate::dedup::DedupWindow;
use crate::registration::{RefreshOutcome, RegistrationFilter};
use crate::session::SessionHandle;
use crate::store::RecordStore;
use crate::types::{epoch_ms, AttendanceRecord, DeviceSighting};

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Gate closed: not scanning or no event selected.
    Skipped,
    /// The cycle started but could not reach the logging step; the failure
    /// is recorded on the session and the next tick retries.
    Aborted,
    /// Discovery and logging ran.
    Completed {
        /// Sightings returned by discovery, before filtering.
        discovered: usize,
        /// Records appended to the store.
        logged: usize,
    },
}

/// Orchestrates one discovery pass per tick.
pub struct ScanCycleController<R, B> {
    radio: R,
    backend: Arc<B>,
    store: RecordStore,
    session: SessionHandle,
    window: Arc<Mutex<DedupWindow>>,
    registration: RegistrationFilter,
    scanner_id: String,
    id_prefix: String,
    discovery_timeout: Duration,
    active_event: Option<String>,
}

impl<R: RadioSource, B: EventBackend> ScanCycleController<R, B> {
    /// Build a controller over the shared pipeline pieces.
    ///
    /// The dedup window is shared so the periodic rollover task can clear
    /// it independently of cycle timing.
    pub fn new(
        radio: R,
        backend: Arc<B>,
        store: RecordStore,
        session: SessionHandle,
        window: Arc<Mutex<DedupWindow>>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            radio,
            backend,
            store,
            session,
            window,
            registration: RegistrationFilter::new(),
            scanner_id: config.scanner_id.clone(),
            id_prefix: config.uuid_prefix.clone(),
            discovery_timeout: Duration::from_secs(config.scan_interval_seconds),
            active_event: None,
        }
    }

    /// Run one cycle. Never returns an error: all failures are converted to
    /// session state at this boundary.
    pub async fn run_cycle(&mut self) -> ScanOutcome {
        let snapshot = self.session.snapshot();
        if !snapshot.is_scanning || snapshot.selected_event_id.is_empty() {
            return ScanOutcome::Skipped;
        }
        let event_id = snapshot.selected_event_id;

        // The caches are scoped to one event; a selection change since the
        // last cycle invalidates both.
        if self.active_event.as_deref() != Some(event_id.as_str()) {
            self.lock_window().reset();
            self.registration.invalidate();
            self.active_event = Some(event_id.clone());
        }

        self.session.record_scan();

        match self.registration.refresh(self.backend.as_ref(), &event_id).await {
            RefreshOutcome::Fresh { count } => {
                tracing::debug!(event = %event_id, registered = count, "registration list refreshed");
            }
            RefreshOutcome::Stale => {
                if !self.registration.is_ready() {
                    // A failed fetch with nothing cached must not fall
                    // through to logging with an empty set.
                    self.session.set_error(format!(
                        "registration list unavailable for event '{event_id}'"
                    ));
                    return ScanOutcome::Aborted;
                }
                tracing::warn!(event = %event_id, "scanning against stale registration list");
            }
        }

        let discovered = match self.radio.discover(self.discovery_timeout).await {
            Ok(sightings) => sightings,
            Err(err) => {
                tracing::warn!(%err, "discovery pass failed");
                self.session.set_error(err.to_string());
                return ScanOutcome::Aborted;
            }
        };

        self.session.add_devices_found(discovered.len() as u64);

        let now_ms = epoch_ms();
        let mut logged: u64 = 0;
        for sighting in &discovered {
            let Some(device_id) = device_identifier(sighting) else {
                continue;
            };
            if !self.id_prefix.is_empty() && !device_id.starts_with(&self.id_prefix) {
                continue;
            }
            if !self.registration.is_registered(&device_id) {
                continue;
            }
            if !self.lock_window().should_accept(&device_id, now_ms) {
                continue;
            }

            let record = AttendanceRecord {
                device_id: device_id.clone(),
                timestamp_ms: now_ms,
                event_id: event_id.clone(),
                scanner_source: self.scanner_id.clone(),
                signal_strength: sighting.rssi,
                device_name: sighting.name.clone(),
            };
            if let Err(err) = self.store.append(&record) {
                tracing::error!(%err, device = %device_id, "failed to append record");
                self.session.set_error(err.to_string());
                // Release the slot so the device is retried next cycle
                // instead of being suppressed for a full TTL.
                self.lock_window().forget(&device_id);
                break;
            }
            logged += 1;
            tracing::info!(device = %device_id, event = %event_id, "logged sighting");
        }

        self.session.add_records_logged(logged);
        ScanOutcome::Completed {
            discovered: discovered.len(),
            logged: usize::try_from(logged).unwrap_or(usize::MAX),
        }
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, DedupWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Logical identifier of a sighting: the advertised name when present,
/// otherwise the hardware address, so every candidate has a non-empty
/// identifier. `None` only for a sighting with neither.
fn device_identifier(sighting: &DeviceSighting) -> Option<String> {
    let name = sighting.name.as_deref().map(str::trim).unwrap_or("");
    if !name.is_empty() {
        return Some(name.to_string());
    }
    let address = sighting.address.trim();
    if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::MockRadio;
    use crate::error::{LanyardError, Result};
    use crate::types::{BatchOutcome, EventAction, EventSummary};
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    struct StubBackend {
        devices: std::sync::Mutex<Option<Vec<String>>>,
    }

    impl StubBackend {
        fn serving(devices: &[&str]) -> Self {
            Self {
                devices: std::sync::Mutex::new(Some(
                    devices.iter().map(ToString::to_string).collect(),
                )),
            }
        }

        fn offline() -> Self {
            Self {
                devices: std::sync::Mutex::new(None),
            }
        }

        fn set_devices(&self, devices: Option<Vec<String>>) {
            *self.devices.lock().unwrap() = devices;
        }
    }

    impl EventBackend for StubBackend {
        async fn active_events(&self) -> Result<Vec<EventSummary>> {
            Ok(Vec::new())
        }

        async fn registered_devices(&self, _event_id: &str) -> Result<HashSet<String>> {
            self.devices
                .lock()
                .unwrap()
                .clone()
                .map(|v| v.into_iter().collect())
                .ok_or_else(|| LanyardError::BackendUnreachable("stub offline".into()))
        }

        async fn batch_checkin(&self, _records: &[AttendanceRecord]) -> Result<BatchOutcome> {
            Ok(BatchOutcome::default())
        }

        async fn event_control(
            &self,
            event_id: &str,
            action: EventAction,
        ) -> Result<EventSummary> {
            Ok(EventSummary {
                id: event_id.into(),
                name: String::new(),
                is_active: matches!(action, EventAction::Start),
                start_time: None,
                end_time: None,
            })
        }
    }

    struct FailingRadio;

    impl RadioSource for FailingRadio {
        async fn discover(&mut self, _timeout: Duration) -> Result<Vec<DeviceSighting>> {
            Err(LanyardError::DiscoveryFailed("hci timeout".into()))
        }
    }

    fn sighting(address: &str, name: Option<&str>) -> DeviceSighting {
        DeviceSighting {
            address: address.into(),
            name: name.map(Into::into),
            rssi: Some(-60),
        }
    }

    fn test_config(prefix: &str) -> ScannerConfig {
        let mut config: ScannerConfig = toml::from_str(
            "backend_base_url = \"https://backend.example\"\napi_key = \"secret\"\n",
        )
        .unwrap();
        config.uuid_prefix = prefix.into();
        config
    }

    struct Rig {
        _dir: TempDir,
        store: RecordStore,
        session: SessionHandle,
        window: Arc<Mutex<DedupWindow>>,
        backend: Arc<StubBackend>,
    }

    fn rig(backend: StubBackend) -> Rig {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("log.jsonl"));
        let session = SessionHandle::new();
        session.select_event("evt_1", "Opening Night");
        session.start_scanning().unwrap();
        Rig {
            _dir: dir,
            store,
            session,
            window: Arc::new(Mutex::new(DedupWindow::new())),
            backend: Arc::new(backend),
        }
    }

    fn controller<R: RadioSource>(
        rig: &Rig,
        radio: R,
        prefix: &str,
    ) -> ScanCycleController<R, StubBackend> {
        ScanCycleController::new(
            radio,
            Arc::clone(&rig.backend),
            rig.store.clone(),
            rig.session.clone(),
            Arc::clone(&rig.window),
            &test_config(prefix),
        )
    }

    #[tokio::test]
    async fn gate_closed_means_noop() {
        let rig = rig(StubBackend::serving(&["dev-a"]));
        rig.session.stop_scanning().unwrap();
        let mut ctl = controller(&rig, MockRadio::new(), "");

        assert_eq!(ctl.run_cycle().await, ScanOutcome::Skipped);
        let snap = rig.session.snapshot();
        assert_eq!(snap.total_scans, 0);
        assert_eq!(rig.store.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn only_registered_devices_are_logged() {
        // registration {A, B}, discovery [A, C] => only A
        let rig = rig(StubBackend::serving(&["ATT-A", "ATT-B"]));
        let radio = MockRadio::with_batches(vec![vec![
            sighting("AA:00", Some("ATT-A")),
            sighting("AA:01", Some("ATT-C")),
        ]]);
        let mut ctl = controller(&rig, radio, "");

        let outcome = ctl.run_cycle().await;
        assert_eq!(
            outcome,
            ScanOutcome::Completed {
                discovered: 2,
                logged: 1
            }
        );

        let records = rig.store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "ATT-A");
        assert_eq!(records[0].event_id, "evt_1");

        let snap = rig.session.snapshot();
        assert_eq!(snap.total_scans, 1);
        assert_eq!(snap.devices_found, 2);
        assert_eq!(snap.records_logged, 1);
    }

    #[tokio::test]
    async fn repeat_sighting_within_ttl_logs_once() {
        let rig = rig(StubBackend::serving(&["ATT-A"]));
        let radio = MockRadio::with_batches(vec![
            vec![sighting("AA:00", Some("ATT-A"))],
            vec![sighting("AA:00", Some("ATT-A"))],
        ]);
        let mut ctl = controller(&rig, radio, "");

        ctl.run_cycle().await;
        ctl.run_cycle().await;

        assert_eq!(rig.store.pending_count().unwrap(), 1);
        assert_eq!(rig.session.snapshot().records_logged, 1);
    }

    #[tokio::test]
    async fn prefix_allowlist_rejects_before_anything_else() {
        let rig = rig(StubBackend::serving(&["ATT-A", "GUEST-B"]));
        let radio = MockRadio::with_batches(vec![vec![
            sighting("AA:00", Some("ATT-A")),
            sighting("AA:01", Some("GUEST-B")),
        ]]);
        let mut ctl = controller(&rig, radio, "ATT-");

        ctl.run_cycle().await;

        let records = rig.store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "ATT-A");
    }

    #[tokio::test]
    async fn nameless_device_falls_back_to_address() {
        let rig = rig(StubBackend::serving(&["AA:BB:CC:00:11:22"]));
        let radio = MockRadio::with_batches(vec![vec![sighting("AA:BB:CC:00:11:22", None)]]);
        let mut ctl = controller(&rig, radio, "");

        ctl.run_cycle().await;

        let records = rig.store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "AA:BB:CC:00:11:22");
        assert_eq!(records[0].device_name, None);
    }

    #[tokio::test]
    async fn rejected_device_does_not_consume_a_dedup_slot() {
        // C is not registered on the first pass, becomes registered on the
        // second; it must be logged then, within the TTL of the first pass.
        let rig = rig(StubBackend::serving(&["ATT-A"]));
        let radio = MockRadio::with_batches(vec![
            vec![sighting("AA:01", Some("ATT-C"))],
            vec![sighting("AA:01", Some("ATT-C"))],
        ]);
        let mut ctl = controller(&rig, radio, "");

        ctl.run_cycle().await;
        assert_eq!(rig.store.pending_count().unwrap(), 0);

        rig.backend
            .set_devices(Some(vec!["ATT-A".into(), "ATT-C".into()]));
        ctl.run_cycle().await;

        let records = rig.store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "ATT-C");
    }

    #[tokio::test]
    async fn discovery_failure_aborts_without_counting_devices() {
        let rig = rig(StubBackend::serving(&["ATT-A"]));
        let mut ctl = controller(&rig, FailingRadio, "");

        assert_eq!(ctl.run_cycle().await, ScanOutcome::Aborted);

        let snap = rig.session.snapshot();
        assert_eq!(snap.total_scans, 1);
        assert_eq!(snap.devices_found, 0);
        assert_eq!(snap.records_logged, 0);
        assert!(snap.last_error.unwrap().contains("hci timeout"));
    }

    #[tokio::test]
    async fn registration_outage_with_no_cache_skips_logging_entirely() {
        let rig = rig(StubBackend::offline());
        let radio = MockRadio::with_batches(vec![vec![sighting("AA:00", Some("ATT-A"))]]);
        let mut ctl = controller(&rig, radio, "");

        assert_eq!(ctl.run_cycle().await, ScanOutcome::Aborted);
        assert_eq!(rig.store.pending_count().unwrap(), 0);
        assert!(rig
            .session
            .snapshot()
            .last_error
            .unwrap()
            .contains("registration list unavailable"));
    }

    #[tokio::test]
    async fn registration_outage_with_a_cache_scans_against_stale_set() {
        let rig = rig(StubBackend::serving(&["ATT-A"]));
        let radio = MockRadio::with_batches(vec![
            vec![],
            vec![sighting("AA:00", Some("ATT-A"))],
        ]);
        let mut ctl = controller(&rig, radio, "");

        ctl.run_cycle().await; // warm the cache
        rig.backend.set_devices(None);
        let outcome = ctl.run_cycle().await;

        assert_eq!(
            outcome,
            ScanOutcome::Completed {
                discovered: 1,
                logged: 1
            }
        );
    }

    #[tokio::test]
    async fn event_switch_resets_window_and_registration() {
        let rig = rig(StubBackend::serving(&["ATT-A"]));
        let radio = MockRadio::with_batches(vec![
            vec![sighting("AA:00", Some("ATT-A"))],
            vec![sighting("AA:00", Some("ATT-A"))],
        ]);
        let mut ctl = controller(&rig, radio, "");

        ctl.run_cycle().await;
        assert_eq!(rig.store.pending_count().unwrap(), 1);

        // same device, new event: the suppression from evt_1 must not carry
        rig.session.select_event("evt_2", "Closing Night");
        rig.session.start_scanning().unwrap();
        ctl.run_cycle().await;

        let records = rig.store.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].event_id, "evt_2");
    }

    #[tokio::test]
    async fn store_failure_sets_error_and_releases_the_slot() {
        let dir = tempdir().unwrap();
        // the store path is a directory: every append fails
        let store = RecordStore::new(dir.path());
        let session = SessionHandle::new();
        session.select_event("evt_1", "Opening Night");
        session.start_scanning().unwrap();
        let window = Arc::new(Mutex::new(DedupWindow::new()));
        let backend = Arc::new(StubBackend::serving(&["ATT-A"]));

        let radio = MockRadio::with_batches(vec![vec![sighting("AA:00", Some("ATT-A"))]]);
        let mut ctl = ScanCycleController::new(
            radio,
            Arc::clone(&backend),
            store,
            session.clone(),
            Arc::clone(&window),
            &test_config(""),
        );

        let outcome = ctl.run_cycle().await;
        assert_eq!(
            outcome,
            ScanOutcome::Completed {
                discovered: 1,
                logged: 0
            }
        );
        assert!(session.snapshot().last_error.is_some());
        // the slot was released, so the next cycle can retry the device
        assert_eq!(window.lock().unwrap().tracked(), 0);
    }

    #[test]
    fn identifier_prefers_name_over_address() {
        let with_name = sighting("AA:00", Some("ATT-A"));
        assert_eq!(device_identifier(&with_name).as_deref(), Some("ATT-A"));

        let nameless = sighting("AA:00", None);
        assert_eq!(device_identifier(&nameless).as_deref(), Some("AA:00"));

        let blank_name = sighting("AA:00", Some("   "));
        assert_eq!(device_identifier(&blank_name).as_deref(), Some("AA:00"));

        let nothing = DeviceSighting {
            address: String::new(),
            name: None,
            rssi: None,
        };
        assert_eq!(device_identifier(&nothing), None);
    }
}

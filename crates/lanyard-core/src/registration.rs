//! Per-event registration filter.
//!
//! Only devices registered for the selected event may be logged. The filter
//! caches the backend's registration list and is refreshed each scan cycle.
//! A failed fetch keeps the previous cache (stale but usable); until at
//! least one fetch has succeeded the filter is not ready and the scan cycle
//! must skip logging entirely, so a backend outage can never silently turn
//! into "accept everything".

use std::collections::HashSet;

use crate::backend::EventBackend;

/// Result of one refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The backend answered; the cache now holds the current set.
    Fresh {
        /// Number of registered identifiers fetched.
        count: usize,
    },
    /// The fetch failed; whatever was cached before (possibly nothing)
    /// is retained.
    Stale,
}

/// Cached set of device identifiers registered for one event.
///
/// Read-only from the scan cycle's point of view: the cycle tests
/// membership, it never mutates the set.
#[derive(Debug, Default)]
pub struct RegistrationFilter {
    registered: Option<HashSet<String>>,
}

impl RegistrationFilter {
    /// Empty filter; not ready until the first successful refresh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the current registration list for `event_id`.
    ///
    /// Network failure is non-fatal: the previous cache is kept unchanged
    /// and [`RefreshOutcome::Stale`] is returned for the caller to decide
    /// what the cycle does with it.
    pub async fn refresh<B: EventBackend>(
        &mut self,
        backend: &B,
        event_id: &str,
    ) -> RefreshOutcome {
        match backend.registered_devices(event_id).await {
            Ok(set) => {
                let count = set.len();
                self.registered = Some(set);
                RefreshOutcome::Fresh { count }
            }
            Err(err) => {
                tracing::warn!(event = %event_id, %err, "registration fetch failed, keeping cached set");
                RefreshOutcome::Stale
            }
        }
    }

    /// Whether at least one fetch has ever succeeded for the current event.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.registered.is_some()
    }

    /// Membership test against the cached set. An empty cached set rejects
    /// everything: zero registrations is a valid state, not a wildcard.
    #[must_use]
    pub fn is_registered(&self, device_id: &str) -> bool {
        self.registered
            .as_ref()
            .is_some_and(|set| set.contains(device_id))
    }

    /// Number of cached identifiers, if a fetch has succeeded.
    #[must_use]
    pub fn registered_count(&self) -> Option<usize> {
        self.registered.as_ref().map(HashSet::len)
    }

    /// Drop the cache. Invoked when the selected event changes.
    pub fn invalidate(&mut self) {
        self.registered = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LanyardError, Result};
    use crate::types::{AttendanceRecord, BatchOutcome, EventAction, EventSummary};
    use std::sync::Mutex;

    /// Backend stub whose registration endpoint can be flipped between a
    /// fixed answer and an outage.
    struct StubBackend {
        devices: Mutex<Option<Vec<String>>>,
    }

    impl StubBackend {
        fn serving(devices: &[&str]) -> Self {
            Self {
                devices: Mutex::new(Some(devices.iter().map(ToString::to_string).collect())),
            }
        }

        fn offline() -> Self {
            Self {
                devices: Mutex::new(None),
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

    #[tokio::test]
    async fn successful_refresh_replaces_the_cache() {
        let backend = StubBackend::serving(&["dev-a", "dev-b"]);
        let mut filter = RegistrationFilter::new();
        assert!(!filter.is_ready());

        let outcome = filter.refresh(&backend, "evt_1").await;
        assert_eq!(outcome, RefreshOutcome::Fresh { count: 2 });
        assert!(filter.is_ready());
        assert!(filter.is_registered("dev-a"));
        assert!(!filter.is_registered("dev-c"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_cache() {
        let backend = StubBackend::serving(&["dev-a"]);
        let mut filter = RegistrationFilter::new();
        filter.refresh(&backend, "evt_1").await;

        backend.set_devices(None);
        let outcome = filter.refresh(&backend, "evt_1").await;
        assert_eq!(outcome, RefreshOutcome::Stale);
        assert!(filter.is_ready());
        assert!(filter.is_registered("dev-a"));
    }

    #[tokio::test]
    async fn failed_refresh_with_no_cache_leaves_filter_not_ready() {
        let backend = StubBackend::offline();
        let mut filter = RegistrationFilter::new();

        assert_eq!(filter.refresh(&backend, "evt_1").await, RefreshOutcome::Stale);
        assert!(!filter.is_ready());
        assert!(!filter.is_registered("dev-a"));
    }

    #[tokio::test]
    async fn empty_set_from_a_successful_fetch_rejects_everything() {
        let backend = StubBackend::serving(&[]);
        let mut filter = RegistrationFilter::new();

        assert_eq!(
            filter.refresh(&backend, "evt_1").await,
            RefreshOutcome::Fresh { count: 0 }
        );
        assert!(filter.is_ready());
        assert!(!filter.is_registered("dev-a"));
        assert_eq!(filter.registered_count(), Some(0));
    }

    #[tokio::test]
    async fn invalidate_requires_a_new_fetch() {
        let backend = StubBackend::serving(&["dev-a"]);
        let mut filter = RegistrationFilter::new();
        filter.refresh(&backend, "evt_1").await;

        filter.invalidate();
        assert!(!filter.is_ready());
        assert!(!filter.is_registered("dev-a"));
    }
}

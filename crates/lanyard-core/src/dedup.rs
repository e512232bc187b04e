//! Time-bounded suppression of repeat sightings.
//!
//! The radio source re-discovers every stationary device on every pass, so
//! without suppression a parked phone would produce one record per scan
//! cycle. The window remembers when each device was last accepted and
//! rejects it again until the TTL elapses. The bound is deliberately a TTL
//! rather than permanent suppression: a device that leaves and comes back
//! after a long gap is re-logged, which is what late-arrival tracking wants.

use std::collections::HashMap;

/// How long an accepted device stays suppressed.
pub const WINDOW_TTL_MS: u64 = 300_000;

/// Bounded, time-expiring set of recently accepted device identifiers.
///
/// Expiry is lazy: entries are checked against the TTL at lookup time, and
/// the owner clears the whole window on the periodic rollover and on event
/// switches, which also bounds memory.
#[derive(Debug)]
pub struct DedupWindow {
    ttl_ms: u64,
    last_seen: HashMap<String, u64>,
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupWindow {
    /// Window with the standard TTL of [`WINDOW_TTL_MS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(WINDOW_TTL_MS)
    }

    /// Window with a custom TTL, in milliseconds.
    #[must_use]
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            last_seen: HashMap::new(),
        }
    }

    /// Returns `true` iff `device_id` is absent or its last acceptance is
    /// older than the TTL. On acceptance the entry is recorded/refreshed at
    /// `now_ms`, so the caller must only invoke this once every upstream
    /// filter has already passed.
    pub fn should_accept(&mut self, device_id: &str, now_ms: u64) -> bool {
        if let Some(&seen_at) = self.last_seen.get(device_id) {
            if now_ms.saturating_sub(seen_at) < self.ttl_ms {
                return false;
            }
        }
        self.last_seen.insert(device_id.to_string(), now_ms);
        true
    }

    /// Release the slot taken by `device_id`, letting the next sighting
    /// through. Used when the append that followed acceptance failed.
    pub fn forget(&mut self, device_id: &str) {
        self.last_seen.remove(device_id);
    }

    /// Drop every entry. Invoked on the periodic rollover and when the
    /// selected event changes.
    pub fn reset(&mut self) {
        self.last_seen.clear();
    }

    /// Number of identifiers currently tracked (including expired ones not
    /// yet swept).
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_accepted_and_recorded() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        assert_eq!(window.tracked(), 1);
    }

    #[test]
    fn repeat_within_ttl_is_rejected() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        // ten seconds later, well inside the five-minute window
        assert!(!window.should_accept("dev-a", 11_000));
    }

    #[test]
    fn repeat_after_ttl_is_accepted_again() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        assert!(!window.should_accept("dev-a", 1_000 + WINDOW_TTL_MS - 1));
        assert!(window.should_accept("dev-a", 1_000 + WINDOW_TTL_MS));
    }

    #[test]
    fn acceptance_refreshes_the_timestamp() {
        let mut window = DedupWindow::with_ttl(100);
        assert!(window.should_accept("dev-a", 0));
        assert!(window.should_accept("dev-a", 100));
        // the second acceptance restarts the clock
        assert!(!window.should_accept("dev-a", 150));
    }

    #[test]
    fn distinct_devices_do_not_interfere() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        assert!(window.should_accept("dev-b", 1_000));
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        window.reset();
        assert_eq!(window.tracked(), 0);
        assert!(window.should_accept("dev-a", 2_000));
    }

    #[test]
    fn forget_releases_a_single_slot() {
        let mut window = DedupWindow::new();
        assert!(window.should_accept("dev-a", 1_000));
        assert!(window.should_accept("dev-b", 1_000));
        window.forget("dev-a");
        assert!(window.should_accept("dev-a", 1_001));
        assert!(!window.should_accept("dev-b", 1_001));
    }
}

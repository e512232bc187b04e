//! Shared record and wire types.
//!
//! Field names on the wire (and in the persisted record log) are camelCase;
//! the structs here own the renames so the rest of the crate works with
//! ordinary Rust field names.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Milliseconds since the Unix epoch, as used in every timestamp this crate
/// handles.
#[must_use]
pub fn epoch_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// One attendance sighting, attributed to an event and awaiting delivery.
///
/// Immutable once appended to the record store. `device_id`, `event_id`
/// and `timestamp_ms` are always present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Logical device identifier: the advertised name when present,
    /// otherwise the hardware address.
    #[schema(example = "ATT-7f3a91")]
    pub device_id: String,

    /// Capture time in milliseconds since the Unix epoch.
    #[schema(example = 1_736_899_200_000_u64)]
    pub timestamp_ms: u64,

    /// The event this sighting is attributed to.
    #[schema(example = "evt_2025_opening")]
    pub event_id: String,

    /// Identifier of the scanning unit that captured the sighting.
    #[schema(example = "Scanner-01")]
    pub scanner_source: String,

    /// Received signal strength in dBm, when the radio reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = -58)]
    pub signal_strength: Option<i16>,

    /// Human-readable label, when the device advertised one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "ATT-7f3a91")]
    pub device_name: Option<String>,
}

impl AttendanceRecord {
    /// Whether the record satisfies the non-empty-field invariant.
    ///
    /// Lines in the store that parse but violate this are treated as
    /// malformed and skipped.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.device_id.is_empty() && !self.event_id.is_empty() && self.timestamp_ms > 0
    }
}

/// An event definition as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Backend event identifier.
    #[schema(example = "evt_2025_opening")]
    pub id: String,

    /// Display name.
    #[schema(example = "Opening Night")]
    pub name: String,

    /// Whether the backend considers the event active.
    pub is_active: bool,

    /// Scheduled start, milliseconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,

    /// Scheduled end, milliseconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
}

/// Per-batch outcome counts returned by the backend checkin endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchOutcome {
    /// Records the backend looked at.
    pub processed: u32,

    /// Records newly accepted.
    pub successful: u32,

    /// Records the backend had already seen.
    pub duplicates: u32,

    /// Records the backend could not process.
    pub errors: u32,
}

/// One radio observation of a device during a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSighting {
    /// Stable hardware address, never empty.
    pub address: String,

    /// Advertised name, if any.
    pub name: Option<String>,

    /// Signal strength in dBm at observation time.
    pub rssi: Option<i16>,
}

/// Activation action for the backend event-control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Mark the event active.
    Start,
    /// Mark the event inactive.
    Stop,
}

impl EventAction {
    /// Wire representation of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

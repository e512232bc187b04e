//! Dashboard counters endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the dashboard router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_dashboard))
}

/// Aggregate pipeline state for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "scanning",
    "selected_event_id": "evt_2025_opening",
    "selected_event_name": "Opening Night",
    "is_scanning": true,
    "is_event_active": true,
    "total_scans": 42,
    "devices_found": 130,
    "records_logged": 27,
    "records_synced": 25,
    "pending_records": 2,
    "last_sync_ms": 1736899200000_u64,
    "last_error": null,
    "generated_at_utc": "2025-01-15T03:30:00Z"
}))]
pub struct DashboardResponse {
    /// `"scanning"` while collecting, else `"idle"`.
    #[schema(example = "scanning")]
    pub status: String,

    /// Selected event id; empty when nothing is selected.
    pub selected_event_id: String,

    /// Selected event name.
    pub selected_event_name: String,

    /// Whether the background loops are collecting.
    pub is_scanning: bool,

    /// Backend-side activation state.
    pub is_event_active: bool,

    /// Scan cycles run since startup.
    pub total_scans: u64,

    /// Sightings returned by discovery, before filtering.
    pub devices_found: u64,

    /// Records appended to the store.
    pub records_logged: u64,

    /// Records the backend has accepted.
    pub records_synced: u64,

    /// Records currently awaiting delivery.
    pub pending_records: usize,

    /// When the last successful sync completed, ms since epoch.
    pub last_sync_ms: Option<u64>,

    /// Most recent background failure, if any.
    pub last_error: Option<String>,

    /// When this snapshot was taken.
    pub generated_at_utc: String,
}

/// Point-in-time pipeline counters.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "dashboard",
    operation_id = "getDashboard",
    summary = "Get pipeline counters",
    responses(
        (status = 200, description = "Counters retrieved", body = DashboardResponse),
        (status = 500, description = "Record store unreadable")
    )
)]
pub async fn get_dashboard(
    State(state): State<SharedState>,
) -> ApiResult<Json<DashboardResponse>> {
    let snapshot = state.session.snapshot();
    let pending_records = state.store.pending_count()?;

    Ok(Json(DashboardResponse {
        status: if snapshot.is_scanning {
            "scanning".to_string()
        } else {
            "idle".to_string()
        },
        selected_event_id: snapshot.selected_event_id,
        selected_event_name: snapshot.selected_event_name,
        is_scanning: snapshot.is_scanning,
        is_event_active: snapshot.is_event_active,
        total_scans: snapshot.total_scans,
        devices_found: snapshot.devices_found,
        records_logged: snapshot.records_logged,
        records_synced: snapshot.records_synced,
        pending_records,
        last_sync_ms: snapshot.last_sync_ms,
        last_error: snapshot.last_error,
        generated_at_utc: Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_response_serialization() {
        let response = DashboardResponse {
            status: "idle".into(),
            selected_event_id: String::new(),
            selected_event_name: String::new(),
            is_scanning: false,
            is_event_active: false,
            total_scans: 0,
            devices_found: 0,
            records_logged: 0,
            records_synced: 0,
            pending_records: 0,
            last_sync_ms: None,
            last_error: Some("backend unreachable".into()),
            generated_at_utc: "2025-01-15T03:30:00Z".into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"idle\""));
        assert!(json.contains("\"last_error\":\"backend unreachable\""));
        assert!(json.contains("\"last_sync_ms\":null"));
    }
}

//! Event selection and scan control endpoints.
//!
//! The control surface issues session-state transitions; the background
//! loops observe them at their next cycle boundary. Backend activation is
//! attempted after the local transition and its outcome is reported, never
//! silently folded into success: `is_event_active` mirrors the backend and
//! may lag `is_scanning` when the backend rejects activation.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use lanyard_core::{EventAction, EventBackend, EventSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the events router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_events))
        .route("/select", post(select_event))
        .route("/start", post(start_scanning))
        .route("/stop", post(stop_scanning))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Active events along with the current selection state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventsResponse {
    /// Events the backend reports as open for attendance.
    pub events: Vec<EventSummary>,

    /// Currently selected event id; empty when nothing is selected.
    #[schema(example = "evt_2025_opening")]
    pub selected_event_id: String,

    /// Currently selected event name.
    #[schema(example = "Opening Night")]
    pub selected_event_name: String,

    /// Whether the background loops are collecting.
    pub is_scanning: bool,

    /// Backend-side activation state of the selected event.
    pub is_event_active: bool,
}

/// Request body to select an event.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "event_id": "evt_2025_opening",
    "event_name": "Opening Night"
}))]
pub struct SelectEventRequest {
    /// Backend event identifier.
    pub event_id: String,

    /// Display name, echoed on the dashboard.
    pub event_name: String,
}

/// Response after selecting an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SelectEventResponse {
    /// Always true on a 2xx response.
    pub success: bool,

    /// Human-readable confirmation.
    pub message: String,
}

/// Response after a start or stop transition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "scanning": true,
    "event_active": true,
    "warning": null
}))]
pub struct ScanControlResponse {
    /// Always true on a 2xx response; the local transition happened.
    pub success: bool,

    /// Local collection state after the transition.
    pub scanning: bool,

    /// Backend activation state after the attempt.
    pub event_active: bool,

    /// Present when the backend activation call failed; local scanning
    /// state is unaffected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List active events and the current selection.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    operation_id = "listEvents",
    summary = "List active events",
    responses(
        (status = 200, description = "Events retrieved", body = EventsResponse),
        (status = 503, description = "Backend unreachable")
    )
)]
pub async fn list_events(State(state): State<SharedState>) -> ApiResult<Json<EventsResponse>> {
    let events = state.backend.active_events().await?;
    let snapshot = state.session.snapshot();
    Ok(Json(EventsResponse {
        events,
        selected_event_id: snapshot.selected_event_id,
        selected_event_name: snapshot.selected_event_name,
        is_scanning: snapshot.is_scanning,
        is_event_active: snapshot.is_event_active,
    }))
}

/// Select the event subsequent sightings are attributed to.
///
/// Selecting always halts collection; the scanner must be started again
/// under the new event.
#[utoipa::path(
    post,
    path = "/api/events/select",
    tag = "events",
    operation_id = "selectEvent",
    summary = "Select an event",
    request_body = SelectEventRequest,
    responses(
        (status = 200, description = "Event selected", body = SelectEventResponse),
        (status = 400, description = "Missing event id or name")
    )
)]
pub async fn select_event(
    State(state): State<SharedState>,
    Json(request): Json<SelectEventRequest>,
) -> ApiResult<Json<SelectEventResponse>> {
    let event_id = request.event_id.trim();
    let event_name = request.event_name.trim();
    if event_id.is_empty() || event_name.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "missing_event".to_string(),
            message: "event_id and event_name are required".to_string(),
        });
    }

    state.session.select_event(event_id, event_name);
    tracing::info!(event = %event_id, name = %event_name, "event selected");

    Ok(Json(SelectEventResponse {
        success: true,
        message: format!("event selected: {event_name}"),
    }))
}

/// Start collecting for the selected event.
#[utoipa::path(
    post,
    path = "/api/events/start",
    tag = "events",
    operation_id = "startScanning",
    summary = "Start scanning",
    responses(
        (status = 200, description = "Scanning started", body = ScanControlResponse),
        (status = 409, description = "No event selected")
    )
)]
pub async fn start_scanning(
    State(state): State<SharedState>,
) -> ApiResult<Json<ScanControlResponse>> {
    state.session.start_scanning()?;
    let snapshot = state.session.snapshot();
    tracing::info!(event = %snapshot.selected_event_id, "scanning started");

    let warning = match state
        .backend
        .event_control(&snapshot.selected_event_id, EventAction::Start)
        .await
    {
        Ok(event) => {
            state.session.set_event_active(event.is_active);
            None
        }
        Err(err) => {
            tracing::warn!(%err, "backend activation failed; scanning locally anyway");
            state.session.set_event_active(false);
            Some(format!("backend activation failed: {err}"))
        }
    };

    let snapshot = state.session.snapshot();
    Ok(Json(ScanControlResponse {
        success: true,
        scanning: snapshot.is_scanning,
        event_active: snapshot.is_event_active,
        warning,
    }))
}

/// Stop collecting. Takes effect at the next cycle boundary; counters and
/// pending records are untouched.
#[utoipa::path(
    post,
    path = "/api/events/stop",
    tag = "events",
    operation_id = "stopScanning",
    summary = "Stop scanning",
    responses(
        (status = 200, description = "Scanning stopped", body = ScanControlResponse),
        (status = 409, description = "Scanner was not running")
    )
)]
pub async fn stop_scanning(
    State(state): State<SharedState>,
) -> ApiResult<Json<ScanControlResponse>> {
    state.session.stop_scanning()?;
    let snapshot = state.session.snapshot();
    tracing::info!(event = %snapshot.selected_event_id, "scanning stopped");

    let warning = match state
        .backend
        .event_control(&snapshot.selected_event_id, EventAction::Stop)
        .await
    {
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(%err, "backend deactivation failed");
            Some(format!("backend deactivation failed: {err}"))
        }
    };
    state.session.set_event_active(false);

    Ok(Json(ScanControlResponse {
        success: true,
        scanning: false,
        event_active: false,
        warning,
    }))
}

//! OpenAPI specification generation for the lanyard control API.

use axum::Json;
use utoipa::OpenApi;

use super::config::{ConfigResponse, UpdateConfigRequest, UpdateConfigResponse};
use super::dashboard::DashboardResponse;
use super::error::ErrorResponse;
use super::events::{
    EventsResponse, ScanControlResponse, SelectEventRequest, SelectEventResponse,
};
use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Main OpenAPI document for the lanyard control API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "lanyard control API",
        version = "0.1.0",
        description = r"
# lanyard control API

Runs alongside the BLE attendance scanner and drives its session state:

1. **Events**: list the backend's active events, select one, start and stop
   collection for it.
2. **Dashboard**: point-in-time pipeline counters (scans, sightings,
   records logged, records synced, pending backlog).
3. **Configuration**: read and update the scanner configuration.

Attendance records themselves never flow through this API; they move from
the radio to the local record log to the backend's batch-checkin endpoint.
"
    ),
    paths(
        super::health::health_check,
        super::events::list_events,
        super::events::select_event,
        super::events::start_scanning,
        super::events::stop_scanning,
        super::dashboard::get_dashboard,
        super::config::get_config,
        super::config::update_config,
    ),
    components(schemas(
        HealthResponse,
        EventsResponse,
        SelectEventRequest,
        SelectEventResponse,
        ScanControlResponse,
        DashboardResponse,
        ConfigResponse,
        UpdateConfigRequest,
        UpdateConfigResponse,
        ErrorResponse,
        lanyard_core::EventSummary,
        lanyard_core::AttendanceRecord,
    )),
    tags(
        (name = "system", description = "Health and service status"),
        (name = "events", description = "Event selection and scan control"),
        (name = "dashboard", description = "Pipeline counters"),
        (name = "config", description = "Scanner configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_includes_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/events/select"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/dashboard"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/config"));
    }
}

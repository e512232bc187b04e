//! HTTP API routes and handlers.
//!
//! Endpoint implementations organized by domain:
//! - `events` - event listing, selection and scan control
//! - `dashboard` - pipeline counters
//! - `config` - scanner configuration management
//! - `health` - service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod health;
pub mod openapi;

#[allow(unused_imports)]
pub use error::{ApiError, ApiResult, ErrorResponse};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /events            - List, select, start, stop
/// ├── /dashboard         - Pipeline counters
/// ├── /config            - Configuration management
/// └── /openapi.json      - OpenAPI specification
/// /docs                  - Swagger UI
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/events", events::router())
                .nest("/dashboard", dashboard::router())
                .nest("/config", config::router()),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum_test::TestServer;
    use lanyard_core::{HttpBackend, RecordStore, ScannerConfig, SessionHandle};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_state(dir: &std::path::Path) -> SharedState {
        let config: ScannerConfig = toml::from_str(
            "backend_base_url = \"https://backend.invalid\"\napi_key = \"secret\"\n",
        )
        .unwrap();
        let backend =
            Arc::new(HttpBackend::new(&config.backend_base_url, &config.api_key).unwrap());
        AppState::new(
            dir.join("config.toml"),
            config,
            SessionHandle::new(),
            RecordStore::new(dir.join("log.jsonl")),
            backend,
        )
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let dir = tempdir().unwrap();
        let server = TestServer::new(create_router(test_state(dir.path()))).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["scanning"], false);
    }

    #[tokio::test]
    async fn dashboard_reports_empty_pipeline() {
        let dir = tempdir().unwrap();
        let server = TestServer::new(create_router(test_state(dir.path()))).unwrap();

        let response = server.get("/api/dashboard").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "idle");
        assert_eq!(body["pending_records"], 0);
    }

    #[tokio::test]
    async fn start_without_selection_is_a_conflict() {
        let dir = tempdir().unwrap();
        let server = TestServer::new(create_router(test_state(dir.path()))).unwrap();

        let response = server.post("/api/events/start").await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "no_event_selected");
    }

    #[tokio::test]
    async fn select_rejects_blank_ids() {
        let dir = tempdir().unwrap();
        let server = TestServer::new(create_router(test_state(dir.path()))).unwrap();

        let response = server
            .post("/api/events/select")
            .json(&serde_json::json!({"event_id": "  ", "event_name": "x"}))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }
}

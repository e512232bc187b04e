//! Configuration API endpoints.
//!
//! Reads return the active configuration with the API key masked. Updates
//! are validated, persisted and reflected in memory immediately; fields the
//! worker loops captured at startup take effect on the next restart, and
//! the response says so rather than implying a live change.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the config router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_config).put(update_config))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Current configuration, API key masked.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "backend_base_url": "https://backend.example/api",
    "api_key": "****cret",
    "scanner_id": "Scanner-01",
    "uuid_prefix": "ATT-",
    "scan_interval_seconds": 5,
    "sync_interval_seconds": 30,
    "log_path": "./attendance_log.jsonl",
    "listen_port": 5000
}))]
pub struct ConfigResponse {
    /// Backend base URL.
    pub backend_base_url: String,

    /// Masked API key; only the last characters are revealed.
    #[schema(example = "****cret")]
    pub api_key: String,

    /// Scanner identifier recorded on every sighting.
    pub scanner_id: String,

    /// Identifier-prefix allowlist; empty accepts any identifier.
    pub uuid_prefix: String,

    /// Seconds between scan cycles.
    pub scan_interval_seconds: u64,

    /// Seconds between sync attempts.
    pub sync_interval_seconds: u64,

    /// Path of the attendance record log.
    pub log_path: String,

    /// Control API port.
    pub listen_port: u16,
}

/// Partial configuration update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateConfigRequest {
    /// New backend base URL.
    pub backend_base_url: Option<String>,

    /// New API key.
    pub api_key: Option<String>,

    /// New scanner identifier.
    pub scanner_id: Option<String>,

    /// New identifier-prefix allowlist.
    pub uuid_prefix: Option<String>,

    /// New scan interval in seconds.
    pub scan_interval_seconds: Option<u64>,

    /// New sync interval in seconds.
    pub sync_interval_seconds: Option<u64>,
}

/// Response after a configuration update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateConfigResponse {
    /// Always true on a 2xx response.
    pub success: bool,

    /// Whether the pipeline must be restarted for the change to apply.
    pub restart_required: bool,

    /// Human-readable confirmation.
    pub message: String,
}

fn mask_key(key: &str) -> String {
    let keep = key.chars().count().saturating_sub(4);
    let suffix: String = key.chars().skip(keep).collect();
    format!("****{suffix}")
}

// ============================================================================
// Handlers
// ============================================================================

/// Read the active configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Read the active configuration",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = state.config.read().await;
    Json(ConfigResponse {
        backend_base_url: config.backend_base_url.clone(),
        api_key: mask_key(&config.api_key),
        scanner_id: config.scanner_id.clone(),
        uuid_prefix: config.uuid_prefix.clone(),
        scan_interval_seconds: config.scan_interval_seconds,
        sync_interval_seconds: config.sync_interval_seconds,
        log_path: config.log_path.display().to_string(),
        listen_port: config.listen_port,
    })
}

/// Update and persist the configuration.
#[utoipa::path(
    put,
    path = "/api/config",
    tag = "config",
    operation_id = "updateConfig",
    summary = "Update the configuration",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Configuration updated", body = UpdateConfigResponse),
        (status = 400, description = "A field failed validation"),
        (status = 500, description = "Configuration could not be persisted")
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(request): Json<UpdateConfigRequest>,
) -> ApiResult<Json<UpdateConfigResponse>> {
    let mut config = state.config.write().await;

    let mut updated = config.clone();
    if let Some(url) = request.backend_base_url {
        updated.backend_base_url = url;
    }
    if let Some(key) = request.api_key {
        updated.api_key = key;
    }
    if let Some(id) = request.scanner_id {
        updated.scanner_id = id;
    }
    if let Some(prefix) = request.uuid_prefix {
        updated.uuid_prefix = prefix;
    }
    if let Some(secs) = request.scan_interval_seconds {
        updated.scan_interval_seconds = secs;
    }
    if let Some(secs) = request.sync_interval_seconds {
        updated.sync_interval_seconds = secs;
    }

    updated.validate().map_err(ApiError::from)?;

    if updated == *config {
        return Ok(Json(UpdateConfigResponse {
            success: true,
            restart_required: false,
            message: "configuration unchanged".to_string(),
        }));
    }

    updated.save(&state.config_path)?;
    *config = updated;
    tracing::info!(path = %state.config_path.display(), "configuration updated");

    // The worker loops captured their settings at startup.
    Ok(Json(UpdateConfigResponse {
        success: true,
        restart_required: true,
        message: "configuration saved; pipeline changes take effect on restart".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_reveals_only_a_suffix() {
        assert_eq!(mask_key("supersecret"), "****cret");
        assert_eq!(mask_key("abc"), "****abc");
        assert_eq!(mask_key(""), "****");
    }

    #[test]
    fn update_request_tolerates_partial_bodies() {
        let request: UpdateConfigRequest =
            serde_json::from_str(r#"{"uuid_prefix": "ATT-"}"#).unwrap();
        assert_eq!(request.uuid_prefix.as_deref(), Some("ATT-"));
        assert!(request.api_key.is_none());
    }

    #[test]
    fn config_response_serialization() {
        let response = ConfigResponse {
            backend_base_url: "https://backend.example/api".into(),
            api_key: "****cret".into(),
            scanner_id: "Scanner-01".into(),
            uuid_prefix: String::new(),
            scan_interval_seconds: 5,
            sync_interval_seconds: 30,
            log_path: "./attendance_log.jsonl".into(),
            listen_port: 5000,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"api_key\":\"****cret\""));
        assert!(!json.contains("supersecret"));
    }
}

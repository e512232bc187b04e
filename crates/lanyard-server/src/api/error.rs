//! API error types and response handling.
//!
//! One unified error type for every handler, converting to a consistent
//! JSON error body with the appropriate status code. User-facing failures
//! are always structured; a handler never silently succeeds with partial
//! effect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lanyard_core::LanyardError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - invalid input from the client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - the session is not in a state that allows the
    /// requested transition.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - unexpected server-side failure.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 503 Service Unavailable - the backend or the radio is unreachable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "no_event_selected",
    "message": "no event selected; select an event before starting the scanner"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "no_event_selected")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::BadRequest {
                error_code,
                message,
            } => (StatusCode::BAD_REQUEST, error_code, message),
            Self::Conflict {
                error_code,
                message,
            } => (StatusCode::CONFLICT, error_code, message),
            Self::InternalError {
                error_code,
                message,
            } => {
                tracing::error!(error_code = %error_code, %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_code, message)
            }
            Self::ServiceUnavailable {
                error_code,
                message,
            } => (StatusCode::SERVICE_UNAVAILABLE, error_code, message),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_code,
                message,
            }),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<LanyardError> for ApiError {
    fn from(err: LanyardError) -> Self {
        let error_code = err.error_code().to_ascii_lowercase();
        match &err {
            LanyardError::NoEventSelected | LanyardError::NotScanning => Self::Conflict {
                error_code,
                message: err.to_string(),
            },
            LanyardError::ConfigInvalid { .. } => Self::BadRequest {
                error_code,
                message: err.to_string(),
            },
            LanyardError::AdapterNotFound
            | LanyardError::DiscoveryFailed(_)
            | LanyardError::BackendUnreachable(_)
            | LanyardError::BackendRejected { .. }
            | LanyardError::BackendResponseMalformed(_)
            | LanyardError::RegistrationUnavailable { .. } => Self::ServiceUnavailable {
                error_code,
                message: err.to_string(),
            },
            LanyardError::StoreIo { .. }
            | LanyardError::ConfigNotFound(_)
            | LanyardError::ConfigParse(_) => Self::InternalError {
                error_code,
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_conflict() {
        let err = ApiError::from(LanyardError::NoEventSelected);
        assert!(matches!(err, ApiError::Conflict { .. }));
        assert!(err.to_string().contains("no event selected"));
    }

    #[test]
    fn backend_errors_map_to_service_unavailable() {
        let err = ApiError::from(LanyardError::BackendRejected { status: 500 });
        assert!(matches!(
            err,
            ApiError::ServiceUnavailable { ref error_code, .. } if error_code == "backend_rejected"
        ));
    }

    #[test]
    fn error_response_serialization() {
        let response = ErrorResponse {
            error: "not_scanning".to_string(),
            message: "scanner is not running".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"not_scanning\""));
    }
}

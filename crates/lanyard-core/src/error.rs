//! Unified error types for the lanyard core library.
//!
//! Every failure mode in the attendance pipeline maps to one variant of
//! [`LanyardError`]. Background loops never propagate these out of their
//! iteration; they convert them to session state (`last_error`) and retry on
//! the next tick. Binaries and HTTP handlers match on variants to decide
//! what to surface.

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all lanyard operations.
#[derive(Debug, Error)]
pub enum LanyardError {
    // =========================================================================
    // RADIO ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error("no Bluetooth adapter found; ensure hardware is present and bluetoothd is running")]
    AdapterNotFound,

    /// Device discovery failed or timed out at the radio layer.
    #[error("device discovery failed: {0}")]
    DiscoveryFailed(String),

    // =========================================================================
    // BACKEND ERRORS
    // =========================================================================
    /// The backend could not be reached (DNS, connect, timeout).
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The backend answered with a non-success status code.
    #[error("backend rejected request with HTTP status {status}")]
    BackendRejected {
        /// HTTP status code returned by the backend.
        status: u16,
    },

    /// The backend response body could not be decoded.
    #[error("backend response malformed: {0}")]
    BackendResponseMalformed(String),

    /// No registration list has ever been fetched for the selected event,
    /// so sightings cannot be safely attributed.
    #[error("registration list unavailable for event '{event_id}'; logging skipped until a fetch succeeds")]
    RegistrationUnavailable {
        /// The event whose registration list is missing.
        event_id: String,
    },

    // =========================================================================
    // SESSION ERRORS
    // =========================================================================
    /// Scanning was requested without an event selected.
    #[error("no event selected; select an event before starting the scanner")]
    NoEventSelected,

    /// Stop was requested while the scanner was already stopped.
    #[error("scanner is not running")]
    NotScanning,

    // =========================================================================
    // PERSISTENCE & CONFIGURATION ERRORS
    // =========================================================================
    /// The record store could not be read or written.
    #[error("record store I/O error at {}: {source}", path.display())]
    StoreIo {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not found at the expected path.
    #[error("configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be read or parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// The configuration was parsed but a field holds an invalid value.
    #[error("invalid configuration: {field}: {message}")]
    ConfigInvalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// A specialized [`Result`] type for lanyard operations.
pub type Result<T> = std::result::Result<T, LanyardError>;

impl LanyardError {
    /// Returns `true` for failures that are expected to clear on their own
    /// and are retried on the next scheduled tick.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailed(_)
                | Self::BackendUnreachable(_)
                | Self::BackendRejected { .. }
                | Self::BackendResponseMalformed(_)
                | Self::RegistrationUnavailable { .. }
                | Self::StoreIo { .. }
        )
    }

    /// Returns `true` if this error is a configuration problem that needs
    /// operator intervention.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParse(_) | Self::ConfigInvalid { .. }
        )
    }

    /// Returns `true` if this error is a rejected session transition rather
    /// than a system failure.
    #[inline]
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(self, Self::NoEventSelected | Self::NotScanning)
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AdapterNotFound => "ADAPTER_NOT_FOUND",
            Self::DiscoveryFailed(_) => "DISCOVERY_FAILED",
            Self::BackendUnreachable(_) => "BACKEND_UNREACHABLE",
            Self::BackendRejected { .. } => "BACKEND_REJECTED",
            Self::BackendResponseMalformed(_) => "BACKEND_RESPONSE_MALFORMED",
            Self::RegistrationUnavailable { .. } => "REGISTRATION_UNAVAILABLE",
            Self::NoEventSelected => "NO_EVENT_SELECTED",
            Self::NotScanning => "NOT_SCANNING",
            Self::StoreIo { .. } => "STORE_IO_ERROR",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParse(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigInvalid { .. } => "CONFIG_INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn transient_classification() {
        assert!(LanyardError::DiscoveryFailed("timeout".into()).is_transient());
        assert!(LanyardError::BackendUnreachable("connect refused".into()).is_transient());
        assert!(LanyardError::BackendRejected { status: 500 }.is_transient());
        assert!(LanyardError::StoreIo {
            path: PathBuf::from("/tmp/log.jsonl"),
            source: IoErr::new(ErrorKind::PermissionDenied, "denied"),
        }
        .is_transient());

        assert!(!LanyardError::NoEventSelected.is_transient());
        assert!(!LanyardError::ConfigParse("bad toml".into()).is_transient());
    }

    #[test]
    fn config_classification() {
        assert!(LanyardError::ConfigNotFound(PathBuf::from("/etc/lanyard")).is_config_error());
        assert!(LanyardError::ConfigInvalid {
            field: "api_key",
            message: "must not be empty".into(),
        }
        .is_config_error());
        assert!(!LanyardError::AdapterNotFound.is_config_error());
    }

    #[test]
    fn session_classification() {
        assert!(LanyardError::NoEventSelected.is_session_error());
        assert!(LanyardError::NotScanning.is_session_error());
        assert!(!LanyardError::AdapterNotFound.is_session_error());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(LanyardError::NoEventSelected.error_code(), "NO_EVENT_SELECTED");
        assert_eq!(
            LanyardError::BackendRejected { status: 503 }.error_code(),
            "BACKEND_REJECTED"
        );
    }

    #[test]
    fn display_mentions_the_path() {
        let err = LanyardError::StoreIo {
            path: PathBuf::from("/var/lib/lanyard/log.jsonl"),
            source: IoErr::new(ErrorKind::Other, "disk full"),
        };
        assert!(err.to_string().contains("log.jsonl"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LanyardError>();
        assert_sync::<LanyardError>();
    }
}

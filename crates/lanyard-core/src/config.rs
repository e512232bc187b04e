//! Scanner configuration.
//!
//! One TOML file with enumerated recognized options. Unknown keys are
//! ignored; missing required keys fail fast at startup with a descriptive
//! error rather than surfacing later as a half-working pipeline.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LanyardError, Result};

static BASE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("base url pattern compiles"));

fn default_scanner_id() -> String {
    "Scanner-01".to_string()
}

const fn default_scan_interval() -> u64 {
    5
}

const fn default_sync_interval() -> u64 {
    30
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./attendance_log.jsonl")
}

const fn default_listen_port() -> u16 {
    5000
}

/// Scanner configuration, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Base URL of the backend, e.g. `https://backend.example/api`.
    pub backend_base_url: String,

    /// API key sent with every backend request.
    pub api_key: String,

    /// Identifier of this scanning unit, recorded on every sighting.
    #[serde(default = "default_scanner_id")]
    pub scanner_id: String,

    /// Optional identifier-prefix allowlist; empty accepts any identifier.
    #[serde(default)]
    pub uuid_prefix: String,

    /// Seconds between scan cycles; also bounds one discovery pass.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,

    /// Seconds between sync attempts. Failed syncs retry on this same
    /// cadence, never faster.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,

    /// Path of the append-only attendance record log.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Port the control API listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl ScannerConfig {
    /// Load and validate configuration from `path`.
    ///
    /// # Errors
    ///
    /// [`LanyardError::ConfigNotFound`] when the file is absent,
    /// [`LanyardError::ConfigParse`] when it cannot be read or parsed,
    /// [`LanyardError::ConfigInvalid`] when a field fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LanyardError::ConfigNotFound(path.to_path_buf())
            } else {
                LanyardError::ConfigParse(format!("failed to read {}: {e}", path.display()))
            }
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| LanyardError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// [`LanyardError::ConfigParse`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LanyardError::ConfigParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LanyardError::ConfigParse(format!(
                        "failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        std::fs::write(path, content).map_err(|e| {
            LanyardError::ConfigParse(format!("failed to write {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Check every field for sanity.
    ///
    /// # Errors
    ///
    /// [`LanyardError::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !BASE_URL_RE.is_match(&self.backend_base_url) {
            return Err(LanyardError::ConfigInvalid {
                field: "backend_base_url",
                message: format!(
                    "'{}' is not an http(s) URL",
                    self.backend_base_url
                ),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(LanyardError::ConfigInvalid {
                field: "api_key",
                message: "must not be empty".into(),
            });
        }
        if self.scanner_id.trim().is_empty() {
            return Err(LanyardError::ConfigInvalid {
                field: "scanner_id",
                message: "must not be empty".into(),
            });
        }
        if self.scan_interval_seconds == 0 {
            return Err(LanyardError::ConfigInvalid {
                field: "scan_interval_seconds",
                message: "must be at least 1".into(),
            });
        }
        if self.sync_interval_seconds == 0 {
            return Err(LanyardError::ConfigInvalid {
                field: "sync_interval_seconds",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Platform default configuration path.
    ///
    /// On the deployment target (Linux): `/etc/lanyard/config.toml`.
    /// Elsewhere (development): the per-user config directory.
    ///
    /// # Errors
    ///
    /// [`LanyardError::ConfigParse`] when no config directory can be
    /// determined for the platform.
    pub fn default_path() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/lanyard/config.toml"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "lanyard").ok_or_else(|| {
                LanyardError::ConfigParse("cannot determine config directory".into())
            })?;
            Ok(dirs.config_dir().join("config.toml"))
        }
    }
}

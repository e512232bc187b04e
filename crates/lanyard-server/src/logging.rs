//! Logging initialization.
//!
//! Environment-aware tracing setup:
//! - **Production**: JSON logs to daily rolling files plus compact stdout
//!   (no ANSI, suitable for the systemd journal).
//! - **Development**: pretty stdout only.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking file writer alive for the life of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, else `LANYARD_LOG_LEVEL`,
/// else `info`.
///
/// # Errors
///
/// Returns an error if the env filter cannot be parsed.
pub fn init(is_production: bool) -> anyhow::Result<()> {
    let default_level =
        std::env::var("LANYARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&default_level))?;

    if is_production {
        let log_dir = log_directory();
        if !log_dir.exists() {
            std::fs::create_dir_all(&log_dir).ok();
        }
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "lanyard");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        let stdout_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();

        let _ = FILE_GUARD.set(guard);
    } else {
        let stdout_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();
    }

    Ok(())
}

/// Log directory for the current platform.
fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/lanyard")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "lanyard")
            .map(|dirs| dirs.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("./logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_is_nonempty() {
        assert!(!log_directory().as_os_str().is_empty());
    }
}

//! Tracing setup for the gateway server and the batch CLI.
//!
//! The server writes compact lines to stdout plus an ANSI-free copy to `INDUSNLP_LOG_FILE`
//! (default `logs/indusnlp.log`). The CLI logs to stderr only.
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "INDUSNLP_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "indusnlp.log";

// Flushes the file writer on exit; set once per process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the server subscriber. `RUST_LOG` overrides the `info` default.
///
/// A log file that cannot be opened is reported on stderr and the server keeps logging to
/// stdout alone.
pub fn init_tracing() {
    let registry = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_target(false).compact());

    let path = log_file_path(std::env::var(LOG_FILE_ENV).ok());
    match open_log_writer(&path) {
        Ok(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .compact(),
            )
            .init(),
        Err(message) => {
            eprintln!("{message}; file logging disabled");
            registry.init();
        }
    }
}

/// Install the batch CLI subscriber on stderr, keeping stdout for the run summary.
pub fn init_cli_tracing(verbose: bool) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(if verbose { "debug" } else { "warn" }))
        .with(stderr_layer)
        .init();
}

fn log_file_path(configured: Option<String>) -> PathBuf {
    match configured.filter(|path| !path.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_NAME),
    }
}

fn open_log_writer(path: &Path) -> Result<NonBlocking, String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create {}: {err}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Failed to open log file {}: {err}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_defaults_under_logs_dir() {
        assert_eq!(log_file_path(None), Path::new("logs/indusnlp.log"));
        assert_eq!(log_file_path(Some("  ".into())), Path::new("logs/indusnlp.log"));
        assert_eq!(
            log_file_path(Some("/var/log/gw.log".into())),
            Path::new("/var/log/gw.log")
        );
    }

    #[test]
    fn log_writer_creates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("indusnlp-logs-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested/gateway.log");
        open_log_writer(&path).expect("writer");
        assert!(path.exists());
        std::fs::remove_dir_all(dir).ok();
    }
}

//! Tracing subscriber setup
//!
//! Two layers: every debug-level event goes to a per-run log file, while
//! stderr only shows what `RUST_LOG` (or the configured console level)
//! lets through so the interactive output stays readable.

use crate::config::LoggingConfig;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file for a run started at `started`
pub fn log_file_path(dir: &Path, started: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "history-tutor_{}.log",
        started.format("%Y%m%d_%H%M%S")
    ))
}

fn open_log_file(dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = log_file_path(dir, Utc::now());
    let file = File::create(&path)?;
    Ok((file, path))
}

/// Install the global subscriber
///
/// Returns the log file path when one could be created. A missing log
/// directory only costs the file layer; console logging still works.
pub fn initialize(config: &LoggingConfig) -> Option<PathBuf> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_lowercase()));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, log_path, file_error) = match open_log_file(&config.directory) {
        Ok((file, path)) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(path), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        // Already installed (tests, embedding)
        return None;
    }

    if let Some(e) = file_error {
        tracing::warn!(
            "Could not create log file in {}: {}",
            config.directory.display(),
            e
        );
    }
    if let Some(path) = &log_path {
        tracing::info!("Logging to {}", path.display());
    }
    log_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_log_file_name() {
        let started = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let path = log_file_path(Path::new("/logs"), started);
        assert_eq!(path, PathBuf::from("/logs/history-tutor_20260304_050607.log"));
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let (_file, path) = open_log_file(&nested).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&nested));
    }
}

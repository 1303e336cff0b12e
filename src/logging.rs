//! Logging initialization for the journal CLI.
//!
//! `watch` mode: logs to `<data>/logs/journal-{datetime}.log`
//! One-shot commands, or `logging.to_file = false`: logs to stderr

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered file logs when dropped; keep alive until exit
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file, when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Where log lines go for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File { dir: PathBuf, name: String },
}

impl LogTarget {
    pub fn resolve(config: &Config, long_running: bool) -> Self {
        if long_running && config.logging.to_file {
            Self::File {
                dir: config.logs_path(),
                name: log_file_name(),
            }
        } else {
            Self::Stderr
        }
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        match self {
            Self::Stderr => None,
            Self::File { dir, name } => Some(dir.join(name)),
        }
    }

    /// Create the logs directory if needed and build the writer
    fn open(&self) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
        match self {
            Self::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), None)),
            Self::File { dir, name } => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::never(dir, name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                Ok((BoxMakeWriter::new(non_blocking), Some(guard)))
            }
        }
    }
}

fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("journal-{timestamp}.log")
}

/// Filter directive: `RUST_LOG` wins, then `--debug`, then the configured level
fn filter_directive(config: &Config, debug_override: bool, rust_log: Option<String>) -> String {
    rust_log.unwrap_or_else(|| {
        if debug_override {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    })
}

/// Initialize logging based on mode and configuration.
///
/// # Arguments
/// * `config` - Application configuration
/// * `long_running` - Whether the command keeps running (file logging applies)
/// * `debug_override` - Force the "debug" level (from `--debug`)
pub fn init_logging(
    config: &Config,
    long_running: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let directive = filter_directive(config, debug_override, std::env::var("RUST_LOG").ok());
    let target = LogTarget::resolve(config, long_running);
    let (writer, guard) = target.open()?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(target == LogTarget::Stderr)
                .with_writer(writer),
        )
        .init();

    Ok(LoggingHandle {
        _guard: guard,
        log_file_path: target.file_path(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.data = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_watch_logs_under_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let target = LogTarget::resolve(&config, true);
        let path = target.file_path().unwrap();
        assert_eq!(path.parent(), Some(temp_dir.path().join("logs").as_path()));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("journal-"));
        assert!(name.ends_with("Z.log"));
    }

    #[test]
    fn test_opening_file_target_creates_logs_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.storage.backend = StorageBackend::Memory;

        let target = LogTarget::resolve(&config, true);
        assert!(!temp_dir.path().join("logs").exists());
        let (_writer, guard) = target.open().unwrap();
        assert!(guard.is_some());
        assert!(temp_dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_falls_back_to_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);

        // One-shot commands never write a log file
        assert_eq!(LogTarget::resolve(&config, false), LogTarget::Stderr);

        config.logging.to_file = false;
        let target = LogTarget::resolve(&config, true);
        assert_eq!(target, LogTarget::Stderr);
        assert!(target.file_path().is_none());

        let (_writer, guard) = target.open().unwrap();
        assert!(guard.is_none());
        assert!(!temp_dir.path().join("logs").exists());
    }

    #[test]
    fn test_filter_directive_precedence() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();

        assert_eq!(filter_directive(&config, false, None), "warn");
        assert_eq!(filter_directive(&config, true, None), "debug");
        assert_eq!(
            filter_directive(&config, true, Some("venture_journal=trace".to_string())),
            "venture_journal=trace"
        );
    }
}

//! Process-wide `tracing` setup for binaries and benchmark runners.
//!
//! Library code only emits events; whoever owns `main` decides where they go.

use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory of the daily-rolling log files; `None` disables file output.
    pub dir: Option<PathBuf>,
    pub prefix: String,
    pub max_files: usize,
    /// Events go to stdout, warnings and errors additionally to stderr.
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: Some(PathBuf::from("logs")),
            prefix: "bacillus".to_string(),
            max_files: 5,
            console: true,
        }
    }
}

impl LogSettings {
    /// File output only, for runners that own stdout themselves.
    pub fn file_only(level: &str, dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            level: level.to_string(),
            dir: Some(dir.into()),
            prefix: prefix.to_string(),
            console: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum LogSetupError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("cannot create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create log file appender: {0}")]
    Appender(String),
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Installs the global subscriber described by `settings`.
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(settings: &LogSettings) -> Result<(), LogSetupError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| LogSetupError::Filter {
            filter: settings.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let file_layer = match &settings.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LogSetupError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(&settings.prefix)
                .filename_suffix("log")
                .max_log_files(settings.max_files)
                .build(dir)
                .map_err(|e| LogSetupError::Appender(e.to_string()))?;

            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD
                .set(guard)
                .map_err(|_| LogSetupError::AlreadyInitialized)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
        }
        None => None,
    };

    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN)))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LogSetupError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_installs_once() {
        let dir = std::env::temp_dir().join(format!("bacillus-log-{}", std::process::id()));
        let settings = LogSettings::file_only("debug", &dir, "bacillus_test");
        setup_logging(&settings).unwrap();
        tracing::info!("logging initialized");

        let has_log = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("bacillus_test"));
        assert!(has_log);

        let err = setup_logging(&settings).unwrap_err();
        assert!(matches!(err, LogSetupError::AlreadyInitialized));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LogSettings {
            level: "bacillus=loud".to_string(),
            dir: None,
            ..Default::default()
        };
        let err = setup_logging(&settings).unwrap_err();
        assert!(matches!(err, LogSetupError::Filter { .. }), "{:?}", err);
    }

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.prefix, "bacillus");
        assert!(settings.console);
        assert_eq!(settings.dir, Some(PathBuf::from("logs")));
    }
}

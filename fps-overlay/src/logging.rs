//! Tracing setup.
//!
//! Logs go to stderr, or to the configured file through a background
//! writer so the overlay worker never blocks on disk I/O. The
//! [`WorkerGuard`] returned for a file must be held for the lifetime of
//! the program; dropping it flushes and stops the writer.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

use fps_core::FpsError;

use crate::config::LoggingConfig;

/// Directory and file name for `logging.file`, or `None` for stderr.
pub fn file_target(logging: &LoggingConfig) -> Result<Option<(PathBuf, OsString)>, FpsError> {
    if logging.file.is_empty() {
        return Ok(None);
    }
    let path = Path::new(&logging.file);
    let Some(name) = path.file_name() else {
        return Err(FpsError::InvalidConfig(format!(
            "log file path has no file name: {}",
            logging.file
        )));
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(Some((dir, name.to_os_string())))
}

/// Non-blocking writer appending to the configured log file.
pub fn file_writer(logging: &LoggingConfig) -> Result<Option<(NonBlocking, WorkerGuard)>, FpsError> {
    let Some((dir, name)) = file_target(logging)? else {
        return Ok(None);
    };
    std::fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::never(dir, name);
    Ok(Some(tracing_appender::non_blocking(appender)))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(logging: &LoggingConfig) -> Result<Option<WorkerGuard>, FpsError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match file_writer(logging)? {
        Some((writer, guard)) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(file: &str) -> LoggingConfig {
        LoggingConfig {
            file: file.into(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn empty_path_logs_to_stderr() {
        assert!(file_target(&logging("")).unwrap().is_none());
        assert!(file_writer(&logging("")).unwrap().is_none());
    }

    #[test]
    fn bare_file_name_goes_to_working_directory() {
        let (dir, name) = file_target(&logging("fps-overlay.log")).unwrap().unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, OsString::from("fps-overlay.log"));
    }

    #[test]
    fn nested_path_is_split() {
        let (dir, name) = file_target(&logging("logs/overlay.log")).unwrap().unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, OsString::from("overlay.log"));
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        assert!(matches!(
            file_target(&logging("..")),
            Err(FpsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn file_writer_flushes_when_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("overlay.log");
        let config = logging(path.to_str().unwrap());

        let (writer, guard) = file_writer(&config).unwrap().unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(writer)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("overlay started");
        });
        drop(guard);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("overlay started"));
    }
}

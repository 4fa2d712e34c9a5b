//! Run log setup. Every launch truncates `runlog.log` in the data directory
//! and records what the store and importer did; the TUI can show the file
//! back to the user through the log viewer.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "EMSTENCIL_LOG";
/// Capture everything from our own crate unless told otherwise.
const DEFAULT_FILTER: &str = "emstencil=debug";

/// Install the global subscriber. `mirror_stderr` also prints warnings and
/// errors to stderr, which only makes sense outside the TUI.
pub fn init(log_file: &Path, mirror_stderr: bool) -> Result<()> {
    let file = File::create(log_file)
        .with_context(|| format!("failed to create log file {}", log_file.display()))?;

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    let stderr_layer = mirror_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

/// Contents of the run log for display. A missing file is not an error;
/// the viewer just says so.
pub fn read_log(log_file: &Path) -> String {
    match fs::read_to_string(log_file) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => "Log file not found.".to_string(),
        Err(err) => format!("Error loading log file:\n{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_log_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(read_log(&tmp.path().join("runlog.log")), "Log file not found.");
    }

    #[test]
    fn test_read_log_returns_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runlog.log");
        fs::write(&path, "INFO Launching application...\n").unwrap();
        assert_eq!(read_log(&path), "INFO Launching application...\n");
    }
}

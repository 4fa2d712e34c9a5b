//! Where EmStencil keeps its files. Everything lives in one per-user data
//! directory named `EmStencil`: the SQLite store and the run log. Its parent
//! follows the platform conventions (`~/Library/Application Support` on macOS,
//! `%LOCALAPPDATA%` on Windows so the data is not roamed with the profile,
//! `$XDG_DATA_HOME` on Linux) and can be overridden from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;

/// Application name used for the platform data directory.
const APP_NAME: &str = "EmStencil";
/// SQLite file name stored inside the data directory.
const DB_FILE_NAME: &str = "templates.db";
/// Run log, truncated on every launch.
const LOG_FILE_NAME: &str = "runlog.log";

/// Resolved file locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub database_file: PathBuf,
    pub log_file: PathBuf,
    /// External DDL to bootstrap the schema from. `None` uses the schema
    /// compiled into the binary.
    pub schema_file: Option<PathBuf>,
}

impl AppPaths {
    /// Resolve paths from the optional overrides, falling back to the
    /// platform data directory.
    pub fn resolve(data_dir: Option<PathBuf>, schema_file: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        Ok(Self::in_dir(data_dir, schema_file))
    }

    /// Lay the files out inside `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>, schema_file: Option<PathBuf>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            database_file: data_dir.join(DB_FILE_NAME),
            log_file: data_dir.join(LOG_FILE_NAME),
            data_dir,
            schema_file,
        }
    }

    /// Create the data directory if this is the first run.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("failed to create data directory {}", self.data_dir.display())
        })
    }
}

/// `<local data dir>/EmStencil`, same folder name on every platform.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(dirs.data_local_dir().join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_live_in_data_dir() {
        let paths = AppPaths::in_dir("/tmp/emstencil-data", None);
        assert_eq!(paths.database_file, Path::new("/tmp/emstencil-data/templates.db"));
        assert_eq!(paths.log_file, Path::new("/tmp/emstencil-data/runlog.log"));
        assert_eq!(paths.schema_file, None);
    }

    #[test]
    fn test_resolve_prefers_override() {
        let paths = AppPaths::resolve(
            Some(PathBuf::from("custom")),
            Some(PathBuf::from("schema.sql")),
        )
        .unwrap();
        assert_eq!(paths.data_dir, PathBuf::from("custom"));
        assert_eq!(paths.schema_file, Some(PathBuf::from("schema.sql")));
    }

    #[test]
    fn test_default_dir_keeps_application_case() {
        let Some(base) = BaseDirs::new() else {
            return;
        };
        let paths = AppPaths::resolve(None, None).unwrap();
        assert_eq!(paths.data_dir, base.data_local_dir().join("EmStencil"));
        assert_eq!(paths.database_file, paths.data_dir.join("templates.db"));
    }

    #[test]
    fn test_ensure_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::in_dir(tmp.path().join("nested").join("data"), None);
        paths.ensure().unwrap();
        assert!(paths.data_dir.is_dir());
    }
}

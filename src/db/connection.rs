use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::StoreError;

/// DDL compiled into the binary, used unless an external schema file is
/// configured.
const SCHEMA: &str = include_str!("schema.sql");

/// Enable foreign keys and create any missing tables and views. Every
/// statement in the DDL uses `IF NOT EXISTS`, so running this against an
/// existing database is a no-op.
pub(crate) fn ensure_schema(conn: &Connection, schema_file: Option<&Path>) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    let ddl = match schema_file {
        Some(path) => {
            if !path.exists() {
                return Err(StoreError::SchemaSourceMissing {
                    path: path.to_path_buf(),
                }
                .into());
            }
            debug!("Reading schema file {}", path.display());
            fs::read_to_string(path)
                .with_context(|| format!("failed to read schema file {}", path.display()))?
        }
        None => SCHEMA.to_string(),
    };

    conn.execute_batch(&ddl)
        .context("failed to create database schema")?;
    Ok(())
}

/// Handle over the single SQLite file. One handle is opened per process and
/// passed to whatever needs the store; `close` may be called any number of
/// times and every operation afterwards fails with [`StoreError::Closed`].
#[derive(Debug)]
pub struct TemplateStore {
    conn: Option<Connection>,
}

impl TemplateStore {
    /// Open (creating if needed) the database at `path` and bootstrap the
    /// schema.
    pub fn open(path: &Path, schema_file: Option<&Path>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }

        let existed = path.exists();
        let conn = Connection::open(path).context("failed to open SQLite database")?;
        ensure_schema(&conn, schema_file)?;

        if existed {
            info!("Using existing database found at: {}", path.display());
        } else {
            info!("Created database: {}", path.display());
        }
        Ok(Self { conn: Some(conn) })
    }

    /// Private database that disappears with the handle. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        ensure_schema(&conn, None)?;
        Ok(Self { conn: Some(conn) })
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection. Closing an already closed store does nothing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, err)| err)
                .context("failed to close database")?;
            debug!("Database connection closed");
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| StoreError::Closed.into())
    }

    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        conn.transaction().context("failed to start transaction")
    }
}

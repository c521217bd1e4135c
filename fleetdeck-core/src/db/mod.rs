mod agents;
mod logs;
mod projects;
mod reports;
mod schema;
mod tasks;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("could not determine a data directory for the database")]
    DataDir,
    #[error("database connection poisoned")]
    Poisoned,
}

/// Handle to the dashboard store. Cheap to clone; all clones share one
/// connection behind a mutex, so concurrent requests serialize on the
/// store's own locking and nothing else.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Open the database at the platform data directory
    /// (e.g. `~/.local/share/fleetdeck/fleetdeck.db` on Linux).
    pub fn open_default() -> Result<Self, StorageError> {
        let dirs = directories::ProjectDirs::from("com", "rocket-tycoon", "fleetdeck")
            .ok_or(StorageError::DataDir)?;
        Self::open(dirs.data_dir().join("fleetdeck.db"))
    }

    fn from_connection(conn: Connection) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)) }
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!("database schema applied");
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        use rusqlite::OptionalExtension;
        let conn = self.conn()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
                [table_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

// Row-conversion helpers shared by the per-entity query modules. Column
// failures are reported through rusqlite's own conversion error so they can
// surface from inside `query_map` closures.

pub(crate) fn column_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn invalid_text(index: usize, message: String) -> rusqlite::Error {
    column_error(
        index,
        std::io::Error::new(std::io::ErrorKind::InvalidData, message),
    )
}

pub(crate) fn ts_column(row: &rusqlite::Row, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| column_error(index, err))
}

pub(crate) fn opt_ts_column(
    row: &rusqlite::Row,
    index: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    row.get::<_, Option<String>>(index)?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|err| column_error(index, err))
        })
        .transpose()
}

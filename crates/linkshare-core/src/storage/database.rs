//! Database handle
//!
//! A [`Database`] knows where the SQLite file lives and how connections are
//! configured. It holds no connection itself: each worker calls
//! [`Database::connect`] and owns the result, so requests share nothing
//! in-process and coordinate only through SQLite's locks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::config::{Config, MAX_BUSY_TIMEOUT_MS};
use crate::error::{CoreError, CoreResult};
use crate::storage::schema::{init_schema, needs_init};

/// Location and connection settings for the SQLite database
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open the database described by `config`, creating it if needed
    pub fn open(config: &Config) -> CoreResult<Self> {
        Self::open_at(config.database_path(), config.busy_timeout())
    }

    /// Open or create a database file at `path`
    ///
    /// Switches the file to WAL mode and initializes the schema.
    pub fn open_at(path: impl Into<PathBuf>, busy_timeout: Duration) -> CoreResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::DataDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let db = Self { path, busy_timeout };
        let conn = db.connect()?;

        // Readers never block the single writer in WAL mode
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| CoreError::storage(e, "enabling WAL journal"))?;

        if needs_init(&conn) {
            init_schema(&conn).map_err(|e| CoreError::storage(e, "initializing schema"))?;
            debug!("Initialized schema at {:?}", db.path);
        }

        Ok(db)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock wait applied to new connections
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Open a new connection for one worker
    pub fn connect(&self) -> CoreResult<Connection> {
        self.connect_with_timeout(self.busy_timeout)
    }

    /// Open a new connection with a caller-imposed lock wait
    ///
    /// Any statement that cannot get its lock within `timeout` fails with
    /// [`CoreError::Timeout`]. Waits SQLite cannot express are rejected.
    pub fn connect_with_timeout(&self, timeout: Duration) -> CoreResult<Connection> {
        if timeout.as_millis() > u128::from(MAX_BUSY_TIMEOUT_MS) {
            return Err(CoreError::validation(format!(
                "Busy timeout must be at most {} ms",
                MAX_BUSY_TIMEOUT_MS
            )));
        }

        let conn = Connection::open(&self.path)
            .map_err(|e| CoreError::storage(e, format!("opening database {:?}", self.path)))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| CoreError::storage(e, "enabling foreign keys"))?;
        conn.busy_timeout(timeout)
            .map_err(|e| CoreError::storage(e, "setting busy timeout"))?;

        Ok(conn)
    }
}

/// Start a write transaction
///
/// `BEGIN IMMEDIATE` takes the database write lock before the first read,
/// so a value read inside the transaction cannot be changed by another
/// writer until it commits or rolls back. Dropping the transaction without
/// committing rolls it back.
pub fn begin_write(conn: &Connection) -> CoreResult<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| CoreError::storage(e, "starting write transaction"))
}

/// Start a read transaction (one consistent snapshot for several queries)
pub fn begin_read(conn: &Connection) -> CoreResult<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Deferred)
        .map_err(|e| CoreError::storage(e, "starting read transaction"))
}

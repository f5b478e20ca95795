//! SQLite store behind duplicate tracking and the dispatch run ledger.
//!
//! One connection, shared by the coordinator and every worker thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod processed_repo;
pub mod run_repo;

pub use error::DatabaseError;

/// Cloneable handle; clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the store at `path`, creating parent directories,
    /// and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // Workers write concurrently with the coordinator's reads.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let db = Self::prepare(conn)?;
        log::info!(
            "Tracking store at {} (schema v{})",
            path.display(),
            db.schema_version()?
        );
        Ok(db)
    }

    /// Store that lives only as long as the handle. Used by tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` while holding the connection lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&mut conn)
    }

    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(|conn| migrations::current_version(conn))
    }
}

/// `~/.mailbatch/data/mailbatch.db`, or `None` without a home directory.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mailbatch").join("data").join("mailbatch.db"))
}

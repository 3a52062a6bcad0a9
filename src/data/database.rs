//! SQLite database management

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use super::migrations;
use crate::config::Config;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create data directory: {0}")]
    CreateDir(std::io::Error),
    #[error("Lock poisoned")]
    LockPoisoned,
    #[error("Database is busy")]
    Busy,
}

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Path to the database file (`None` for in-memory databases)
    pub path: Option<PathBuf>,
}

impl Database {
    /// Open or create a database at the specified path
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::CreateDir)?;
        }

        let conn = Connection::open(&path)?;
        tracing::debug!(path = %path.display(), "Opened recovery database");
        Self::from_connection(conn, Some(path))
    }

    /// Open a throwaway database that lives only as long as this handle
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    /// Open the database `config.toml` in the data directory points at
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open_with_config(&Config::load())
    }

    /// Open the database named by `config`
    pub fn open_with_config(config: &Config) -> Result<Self, StorageError> {
        Self::open(config.database_path())
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.busy_timeout(Duration::from_secs(5))?;

        // Run migrations
        migrations::run_migrations(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Get a reference to the connection (for stores)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&conn).map_err(StorageError::Sqlite)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish()
    }
}

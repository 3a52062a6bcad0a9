//! SQLite-backed recovery props store (key-value)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use super::database::StorageError;
use super::models::StoredProps;
use super::store::{KeyValueStore, LOCK_WAIT};

/// Data access object for the `recovery_props` table, keyed by experience id
#[derive(Clone)]
pub struct RecoveryPropsStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecoveryPropsStore {
    /// Create a new RecoveryPropsStore
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Lock the connection, giving up after [`LOCK_WAIT`] instead of blocking
    fn try_lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match self.conn.try_lock() {
                Ok(conn) => return Ok(conn),
                Err(TryLockError::Poisoned(_)) => return Err(StorageError::LockPoisoned),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    return Err(StorageError::Busy)
                }
                Err(TryLockError::WouldBlock) => std::thread::sleep(Duration::from_millis(5)),
            }
        }
    }

    fn upsert(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO recovery_props (experience_id, props, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(experience_id) DO UPDATE SET props = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// List every unconsumed snapshot, most recently written first
    pub fn list(&self) -> Result<Vec<StoredProps>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT experience_id, props, updated_at FROM recovery_props
             ORDER BY updated_at DESC, experience_id ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_stored_props)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete every stored snapshot, returning how many were removed
    pub fn clear_all(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM recovery_props", [])?)
    }

    fn row_to_stored_props(row: &rusqlite::Row) -> rusqlite::Result<StoredProps> {
        let experience_id: String = row.get(0)?;
        let updated_at_str: String = row.get(2)?;
        let updated_at = match DateTime::parse_from_rfc3339(&updated_at_str) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    experience_id = %experience_id,
                    updated_at = %updated_at_str,
                    error = %e,
                    "Unparseable updated_at, using current time"
                );
                Utc::now()
            }
        };
        Ok(StoredProps {
            experience_id,
            props: row.get(1)?,
            updated_at,
        })
    }
}

impl KeyValueStore for RecoveryPropsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT props FROM recovery_props WHERE experience_id = ?1")?;
        let mut rows = stmt.query(params![key])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        Self::upsert(&conn, key, value)
    }

    fn try_put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.try_lock()?;
        Self::upsert(&conn, key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM recovery_props WHERE experience_id = ?1",
            params![key],
        )?;
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        // Read and delete under one lock so a single reader sees a single value
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value: Option<String> = {
            let mut stmt =
                tx.prepare("SELECT props FROM recovery_props WHERE experience_id = ?1")?;
            let mut rows = stmt.query(params![key])?;
            let value = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            value
        };
        if value.is_some() {
            tx.execute(
                "DELETE FROM recovery_props WHERE experience_id = ?1",
                params![key],
            )?;
        }
        tx.commit()?;
        Ok(value)
    }
}

//! Store fixtures for integration tests

use recovery_props::{Database, ExperienceId, RecoveryProps, RecoveryPropsStore};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// A SQLite-backed store in a temporary directory
///
/// The directory (and database) is removed when the fixture is dropped.
/// [`TestStore::reopen`] simulates a process restart by opening a fresh
/// connection to the same file.
pub struct TestStore {
    /// TempDir handle (keeps directory alive until dropped)
    pub dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("recovery.db");
        Self { dir, db_path }
    }

    /// Open a new connection, as a relaunched process would
    pub fn reopen(&self) -> RecoveryPropsStore {
        let db = Database::open(self.db_path.clone()).expect("Failed to open database");
        RecoveryPropsStore::new(db.connection())
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn experience(id: &str) -> ExperienceId {
    ExperienceId::new(id).expect("valid experience id")
}

/// Build recovery props from a `json!` object literal
pub fn props(value: Value) -> RecoveryProps {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

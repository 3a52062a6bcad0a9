//! Data persistence layer
//!
//! Key-value storage for recovery props: a SQLite-backed store, an in-memory
//! store, and a shim that scopes either one to a single experience.

mod database;
mod migrations;
mod models;
mod recovery_props;
mod scoped;
mod store;

pub use database::{Database, StorageError};
pub use models::{EmptyExperienceId, ExperienceId, RecoveryProps, StoredProps};
pub use recovery_props::RecoveryPropsStore;
pub use scoped::ScopedRecoveryStore;
pub use store::{KeyValueStore, MemoryStore, LOCK_WAIT};

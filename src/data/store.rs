//! Key-value storage backends for recovery props

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::database::StorageError;

/// How long [`KeyValueStore::try_put`] waits for a held lock
pub const LOCK_WAIT: Duration = Duration::from_millis(100);

/// Minimal persistent key-value contract the recovery shim is written against.
///
/// Implementations must make a single `put` or `remove` atomic for its key;
/// nothing beyond that is assumed.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored at `key`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` at `key`, replacing whatever was there
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Like [`put`](Self::put), but fails with [`StorageError::Busy`] instead of
    /// waiting on a lock that is not released within [`LOCK_WAIT`].
    ///
    /// Used from panic hooks, where the panicking thread may itself hold the lock.
    fn try_put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put(key, value)
    }

    /// Read the value at `key` and delete it if it was present
    fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self.get(key)?;
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn try_put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).try_put(key, value)
    }

    fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).take(key)
    }
}

/// In-process store; clones share the same map
#[derive(Clone, Default, Debug)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn try_put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .try_lock_for(LOCK_WAIT)
            .ok_or(StorageError::Busy)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().remove(key))
    }
}

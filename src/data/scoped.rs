//! Storage shim bound to a single experience

use super::database::StorageError;
use super::models::ExperienceId;
use super::store::KeyValueStore;

/// A key-value store viewed through one experience identifier.
///
/// At most one snapshot exists per experience. Reading it through
/// [`consume_recovery_props`](Self::consume_recovery_props) deletes it.
#[derive(Clone, Debug)]
pub struct ScopedRecoveryStore<S> {
    store: S,
    experience_id: ExperienceId,
}

impl<S: KeyValueStore> ScopedRecoveryStore<S> {
    pub fn new(store: S, experience_id: ExperienceId) -> Self {
        Self {
            store,
            experience_id,
        }
    }

    pub fn experience_id(&self) -> &ExperienceId {
        &self.experience_id
    }

    /// Store an encoded snapshot, overwriting any prior one for this experience
    pub fn set_recovery_props(&self, props: &str) -> Result<(), StorageError> {
        self.store.put(self.experience_id.as_str(), props)?;
        tracing::debug!(
            experience_id = %self.experience_id,
            bytes = props.len(),
            "Stored recovery props"
        );
        Ok(())
    }

    /// [`set_recovery_props`](Self::set_recovery_props) that gives up with
    /// [`StorageError::Busy`] rather than wait on a held store lock
    pub fn try_set_recovery_props(&self, props: &str) -> Result<(), StorageError> {
        self.store.try_put(self.experience_id.as_str(), props)
    }

    /// Return the stored snapshot and delete it, or `None` if nothing is stored
    pub fn consume_recovery_props(&self) -> Result<Option<String>, StorageError> {
        let props = self.store.take(self.experience_id.as_str())?;
        if props.is_some() {
            tracing::info!(experience_id = %self.experience_id, "Consumed recovery props");
        }
        Ok(props)
    }

    /// Drop any stored snapshot without reading it
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(self.experience_id.as_str())
    }
}

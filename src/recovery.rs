//! Application-facing recovery props API.
//!
//! [`ErrorRecovery`] consumes whatever snapshot the previous run left behind
//! once, at construction, and exposes it as [`recovered_props`]. Props the
//! application sets are encoded immediately and kept in memory; they are
//! written to storage when an uncaught error reaches the snapshot handler.
//!
//! [`recovered_props`]: ErrorRecovery::recovered_props

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::codec::{self, CodecError, JsonCodec, PropsCodec};
use crate::data::{
    ExperienceId, KeyValueStore, RecoveryProps, ScopedRecoveryStore, StorageError, LOCK_WAIT,
};
use crate::hook::{self, ErrorEvent, ErrorHandler, HandlerChain, HandlerError};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Name the snapshot handler is registered under in a [`HandlerChain`]
pub const SNAPSHOT_HANDLER: &str = "recovery-props-snapshot";

pub struct ErrorRecovery<S, C = JsonCodec> {
    shim: ScopedRecoveryStore<S>,
    codec: C,
    pending: Mutex<Option<String>>,
    recovered: Option<RecoveryProps>,
}

impl<S: KeyValueStore> ErrorRecovery<S, JsonCodec> {
    /// Bind to `store` for `experience_id`, consuming any props left by the last run
    pub fn new(store: S, experience_id: ExperienceId) -> Result<Self, RecoveryError> {
        Self::with_codec(store, experience_id, JsonCodec)
    }
}

impl<S: KeyValueStore, C: PropsCodec> ErrorRecovery<S, C> {
    pub fn with_codec(
        store: S,
        experience_id: ExperienceId,
        codec: C,
    ) -> Result<Self, RecoveryError> {
        let shim = ScopedRecoveryStore::new(store, experience_id);
        let recovered = match shim.consume_recovery_props()? {
            Some(encoded) => Some(codec.decode(&encoded)?),
            None => None,
        };
        if recovered.is_some() {
            tracing::info!(
                experience_id = %shim.experience_id(),
                "Recovered props from previous run"
            );
        }

        Ok(Self {
            shim,
            codec,
            pending: Mutex::new(None),
            recovered,
        })
    }

    pub fn experience_id(&self) -> &ExperienceId {
        self.shim.experience_id()
    }

    /// Props the previous run saved before crashing, if any
    pub fn recovered_props(&self) -> Option<&RecoveryProps> {
        self.recovered.as_ref()
    }

    /// Recovered props deserialized into `T`
    pub fn recovered_props_as<T: DeserializeOwned>(&self) -> Result<Option<T>, CodecError> {
        self.recovered.as_ref().map(codec::from_props::<T>).transpose()
    }

    /// Encode `props` and hold them as the snapshot to save on the next error.
    ///
    /// Replaces any earlier snapshot. Nothing is written to storage here.
    pub fn set_recovery_props(&self, props: &RecoveryProps) -> Result<(), RecoveryError> {
        let encoded = self.codec.encode(props)?;
        *self.pending.lock() = Some(encoded);
        Ok(())
    }

    /// [`set_recovery_props`](Self::set_recovery_props) for any value that serializes to a JSON object
    pub fn set_recovery_props_typed<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<(), RecoveryError> {
        self.set_recovery_props(&codec::to_props(value)?)
    }

    /// Forget the in-memory snapshot so a later error saves nothing
    pub fn clear_recovery_props(&self) {
        self.pending.lock().take();
    }

    /// The encoded snapshot waiting to be saved
    pub fn pending_recovery_props(&self) -> Option<String> {
        self.pending.lock().clone()
    }

    /// Write the pending snapshot to storage. Returns `false` if nothing was set.
    pub fn save_recovery_props(&self) -> Result<bool, RecoveryError> {
        let pending = self.pending.lock().clone();
        match pending {
            Some(encoded) => {
                self.shim.set_recovery_props(&encoded)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Encode and store `props` right away, overwriting any stored snapshot
    pub fn persist_recovery_props(&self, props: &RecoveryProps) -> Result<(), RecoveryError> {
        self.set_recovery_props(props)?;
        self.save_recovery_props()?;
        Ok(())
    }

    /// Read and delete whatever is currently stored for this experience
    pub fn consume_recovery_props(&self) -> Result<Option<RecoveryProps>, RecoveryError> {
        match self.shim.consume_recovery_props()? {
            Some(encoded) => Ok(Some(self.codec.decode(&encoded)?)),
            None => Ok(None),
        }
    }

    /// Snapshot step for an error event.
    ///
    /// Never blocks on a held lock: the thread that raised the error may be
    /// the one holding it, so a busy store fails with [`StorageError::Busy`].
    pub fn handle_error(&self, event: &ErrorEvent) -> Result<(), RecoveryError> {
        let pending = self
            .pending
            .try_lock_for(LOCK_WAIT)
            .ok_or(StorageError::Busy)?
            .clone();
        if let Some(encoded) = pending {
            self.shim.try_set_recovery_props(&encoded)?;
            tracing::info!(
                experience_id = %self.experience_id(),
                is_fatal = event.is_fatal,
                error = %event,
                "Saved recovery props for uncaught error"
            );
        }
        Ok(())
    }
}

impl<S, C> ErrorRecovery<S, C>
where
    S: KeyValueStore + 'static,
    C: PropsCodec + 'static,
{
    /// A chain handler that saves the pending snapshot
    pub fn handler(self: &Arc<Self>) -> ErrorHandler {
        let recovery = Arc::clone(self);
        Arc::new(move |event: &ErrorEvent| -> Result<(), HandlerError> {
            recovery.handle_error(event)?;
            Ok(())
        })
    }

    /// A chain with the snapshot handler at its head
    pub fn handler_chain(self: &Arc<Self>) -> HandlerChain {
        let mut chain = HandlerChain::new();
        chain.push_shared(SNAPSHOT_HANDLER, self.handler());
        chain
    }

    /// Snapshot on every panic, then defer to the previously installed panic hook
    pub fn install(self: &Arc<Self>) {
        hook::install_panic_hook(self.handler_chain());
        tracing::debug!(experience_id = %self.experience_id(), "Installed recovery panic hook");
    }
}

impl<S: KeyValueStore, C> fmt::Debug for ErrorRecovery<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecovery")
            .field("experience_id", &self.shim.experience_id())
            .field("has_pending", &self.pending.lock().is_some())
            .field("recovered", &self.recovered)
            .finish()
    }
}

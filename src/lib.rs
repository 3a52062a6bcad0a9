pub mod codec;
pub mod config;
pub mod data;
pub mod hook;
pub mod recovery;
pub mod util;

pub use codec::{CodecError, JsonCodec, PropsCodec};
pub use config::Config;
pub use data::{
    Database, ExperienceId, KeyValueStore, MemoryStore, RecoveryProps, RecoveryPropsStore,
    ScopedRecoveryStore, StorageError, StoredProps,
};
pub use hook::{install_panic_hook, ErrorEvent, ErrorHandler, HandlerChain, HandlerError};
pub use recovery::{ErrorRecovery, RecoveryError, SNAPSHOT_HANDLER};

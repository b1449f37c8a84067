//! Profile storage and persistence module.
//!
//! Key-value backends, the record types they hold, the profile store and
//! the legacy migration.

pub mod kv;
pub mod migration;
pub mod profiles;
pub mod types;

// Re-export commonly used items
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, StorageMap};
pub use profiles::ProfileStore;
pub use types::*;

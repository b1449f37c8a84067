//! Storage layout and runtime configuration.
//!
//! Names of the reserved keys, the on-disk file names used by the JSON
//! backends, and resolution of the data directory.

use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

// =============================================================================
// Reserved Keys
// =============================================================================

/// Sync store key holding the default profile name.
pub const DEFAULT_PROFILE_KEY: &str = "defaultProfile";

/// Sync store key holding the legacy debug flag.
pub const DEBUG_MODE_KEY: &str = "debugMode";

/// Sync store keys that never denote a profile.
pub const RESERVED_KEYS: [&str; 2] = [DEFAULT_PROFILE_KEY, DEBUG_MODE_KEY];

/// Local store key holding [`GlobalSettings`](crate::storage::GlobalSettings).
pub const GLOBAL_SETTINGS_KEY: &str = "globalSettings";

/// Local store key holding the last successful push, in epoch milliseconds.
pub const LAST_SENT_TIMESTAMP_KEY: &str = "lastSentTimestamp";

/// Profile field whose presence marks a record as legacy.
pub const LEGACY_AESR_ID_FIELD: &str = "aesrId";

/// Data type announced in `updateConfig` messages.
pub const CONFIG_DATA_TYPE: &str = "ini";

/// Returns true when `key` is one of the reserved sync store keys.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// =============================================================================
// Data Directory
// =============================================================================

const APP_NAME: &str = "aesr-config-sync";
const DATA_DIR_ENV: &str = "AESR_SYNC_DIR";

const SYNC_FILE: &str = "sync.json";
const LOCAL_FILE: &str = "local.json";
const OUTBOX_FILE: &str = "outbox.jsonl";

/// Where the JSON backends keep their files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl StoreConfig {
    /// Use an explicit data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory from `AESR_SYNC_DIR`, falling back to the
    /// platform config directory.
    /// - Linux: ~/.config/aesr-config-sync/
    /// - Windows: %APPDATA%\aesr-config-sync\
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }

        dirs::config_dir()
            .map(|p| Self::new(p.join(APP_NAME)))
            .ok_or_else(|| SyncError::storage("Could not find config directory"))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File backing the synchronized store (profiles and default pointer).
    pub fn sync_path(&self) -> PathBuf {
        self.data_dir.join(SYNC_FILE)
    }

    /// File backing the device-local store (global settings, timestamps).
    pub fn local_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_FILE)
    }

    /// File receiving outgoing runtime messages.
    pub fn outbox_path(&self) -> PathBuf {
        self.data_dir.join(OUTBOX_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("defaultProfile"));
        assert!(is_reserved_key("debugMode"));
        assert!(!is_reserved_key("prod"));
        assert!(!is_reserved_key("DefaultProfile"));
    }

    #[test]
    fn test_store_paths() {
        let config = StoreConfig::new("/tmp/aesr");
        assert_eq!(config.sync_path(), PathBuf::from("/tmp/aesr/sync.json"));
        assert_eq!(config.local_path(), PathBuf::from("/tmp/aesr/local.json"));
        assert_eq!(config.outbox_path(), PathBuf::from("/tmp/aesr/outbox.jsonl"));
    }
}

//! Profile storage and persistence.
//!
//! CRUD over the synchronized store, the default-profile pointer, and the
//! small records kept in the local store.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::config::{
    DEFAULT_PROFILE_KEY, GLOBAL_SETTINGS_KEY, LAST_SENT_TIMESTAMP_KEY, StoreConfig,
};
use crate::error::{Result, SyncError};
use crate::session::SessionState;
use crate::storage::kv::{JsonFileStore, KeyValueStore, MemoryStore, StorageMap};
use crate::storage::types::{
    AwsCredentials, GlobalSettings, Profile, ProfileExport, ProfileListing, StorageSnapshot,
    StoredEntry,
};
use crate::utils::parsing::{parse_timestamp_millis, validate_profile_name};

const INVALID_PROFILE_DATA: &str = "Invalid profile data";

fn single(key: &str, value: Value) -> StorageMap {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn encode_profile(profile: &Profile) -> Result<Value> {
    serde_json::to_value(profile)
        .map_err(|e| SyncError::storage(format!("Failed to serialize profile: {}", e)))
}

// =============================================================================
// ProfileStore
// =============================================================================

/// Profiles in the synchronized store plus extension-wide records in the
/// local store.
///
/// The store holds no locks of its own. Two concurrent saves of the same
/// name race and the last completed write wins.
#[derive(Clone)]
pub struct ProfileStore {
    sync: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish_non_exhaustive()
    }
}

impl ProfileStore {
    pub fn new(sync: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { sync, local }
    }

    /// Open the JSON file backends under `config.data_dir`.
    pub fn open(config: &StoreConfig) -> Self {
        Self::new(
            Arc::new(JsonFileStore::new(config.sync_path())),
            Arc::new(JsonFileStore::new(config.local_path())),
        )
    }

    /// Fresh in-memory backends.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn sync_store(&self) -> &dyn KeyValueStore {
        self.sync.as_ref()
    }

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    /// Create or overwrite the profile stored under `name`.
    pub async fn save(&self, name: &str, profile: &Profile) -> Result<()> {
        validate_profile_name(name)?;
        log::debug!("Saving profile '{}'", name);
        self.sync
            .set(single(name, encode_profile(profile)?))
            .await
    }

    /// Read a profile without touching any session.
    pub async fn get(&self, name: &str) -> Result<Option<Profile>> {
        let mut items = self.sync.get(Some(name)).await?;
        Ok(match items.remove(name) {
            Some(value) => match StoredEntry::decode(name, value) {
                StoredEntry::Profile(profile) => Some(profile),
                _ => None,
            },
            None => None,
        })
    }

    /// Read a profile and make it the session's current profile.
    ///
    /// A missing profile returns `None` and leaves the session untouched.
    pub async fn load(&self, name: &str, session: &SessionState) -> Result<Option<Profile>> {
        let profile = self.get(name).await?;
        match &profile {
            Some(data) => {
                log::debug!("Loaded profile '{}'", name);
                session.set_current(name, data.clone());
            }
            None => log::debug!("Profile '{}' not found", name),
        }
        Ok(profile)
    }

    /// Every stored key, decoded.
    pub async fn snapshot(&self) -> Result<StorageSnapshot> {
        Ok(StorageSnapshot::decode(self.sync.get(None).await?))
    }

    /// All profiles plus the default pointer.
    pub async fn list_all(&self) -> Result<ProfileListing> {
        let snapshot = self.snapshot().await?;
        Ok(ProfileListing {
            profiles: snapshot.profiles,
            default_profile_name: snapshot.default_profile,
        })
    }

    /// Remove a profile. Deleting an absent profile succeeds.
    pub async fn delete(&self, name: &str) -> Result<()> {
        log::debug!("Deleting profile '{}'", name);
        self.sync.remove(name).await
    }

    /// Merge identity-provider credentials into the session's current
    /// profile and store the result under `name`.
    pub async fn save_aws_credentials(
        &self,
        name: &str,
        credentials: AwsCredentials,
        session: &SessionState,
    ) -> Result<()> {
        let current = session
            .current()
            .ok_or_else(|| SyncError::validation("No current profile data found"))?;

        let mut profile = current.data;
        profile.aws_credentials = Some(credentials);
        self.save(name, &profile).await?;
        session.set_current(name, profile);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Default Profile
    // -------------------------------------------------------------------------

    /// Point the default at `name`. The target is not required to exist.
    pub async fn set_default(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(SyncError::validation("No profile selected"));
        }

        self.sync
            .set(single(DEFAULT_PROFILE_KEY, Value::String(name.to_string())))
            .await?;
        log::debug!("Default profile set to '{}'", name);
        Ok(name.to_string())
    }

    /// The stored default pointer, `None` when unset or empty.
    pub async fn get_default(&self) -> Result<Option<String>> {
        let mut items = self.sync.get(Some(DEFAULT_PROFILE_KEY)).await?;
        Ok(match items.remove(DEFAULT_PROFILE_KEY) {
            Some(value) => match StoredEntry::decode(DEFAULT_PROFILE_KEY, value) {
                StoredEntry::DefaultPointer(name) => name,
                _ => None,
            },
            None => None,
        })
    }

    /// List profiles and load the default one into the session, if it
    /// exists. A dangling default pointer is left as is.
    pub async fn activate_default(&self, session: &SessionState) -> Result<ProfileListing> {
        let listing = self.list_all().await?;

        match listing.resolved_default() {
            Some((name, profile)) => session.set_current(name, profile.clone()),
            None => {
                if let Some(name) = &listing.default_profile_name {
                    log::warn!("Default profile '{}' no longer exists", name);
                }
            }
        }

        Ok(listing)
    }

    // -------------------------------------------------------------------------
    // Import / Export
    // -------------------------------------------------------------------------

    /// Store a profile from export-file text: a JSON object whose only key is
    /// the profile name and whose value is the profile record.
    pub async fn import_from_str(&self, raw: &str) -> Result<String> {
        let invalid = || SyncError::validation(INVALID_PROFILE_DATA);

        let parsed: Value = serde_json::from_str(raw).map_err(|e| {
            log::debug!("Import payload is not JSON: {}", e);
            invalid()
        })?;
        let Value::Object(map) = parsed else {
            return Err(invalid());
        };
        if map.len() != 1 {
            return Err(invalid());
        }

        let Some((name, value)) = map.into_iter().next() else {
            return Err(invalid());
        };
        if !value.is_object() {
            return Err(invalid());
        }
        let profile: Profile = serde_json::from_value(value).map_err(|e| {
            log::debug!("Import payload is not a profile: {}", e);
            invalid()
        })?;

        self.save(&name, &profile).await?;
        log::info!("Imported profile '{}'", name);
        Ok(name)
    }

    /// Read an export file from disk and import it.
    pub async fn import_from_file(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path).await?;
        self.import_from_str(&content).await
    }

    /// Serialize the stored record as `{"<name>": <record>}`.
    ///
    /// Returns `None` when no profile is stored under `name`.
    pub async fn export_profile(&self, name: &str) -> Result<Option<ProfileExport>> {
        let mut items = self.sync.get(Some(name)).await?;
        let Some(value) = items.remove(name) else {
            return Ok(None);
        };
        if !matches!(StoredEntry::decode(name, value.clone()), StoredEntry::Profile(_)) {
            return Ok(None);
        }

        let data = serde_json::to_string(&Value::Object(single(name, value)))
            .map_err(|e| SyncError::storage(format!("Failed to serialize profile: {}", e)))?;

        Ok(Some(ProfileExport {
            data,
            filename: format!("{}.json", name),
        }))
    }

    // -------------------------------------------------------------------------
    // Local Records
    // -------------------------------------------------------------------------

    pub async fn global_settings(&self) -> Result<Option<GlobalSettings>> {
        let mut items = self.local.get(Some(GLOBAL_SETTINGS_KEY)).await?;
        let Some(value) = items.remove(GLOBAL_SETTINGS_KEY) else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                log::warn!("Ignoring malformed global settings: {}", e);
                Ok(None)
            }
        }
    }

    /// Overwrite the global settings record.
    pub async fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let value = serde_json::to_value(settings)
            .map_err(|e| SyncError::storage(format!("Failed to serialize settings: {}", e)))?;
        self.local.set(single(GLOBAL_SETTINGS_KEY, value)).await
    }

    /// When a config was last pushed, in epoch milliseconds.
    pub async fn last_sent_timestamp(&self) -> Result<Option<i64>> {
        let items = self.local.get(Some(LAST_SENT_TIMESTAMP_KEY)).await?;
        Ok(items
            .get(LAST_SENT_TIMESTAMP_KEY)
            .and_then(parse_timestamp_millis))
    }

    pub async fn record_last_sent(&self, millis: i64) -> Result<()> {
        self.local
            .set(single(
                LAST_SENT_TIMESTAMP_KEY,
                Value::String(millis.to_string()),
            ))
            .await
    }
}

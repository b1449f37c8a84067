//! One-time migration of legacy profile records.
//!
//! Older versions stored the AESR extension id inside every profile. The
//! current layout keeps it once, in the local store's global settings, and
//! profiles carry only their S3 object locator.

use futures::future::try_join_all;
use serde_json::Map;

use crate::error::Result;
use crate::storage::profiles::ProfileStore;
use crate::storage::types::{GlobalSettings, MigrationReport};

impl ProfileStore {
    /// Rewrite every legacy profile into the current shape.
    ///
    /// A profile is legacy when its stored object has an `aesrId` field,
    /// whatever its value or the shape of the other fields. Safe to run
    /// repeatedly: once no stored profile carries `aesrId` the call is a
    /// no-op and reports [`MigrationReport::NOT_NEEDED`].
    ///
    /// The extension id is taken from the first legacy profile in name order
    /// and overwrites any existing global settings. Per-profile writes are
    /// issued concurrently; if one fails the error is returned and writes
    /// that already landed are kept, leaving a mix that the next run
    /// finishes.
    pub async fn migrate_legacy_profiles(&self) -> Result<MigrationReport> {
        let snapshot = self.snapshot().await?;

        let Some((first_name, first)) = snapshot.legacy.first_key_value() else {
            log::debug!("No legacy profiles found, migration not needed");
            return Ok(MigrationReport::NOT_NEEDED);
        };

        if let Some(aesr_id) = first.aesr_id() {
            log::info!("Moving AESR id from profile '{}' to global settings", first_name);
            self.save_global_settings(&GlobalSettings::with_aesr_id(aesr_id))
                .await?;
        }

        let writes = snapshot.legacy.iter().map(|(name, record)| async move {
            let mut item = Map::new();
            item.insert(name.clone(), record.to_current_shape());
            self.sync_store().set(item).await?;
            log::debug!("Migrated profile '{}'", name);
            Ok::<_, crate::error::SyncError>(())
        });
        let migrated = try_join_all(writes).await?.len();

        log::info!("Migrated {} legacy profile(s)", migrated);
        Ok(MigrationReport {
            migrated: true,
            profile_count: migrated,
        })
    }
}

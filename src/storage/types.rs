//! Records held in the key-value stores and the views derived from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::config::{DEBUG_MODE_KEY, DEFAULT_PROFILE_KEY, LEGACY_AESR_ID_FIELD, is_reserved_key};

// =============================================================================
// Profile
// =============================================================================

/// Short-lived or static AWS credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|t| !t.is_empty()),
        }
    }

    /// Both the key id and the secret are present.
    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

/// A named bundle of credentials and an S3 object locator.
///
/// Every field is optional because records written by older versions, by
/// imports, or by the Cognito flow each carry a different subset. Fields this
/// type does not know about are kept in `extra` so a record survives a
/// load/save cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Credentials obtained through the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_credentials: Option<AwsCredentials>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_user_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_client_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_identity_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_region: Option<String>,

    /// Only present on legacy records; moved to [`GlobalSettings`] by migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aesr_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.is_empty())
}

impl Profile {
    /// A current-shape profile pointing at `s3://bucket/key` in `region`.
    pub fn new(
        region: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            region: Some(region.into()),
            bucket: Some(bucket.into()),
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Attach static credentials.
    pub fn with_static_credentials(mut self, credentials: &AwsCredentials) -> Self {
        self.access_key_id = Some(credentials.access_key_id.clone());
        self.secret_access_key = Some(credentials.secret_access_key.clone());
        self.session_token = credentials.session_token.clone();
        self
    }

    /// Decode a stored object, keeping fields of an unexpected type in
    /// `extra` instead of rejecting the whole record.
    pub fn from_object(object: Map<String, Value>) -> Profile {
        let mut known = Map::new();
        let mut rejected = Map::new();

        for (key, value) in object {
            let mut field = Map::new();
            field.insert(key.clone(), value);
            let target = match serde_json::from_value::<Profile>(Value::Object(field.clone())) {
                Ok(_) => &mut known,
                Err(e) => {
                    log::warn!("Keeping malformed profile field '{}' as is: {}", key, e);
                    &mut rejected
                }
            };
            target.extend(field);
        }

        let mut profile = match serde_json::from_value::<Profile>(Value::Object(known.clone())) {
            Ok(profile) => profile,
            Err(_) => Profile {
                extra: known,
                ..Default::default()
            },
        };
        profile.extra.extend(rejected);
        profile
    }

    /// Every Cognito sign-in field is filled.
    pub fn has_cognito_login(&self) -> bool {
        [
            &self.cognito_username,
            &self.cognito_password,
            &self.cognito_user_pool_id,
            &self.cognito_client_app_id,
            &self.cognito_identity_pool_id,
            &self.cognito_region,
        ]
        .into_iter()
        .all(filled)
    }

    /// Blank the static credentials when the profile signs in through
    /// Cognito, since those come from the identity provider instead.
    pub fn normalized_for_save(mut self) -> Profile {
        if self.has_cognito_login() {
            self.access_key_id = Some(String::new());
            self.secret_access_key = Some(String::new());
            self.session_token = Some(String::new());
        }
        self
    }

    /// Credentials to use for S3: the static ones when filled, else the
    /// ones stored by a Cognito sign-in.
    pub fn effective_credentials(&self) -> Option<AwsCredentials> {
        if filled(&self.access_key_id) && filled(&self.secret_access_key) {
            return Some(AwsCredentials::new(
                self.access_key_id.clone().unwrap_or_default(),
                self.secret_access_key.clone().unwrap_or_default(),
                self.session_token.clone(),
            ));
        }

        self.aws_credentials
            .as_ref()
            .filter(|c| c.is_complete())
            .cloned()
    }
}

// =============================================================================
// Global Settings
// =============================================================================

/// Extension-wide settings kept in the local (non-synced) store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Id of the AWS Extend Switch Roles extension receiving pushed configs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aesr_id: Option<String>,
}

impl GlobalSettings {
    pub fn with_aesr_id(aesr_id: impl Into<String>) -> Self {
        Self {
            aesr_id: Some(aesr_id.into()),
        }
    }
}

// =============================================================================
// Stored Entries
// =============================================================================

/// One decoded key of the synchronized store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredEntry {
    Profile(Profile),
    /// `None` when the pointer is stored as an empty string.
    DefaultPointer(Option<String>),
    DebugFlag(bool),
    /// Values under a profile key that are not JSON objects.
    Unrecognized(Value),
}

impl StoredEntry {
    /// Decode the value stored under `key`.
    pub fn decode(key: &str, value: Value) -> Self {
        match key {
            DEFAULT_PROFILE_KEY => StoredEntry::DefaultPointer(
                value.as_str().filter(|s| !s.is_empty()).map(str::to_owned),
            ),
            DEBUG_MODE_KEY => StoredEntry::DebugFlag(value.as_bool().unwrap_or(false)),
            _ => match value {
                Value::Object(object) => StoredEntry::Profile(Profile::from_object(object)),
                other => StoredEntry::Unrecognized(other),
            },
        }
    }
}

/// A stored object that still carries the `aesrId` field, kept exactly as
/// stored so that records the typed [`Profile`] cannot fully describe are
/// migrated too.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord(pub Map<String, Value>);

impl LegacyRecord {
    /// The embedded extension id, when it is a non-empty string.
    pub fn aesr_id(&self) -> Option<&str> {
        self.0
            .get(LEGACY_AESR_ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// The record this one is rewritten to: the object locator only, with
    /// the stored values copied as they are. Credentials are dropped.
    pub fn to_current_shape(&self) -> Value {
        let locator = ["region", "bucket", "key"]
            .into_iter()
            .filter_map(|field| Some((field.to_string(), self.0.get(field)?.clone())))
            .collect();
        Value::Object(locator)
    }
}

/// The synchronized store decoded in one pass.
///
/// Profiles are ordered by name, which is also the order migration visits
/// legacy records in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageSnapshot {
    pub profiles: BTreeMap<String, Profile>,
    pub legacy: BTreeMap<String, LegacyRecord>,
    pub default_profile: Option<String>,
}

impl StorageSnapshot {
    pub fn decode(items: Map<String, Value>) -> Self {
        let mut snapshot = StorageSnapshot::default();

        for (key, value) in items {
            if let Some(object) = value
                .as_object()
                .filter(|o| !is_reserved_key(&key) && o.contains_key(LEGACY_AESR_ID_FIELD))
            {
                snapshot
                    .legacy
                    .insert(key.clone(), LegacyRecord(object.clone()));
            }

            match StoredEntry::decode(&key, value) {
                StoredEntry::Profile(profile) => {
                    snapshot.profiles.insert(key, profile);
                }
                StoredEntry::DefaultPointer(name) => snapshot.default_profile = name,
                StoredEntry::DebugFlag(_) => {}
                StoredEntry::Unrecognized(_) => {
                    log::debug!("Skipping non-profile entry '{}'", key);
                }
            }
        }

        snapshot
    }
}

// =============================================================================
// Operation Results
// =============================================================================

/// All stored profiles plus the default pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileListing {
    pub profiles: BTreeMap<String, Profile>,
    pub default_profile_name: Option<String>,
}

/// A display row of a [`ProfileListing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub label: String,
    pub is_default: bool,
}

impl ProfileListing {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Rows in name order, the default one labelled `"<name> (default)"`.
    pub fn entries(&self) -> Vec<ProfileEntry> {
        self.profiles
            .keys()
            .map(|name| {
                let is_default = self.default_profile_name.as_deref() == Some(name.as_str());
                let label = if is_default {
                    format!("{} (default)", name)
                } else {
                    name.clone()
                };
                ProfileEntry {
                    name: name.clone(),
                    label,
                    is_default,
                }
            })
            .collect()
    }

    /// The default pointer, only when it names a stored profile.
    pub fn resolved_default(&self) -> Option<(&str, &Profile)> {
        let name = self.default_profile_name.as_deref()?;
        self.profiles.get(name).map(|p| (name, p))
    }
}

/// A profile serialized for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileExport {
    /// `{"<name>": <record>}` as compact JSON.
    pub data: String,
    /// `<name>.json`
    pub filename: String,
}

/// Outcome of [`migrate_legacy_profiles`](crate::storage::ProfileStore::migrate_legacy_profiles).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: bool,
    pub profile_count: usize,
}

impl MigrationReport {
    pub const NOT_NEEDED: Self = Self {
        migrated: false,
        profile_count: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let raw = json!({
            "region": "us-east-1",
            "bucket": "b",
            "key": "k",
            "note": "team config",
            "retries": 3
        });
        let profile: Profile = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(profile.region.as_deref(), Some("us-east-1"));
        assert_eq!(profile.extra.len(), 2);
        assert_eq!(serde_json::to_value(&profile).unwrap(), raw);
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixtures are objects"),
        }
    }

    #[test]
    fn test_current_shape_drops_credentials() {
        let legacy = LegacyRecord(object(json!({
            "aesrId": "X",
            "region": "r",
            "bucket": "b",
            "key": "k",
            "accessKeyId": "AKIA",
            "secretAccessKey": "secret"
        })));
        assert_eq!(legacy.aesr_id(), Some("X"));
        assert_eq!(
            legacy.to_current_shape(),
            json!({"region": "r", "bucket": "b", "key": "k"})
        );

        let odd = LegacyRecord(object(json!({"aesrId": null, "region": 5})));
        assert_eq!(odd.aesr_id(), None);
        assert_eq!(odd.to_current_shape(), json!({"region": 5}));
    }

    #[test]
    fn test_malformed_fields_stay_in_extra() {
        let raw = json!({
            "region": 5,
            "bucket": "b",
            "awsCredentials": {"accessKeyId": "A"}
        });
        let profile = Profile::from_object(object(raw.clone()));
        assert_eq!(profile.bucket.as_deref(), Some("b"));
        assert_eq!(profile.region, None);
        assert_eq!(profile.aws_credentials, None);
        assert_eq!(profile.extra.len(), 2);
        assert_eq!(serde_json::to_value(&profile).unwrap(), raw);
    }

    #[test]
    fn test_decode_reserved_entries() {
        assert_eq!(
            StoredEntry::decode("defaultProfile", json!("prod")),
            StoredEntry::DefaultPointer(Some("prod".into()))
        );
        assert_eq!(
            StoredEntry::decode("defaultProfile", json!("")),
            StoredEntry::DefaultPointer(None)
        );
        assert_eq!(
            StoredEntry::decode("debugMode", json!(true)),
            StoredEntry::DebugFlag(true)
        );
        assert!(matches!(
            StoredEntry::decode("prod", json!({"region": "eu-west-1"})),
            StoredEntry::Profile(_)
        ));
        assert!(matches!(
            StoredEntry::decode("stray", json!("text")),
            StoredEntry::Unrecognized(_)
        ));
        assert!(matches!(
            StoredEntry::decode("broken", json!({"region": 42})),
            StoredEntry::Profile(_)
        ));
    }

    #[test]
    fn test_snapshot_orders_profiles_by_name() {
        let mut items = Map::new();
        items.insert("zeta".into(), json!({"aesrId": "Z"}));
        items.insert("alpha".into(), json!({"aesrId": "A"}));
        items.insert("current".into(), json!({"region": "r"}));
        items.insert("defaultProfile".into(), json!("zeta"));
        items.insert("debugMode".into(), json!(false));

        let snapshot = StorageSnapshot::decode(items);
        let names: Vec<_> = snapshot.legacy.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(snapshot.profiles.len(), 3);
        assert_eq!(snapshot.default_profile.as_deref(), Some("zeta"));
    }

    #[test]
    fn test_cognito_profile_normalization() {
        let profile = Profile {
            access_key_id: Some("AKIA".into()),
            secret_access_key: Some("secret".into()),
            cognito_username: Some("user".into()),
            cognito_password: Some("pw".into()),
            cognito_user_pool_id: Some("us-east-1_pool".into()),
            cognito_client_app_id: Some("client".into()),
            cognito_identity_pool_id: Some("us-east-1:identity".into()),
            cognito_region: Some("us-east-1".into()),
            ..Default::default()
        };
        let saved = profile.normalized_for_save();
        assert_eq!(saved.access_key_id.as_deref(), Some(""));
        assert_eq!(saved.secret_access_key.as_deref(), Some(""));

        let static_only = Profile {
            access_key_id: Some("AKIA".into()),
            cognito_username: Some("user".into()),
            ..Default::default()
        };
        assert_eq!(
            static_only.clone().normalized_for_save().access_key_id,
            static_only.access_key_id
        );
    }

    #[test]
    fn test_effective_credentials_fall_back_to_cognito() {
        let mut profile = Profile::new("us-east-1", "b", "k");
        assert_eq!(profile.effective_credentials(), None);

        profile.access_key_id = Some(String::new());
        profile.aws_credentials = Some(AwsCredentials::new("ASIA", "tmp", Some("tok".into())));
        let creds = profile.effective_credentials().unwrap();
        assert_eq!(creds.access_key_id, "ASIA");
        assert_eq!(creds.session_token.as_deref(), Some("tok"));

        let creds = profile
            .with_static_credentials(&AwsCredentials::new("AKIA", "secret", None))
            .effective_credentials()
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
    }

    #[test]
    fn test_listing_entries_label_default() {
        let mut listing = ProfileListing::default();
        listing.profiles.insert("dev".into(), Profile::default());
        listing.profiles.insert("prod".into(), Profile::default());
        listing.default_profile_name = Some("prod".into());

        let labels: Vec<_> = listing.entries().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["dev", "prod (default)"]);
        assert_eq!(listing.resolved_default().map(|(n, _)| n), Some("prod"));

        listing.default_profile_name = Some("gone".into());
        assert!(listing.resolved_default().is_none());
    }
}

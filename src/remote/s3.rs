//! Fetching configuration objects from S3.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::storage::{AwsCredentials, Profile};
use crate::utils::parsing::require_fields;

/// Provider name attached to credentials handed to the SDK.
const CREDENTIALS_PROVIDER: &str = "aesr-profile";

/// Everything needed to fetch one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    #[serde(flatten)]
    pub credentials: AwsCredentials,
    pub region: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectRequest {
    /// Build a request from a stored profile.
    ///
    /// Static credentials win over the ones saved by a Cognito sign-in.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let credentials = profile.effective_credentials().unwrap_or_default();
        let request = Self {
            credentials,
            region: profile.region.clone().unwrap_or_default(),
            bucket: profile.bucket.clone().unwrap_or_default(),
            key: profile.key.clone().unwrap_or_default(),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        require_fields(&[
            ("accessKeyId", Some(self.credentials.access_key_id.as_str())),
            ("secretAccessKey", Some(self.credentials.secret_access_key.as_str())),
            ("region", Some(self.region.as_str())),
            ("bucket", Some(self.bucket.as_str())),
            ("key", Some(self.key.as_str())),
        ])
    }
}

/// Object storage collaborator.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Raw bytes of the requested object.
    async fn fetch(&self, request: &ObjectRequest) -> Result<Vec<u8>>;
}

/// [`ObjectFetcher`] backed by the AWS SDK.
///
/// A client is built per request because every profile brings its own
/// credentials and region.
#[derive(Debug, Clone, Default)]
pub struct S3ObjectFetcher {
    endpoint_url: Option<String>,
}

impl S3ObjectFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Talk to an S3-compatible endpoint instead of AWS.
    pub fn with_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
        }
    }

    async fn client(&self, request: &ObjectRequest) -> aws_sdk_s3::Client {
        let credentials = Credentials::new(
            request.credentials.access_key_id.clone(),
            request.credentials.secret_access_key.clone(),
            request.credentials.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(request.region.clone()))
            .credentials_provider(credentials);
        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url);
        }

        aws_sdk_s3::Client::new(&loader.load().await)
    }
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    async fn fetch(&self, request: &ObjectRequest) -> Result<Vec<u8>> {
        request.validate()?;
        log::debug!(
            "Fetching s3://{}/{} in {}",
            request.bucket,
            request.key,
            request.region
        );

        let client = self.client(request).await;
        let output = client
            .get_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .send()
            .await
            .map_err(|e| SyncError::ObjectFetch(DisplayErrorContext(&e).to_string()))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| SyncError::ObjectFetch(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }
}

/// Fetch the profile's configuration object as UTF-8 text.
pub async fn pull_config(fetcher: &dyn ObjectFetcher, profile: &Profile) -> Result<String> {
    let request = ObjectRequest::from_profile(profile)?;
    fetch_text(fetcher, &request).await
}

/// Fetch an object and decode it as UTF-8.
pub async fn fetch_text(fetcher: &dyn ObjectFetcher, request: &ObjectRequest) -> Result<String> {
    let bytes = fetcher.fetch(request).await?;
    let content = String::from_utf8(bytes).map_err(|_| SyncError::InvalidUtf8)?;
    log::debug!("Received {} bytes of config", content.len());
    Ok(content)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns canned bytes and remembers the last request.
    #[derive(Default)]
    pub(crate) struct CannedFetcher {
        pub body: Vec<u8>,
        pub fail_with: Option<String>,
        pub last_request: Mutex<Option<ObjectRequest>>,
    }

    impl CannedFetcher {
        pub fn returning(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                ..Default::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ObjectFetcher for CannedFetcher {
        async fn fetch(&self, request: &ObjectRequest) -> Result<Vec<u8>> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            match &self.fail_with {
                Some(message) => Err(SyncError::ObjectFetch(message.clone())),
                None => Ok(self.body.clone()),
            }
        }
    }

    fn profile() -> Profile {
        Profile::new("us-east-1", "configs", "aesr/config.ini")
            .with_static_credentials(&AwsCredentials::new("AKIA", "secret", None))
    }

    #[test]
    fn test_request_from_profile() {
        let request = ObjectRequest::from_profile(&profile()).unwrap();
        assert_eq!(request.bucket, "configs");
        assert_eq!(request.credentials.access_key_id, "AKIA");
    }

    #[test]
    fn test_request_requires_all_fields() {
        let mut incomplete = profile();
        incomplete.key = Some(String::new());
        let err = ObjectRequest::from_profile(&incomplete).unwrap_err();
        assert!(err.is_validation());

        let no_credentials = Profile::new("us-east-1", "b", "k");
        assert!(ObjectRequest::from_profile(&no_credentials).is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let request: ObjectRequest = serde_json::from_value(serde_json::json!({
            "accessKeyId": "AKIA",
            "secretAccessKey": "secret",
            "region": "eu-west-1",
            "bucket": "b",
            "key": "k"
        }))
        .unwrap();
        assert_eq!(request.credentials.session_token, None);
        assert_eq!(request.region, "eu-west-1");
    }

    #[tokio::test]
    async fn test_pull_config_decodes_utf8() {
        let fetcher = CannedFetcher::returning("[profile dev]\nregion = ü\n".as_bytes());
        let content = pull_config(&fetcher, &profile()).await.unwrap();
        assert_eq!(content, "[profile dev]\nregion = ü\n");

        let seen = fetcher.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(seen.key, "aesr/config.ini");
    }

    #[tokio::test]
    async fn test_pull_config_rejects_binary() {
        let fetcher = CannedFetcher::returning(&[0xff, 0xfe, 0x00]);
        let err = pull_config(&fetcher, &profile()).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidUtf8));
    }

    #[tokio::test]
    async fn test_pull_config_skips_fetch_when_incomplete() {
        let fetcher = CannedFetcher::returning(b"unused");
        let err = pull_config(&fetcher, &Profile::new("us-east-1", "b", ""))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(fetcher.last_request.lock().unwrap().is_none());
    }
}

//! Runtime messages exchanged with other extension components.
//!
//! Two messages exist: `fetchS3FileContent`, answered by
//! [`handle_runtime_request`], and `updateConfig`, which [`push_config`]
//! sends to the AESR extension.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::config::CONFIG_DATA_TYPE;
use crate::error::{Result, SyncError};
use crate::remote::s3::{ObjectFetcher, ObjectRequest, fetch_text};
use crate::storage::ProfileStore;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RuntimeRequest {
    FetchS3FileContent(ObjectRequest),
    UpdateConfig {
        #[serde(rename = "dataType")]
        data_type: String,
        data: String,
    },
}

impl RuntimeRequest {
    /// An `updateConfig` message carrying INI text.
    pub fn update_config(data: impl Into<String>) -> Self {
        RuntimeRequest::UpdateConfig {
            data_type: CONFIG_DATA_TYPE.to_string(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuntimeResponse {
    pub fn ok(content: String) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.to_string()),
        }
    }
}

/// Answer a request addressed to the background component.
///
/// Returns `None` for actions this component does not handle.
pub async fn handle_runtime_request(
    fetcher: &dyn ObjectFetcher,
    request: &RuntimeRequest,
) -> Option<RuntimeResponse> {
    match request {
        RuntimeRequest::FetchS3FileContent(object) => {
            Some(match fetch_text(fetcher, object).await {
                Ok(content) => RuntimeResponse::ok(content),
                Err(e) => {
                    log::error!("Failed to fetch S3 file content: {}", e);
                    RuntimeResponse::failed(e)
                }
            })
        }
        RuntimeRequest::UpdateConfig { .. } => None,
    }
}

// =============================================================================
// Outgoing Messages
// =============================================================================

/// Delivers runtime messages to another extension.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `message` to the extension `target`. Returns whether the
    /// receiver acknowledged it.
    async fn send(&self, target: &str, message: &RuntimeRequest) -> Result<bool>;
}

#[derive(Serialize)]
struct OutboxRecord<'a> {
    target: &'a str,
    message: &'a RuntimeRequest,
}

/// [`MessageSink`] appending one JSON line per message to a file, for a
/// separate process to pick up.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSink for OutboxSink {
    async fn send(&self, target: &str, message: &RuntimeRequest) -> Result<bool> {
        let mut line = serde_json::to_string(&OutboxRecord { target, message })
            .map_err(|e| SyncError::Delivery(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Delivery(e.to_string()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SyncError::Delivery(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SyncError::Delivery(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| SyncError::Delivery(e.to_string()))?;

        Ok(true)
    }
}

/// Send config text to the AESR extension named in the global settings and
/// record when it was accepted.
///
/// Returns the recorded timestamp in epoch milliseconds.
pub async fn push_config(store: &ProfileStore, sink: &dyn MessageSink, config: &str) -> Result<i64> {
    let target = store
        .global_settings()
        .await?
        .and_then(|s| s.aesr_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::validation("AESR extension id is not configured"))?;

    let message = RuntimeRequest::update_config(config);
    if !sink.send(&target, &message).await? {
        return Err(SyncError::Delivery(format!("no response from {}", target)));
    }

    let now = chrono::Utc::now().timestamp_millis();
    store.record_last_sent(now).await?;
    log::info!("Config sent to {} ({} bytes)", target, config.len());
    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::s3::tests::CannedFetcher;
    use crate::storage::{AwsCredentials, GlobalSettings};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        ack: bool,
        sent: Mutex<Vec<(String, RuntimeRequest)>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, target: &str, message: &RuntimeRequest) -> Result<bool> {
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), message.clone()));
            Ok(self.ack)
        }
    }

    fn fetch_request() -> RuntimeRequest {
        RuntimeRequest::FetchS3FileContent(ObjectRequest {
            credentials: AwsCredentials::new("AKIA", "secret", None),
            region: "us-east-1".into(),
            bucket: "b".into(),
            key: "k".into(),
        })
    }

    #[test]
    fn test_wire_format() {
        let parsed: RuntimeRequest = serde_json::from_value(json!({
            "action": "fetchS3FileContent",
            "accessKeyId": "AKIA",
            "secretAccessKey": "secret",
            "region": "us-east-1",
            "bucket": "b",
            "key": "k"
        }))
        .unwrap();
        assert_eq!(parsed, fetch_request());

        assert_eq!(
            serde_json::to_value(RuntimeRequest::update_config("[default]")).unwrap(),
            json!({"action": "updateConfig", "dataType": "ini", "data": "[default]"})
        );
        assert_eq!(
            serde_json::to_value(RuntimeResponse::failed("denied")).unwrap(),
            json!({"success": false, "error": "denied"})
        );
    }

    #[tokio::test]
    async fn test_handle_fetch_request() {
        let fetcher = CannedFetcher::returning(b"[profile a]");
        let response = handle_runtime_request(&fetcher, &fetch_request()).await;
        assert_eq!(response, Some(RuntimeResponse::ok("[profile a]".into())));

        let fetcher = CannedFetcher::failing("AccessDenied");
        let response = handle_runtime_request(&fetcher, &fetch_request())
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("AccessDenied"));

        let ignored = handle_runtime_request(&fetcher, &RuntimeRequest::update_config("x")).await;
        assert_eq!(ignored, None);
    }

    #[tokio::test]
    async fn test_push_config_requires_aesr_id() {
        let store = ProfileStore::in_memory();
        let sink = RecordingSink::default();

        let err = push_config(&store, &sink, "[default]").await.unwrap_err();
        assert!(err.is_validation());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_config_records_timestamp() {
        let store = ProfileStore::in_memory();
        store
            .save_global_settings(&GlobalSettings::with_aesr_id("aesr-ext"))
            .await
            .unwrap();
        let sink = RecordingSink {
            ack: true,
            ..Default::default()
        };

        let sent_at = push_config(&store, &sink, "[default]").await.unwrap();
        assert_eq!(store.last_sent_timestamp().await.unwrap(), Some(sent_at));

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "aesr-ext");
        assert_eq!(sent[0].1, RuntimeRequest::update_config("[default]"));
    }

    #[tokio::test]
    async fn test_unacknowledged_push_keeps_old_timestamp() {
        let store = ProfileStore::in_memory();
        store
            .save_global_settings(&GlobalSettings::with_aesr_id("aesr-ext"))
            .await
            .unwrap();
        store.record_last_sent(42).await.unwrap();

        let sink = RecordingSink::default();
        let err = push_config(&store, &sink, "[default]").await.unwrap_err();
        assert!(matches!(err, SyncError::Delivery(_)));
        assert_eq!(store.last_sent_timestamp().await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_outbox_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("outbox.jsonl");
        let sink = OutboxSink::new(&path);

        assert!(sink.send("ext", &RuntimeRequest::update_config("a")).await.unwrap());
        assert!(sink.send("ext", &RuntimeRequest::update_config("b")).await.unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["target"], json!("ext"));
        assert_eq!(lines[1]["message"]["data"], json!("b"));
    }
}

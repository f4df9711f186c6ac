//! Media item creation: exchanging an upload token for a permanent identifier.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one finalize attempt that did not produce an identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FinalizeAttemptError {
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Fatal(String),
}

/// One finalize call against the remote library
#[async_trait]
pub trait MediaItemCreator: Send + Sync {
    /// Returns the new media item id
    async fn create(
        &self,
        upload_token: &str,
        description: &str,
    ) -> Result<String, FinalizeAttemptError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateRequest<'a> {
    new_media_items: Vec<NewMediaItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItem<'a> {
    description: &'a str,
    simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleMediaItem<'a> {
    upload_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    #[serde(default)]
    status: Option<ItemStatus>,
    #[serde(default)]
    media_item: Option<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    #[serde(default)]
    id: String,
}

/// Classify a finalize response.
///
/// 429 and 5xx are retryable, any other non-2xx status is fatal. A 2xx
/// response is a success only if it decodes, holds at least one result, and
/// that result reports success and carries an id; otherwise it is retryable.
pub fn classify_response(status: StatusCode, body: &str) -> Result<String, FinalizeAttemptError> {
    let body = body.trim();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FinalizeAttemptError::Retryable(format!(
            "rate limited (status {}): {}",
            status, body
        )));
    }
    if status.is_server_error() {
        return Err(FinalizeAttemptError::Retryable(format!(
            "server error (status {}): {}",
            status, body
        )));
    }
    if !status.is_success() {
        return Err(FinalizeAttemptError::Fatal(format!(
            "request rejected (status {}): {}",
            status, body
        )));
    }

    let decoded: BatchCreateResponse = serde_json::from_str(body).map_err(|e| {
        FinalizeAttemptError::Retryable(format!("malformed response body: {}", e))
    })?;

    let result = decoded
        .new_media_item_results
        .into_iter()
        .next()
        .ok_or_else(|| FinalizeAttemptError::Retryable("no media items created".to_string()))?;

    let (code, message) = match &result.status {
        Some(status) => (status.code.unwrap_or(0), status.message.as_str()),
        None => (0, ""),
    };
    if code != 0 || !(message == "Success" || message == "OK") {
        return Err(FinalizeAttemptError::Retryable(format!(
            "media item status {}: '{}'",
            code, message
        )));
    }

    match result.media_item {
        Some(item) if !item.id.is_empty() => Ok(item.id),
        _ => Err(FinalizeAttemptError::Retryable(
            "media item result carried no id".to_string(),
        )),
    }
}

/// [`MediaItemCreator`] backed by the `mediaItems:batchCreate` endpoint
#[derive(Clone, Debug)]
pub struct HttpMediaItemCreator {
    client: Client,
    base_url: String,
}

impl HttpMediaItemCreator {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaItemCreator for HttpMediaItemCreator {
    async fn create(
        &self,
        upload_token: &str,
        description: &str,
    ) -> Result<String, FinalizeAttemptError> {
        let request = BatchCreateRequest {
            new_media_items: vec![NewMediaItem {
                description,
                simple_media_item: SimpleMediaItem { upload_token },
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/mediaItems:batchCreate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| FinalizeAttemptError::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            FinalizeAttemptError::Retryable(format!("failed to read response body: {}", e))
        })?;

        classify_response(status, &body)
    }
}

use std::path::Path;
use std::sync::Arc;

use cronocam_core::{FormatPolicy, UploaderConfig};
use cronocam_infra::RateLimiter;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::finalize::{HttpMediaItemCreator, MediaItemCreator};
use crate::resumable::ResumableClient;
use crate::retry::{FinalizeOrchestrator, RetryPolicy};

/// Uploads single files: transfer, then finalize.
///
/// Does not consult or write the ledger; the caller owns admission and persistence.
#[derive(Clone)]
pub struct Uploader {
    transfer: ResumableClient,
    finalizer: FinalizeOrchestrator,
    formats: FormatPolicy,
}

impl Uploader {
    /// `client` must already carry authorization
    pub fn new(
        client: Client,
        config: &UploaderConfig,
        limiter: RateLimiter,
        formats: FormatPolicy,
    ) -> Self {
        let creator = Arc::new(HttpMediaItemCreator::new(
            client.clone(),
            &config.api_base_url,
        ));
        Self::with_creator(client, config, limiter, formats, creator)
    }

    /// Use a custom finalize backend
    pub fn with_creator(
        client: Client,
        config: &UploaderConfig,
        limiter: RateLimiter,
        formats: FormatPolicy,
        creator: Arc<dyn MediaItemCreator>,
    ) -> Self {
        Self {
            transfer: ResumableClient::new(client, &config.api_base_url, config.chunk_size),
            finalizer: FinalizeOrchestrator::new(
                creator,
                limiter,
                RetryPolicy::from_config(config),
            ),
            formats,
        }
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        self.formats.is_supported_path(path)
    }

    pub async fn calculate_file_hash(&self, path: &Path) -> Result<String, UploadError> {
        crate::hash::calculate_file_hash(path).await
    }

    /// Upload `path` and return the remote media item id
    #[tracing::instrument(skip(self, cancel), fields(path = %path.display()))]
    pub async fn upload_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let upload_token = self.transfer.upload(path, cancel).await?;

        let description = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let media_item_id = self
            .finalizer
            .finalize(&upload_token, &description, cancel)
            .await?;

        tracing::info!(%media_item_id, "File uploaded");
        Ok(media_item_id)
    }
}

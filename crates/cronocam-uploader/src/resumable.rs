//! Resumable byte transfer: open a session, then stream the file in chunks.
//!
//! Neither phase is retried. A failed transfer must start over from a new session.

use std::future::Future;
use std::path::Path;

use cronocam_core::content_type_for;
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;

const HEADER_PROTOCOL: &str = "X-Goog-Upload-Protocol";
const HEADER_COMMAND: &str = "X-Goog-Upload-Command";
const HEADER_CONTENT_TYPE: &str = "X-Goog-Upload-Content-Type";
const HEADER_RAW_SIZE: &str = "X-Goog-Upload-Raw-Size";
const HEADER_OFFSET: &str = "X-Goog-Upload-Offset";
const HEADER_SESSION_URL: &str = "X-Goog-Upload-URL";

const COMMAND_START: &str = "start";
const COMMAND_UPLOAD: &str = "upload";
const COMMAND_FINALIZE: &str = "upload, finalize";

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, UploadError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        output = fut => Ok(output),
    }
}

/// An open transfer session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSession {
    pub session_url: String,
    pub total_size: u64,
    pub content_type: &'static str,
}

/// Chunk header values for a chunk of `chunk_len` bytes at offset `sent`
fn chunk_command(sent: u64, chunk_len: u64, total: u64) -> &'static str {
    if sent + chunk_len >= total {
        COMMAND_FINALIZE
    } else {
        COMMAND_UPLOAD
    }
}

#[derive(Clone, Debug)]
pub struct ResumableClient {
    client: Client,
    base_url: String,
    chunk_size: usize,
}

impl ResumableClient {
    pub fn new(client: Client, base_url: &str, chunk_size: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Transfer the whole file and return the upload token
    pub async fn upload(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let total_size = tokio::fs::metadata(path).await?.len();
        if total_size == 0 {
            return Err(UploadError::EmptyFile(path.to_path_buf()));
        }

        let session = self.start(path, total_size, cancel).await?;
        self.transfer(&session, path, cancel).await
    }

    /// Declare `total_size` bytes and obtain a session URL
    #[tracing::instrument(skip(self, cancel), fields(path = %path.display()))]
    pub async fn start(
        &self,
        path: &Path,
        total_size: u64,
        cancel: &CancellationToken,
    ) -> Result<TransferSession, UploadError> {
        let content_type = content_type_for(path);

        let request = self
            .client
            .post(format!("{}/v1/uploads", self.base_url))
            .header(HEADER_PROTOCOL, "resumable")
            .header(HEADER_COMMAND, COMMAND_START)
            .header(HEADER_CONTENT_TYPE, content_type)
            .header(HEADER_RAW_SIZE, total_size.to_string())
            .body(Vec::<u8>::new());

        let response = cancellable(cancel, request.send())
            .await?
            .map_err(|e| UploadError::SessionStart(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response, cancel).await?;
            return Err(UploadError::SessionStart(format!(
                "status {}: {}",
                status,
                body.trim()
            )));
        }

        let session_url = response
            .headers()
            .get(HEADER_SESSION_URL)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::SessionStart(format!("response has no {} header", HEADER_SESSION_URL))
            })?;

        tracing::debug!(total_size, content_type, "Upload session started");

        Ok(TransferSession {
            session_url,
            total_size,
            content_type,
        })
    }

    /// Send the file in `chunk_size` pieces; the last one finalizes the session.
    ///
    /// Never sends more than the size declared at start, even if the file grew.
    #[tracing::instrument(skip(self, session, cancel), fields(path = %path.display(), total = session.total_size))]
    pub async fn transfer(
        &self,
        session: &TransferSession,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let mut file = File::open(path).await?;
        let total = session.total_size;
        let mut sent: u64 = 0;

        while sent < total {
            let chunk_len = (self.chunk_size as u64).min(total - sent);
            let mut chunk = vec![0u8; chunk_len as usize];
            match file.read_exact(&mut chunk).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(UploadError::ChunkTransfer(format!(
                        "file shrank during transfer: expected {} bytes, read {}",
                        total, sent
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            let command = chunk_command(sent, chunk_len, total);
            let request = self
                .client
                .post(&session.session_url)
                .header(HEADER_COMMAND, command)
                .header(HEADER_OFFSET, sent.to_string())
                .body(chunk);

            let response = cancellable(cancel, request.send())
                .await?
                .map_err(|e| {
                    UploadError::ChunkTransfer(format!("chunk at offset {} failed: {}", sent, e))
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = read_error_body(response, cancel).await?;
                return Err(UploadError::ChunkTransfer(format!(
                    "chunk at offset {} returned status {}: {}",
                    sent,
                    status,
                    body.trim()
                )));
            }

            tracing::trace!(offset = sent, len = chunk_len, command, "Chunk sent");
            sent += chunk_len;

            if command == COMMAND_FINALIZE {
                let token = cancellable(cancel, response.text()).await?.map_err(|e| {
                    UploadError::ChunkTransfer(format!("failed to read upload token: {}", e))
                })?;
                let token = token.trim();
                if token.is_empty() {
                    return Err(UploadError::ChunkTransfer(
                        "final chunk response carried no upload token".to_string(),
                    ));
                }
                tracing::debug!(bytes = sent, "Transfer complete");
                return Ok(token.to_string());
            }
        }

        Err(UploadError::ChunkTransfer(
            "transfer ended without a finalizing chunk".to_string(),
        ))
    }
}

/// Body of an error response, for diagnostics only
async fn read_error_body(
    response: Response,
    cancel: &CancellationToken,
) -> Result<String, UploadError> {
    let body = cancellable(cancel, response.text())
        .await?
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Ok(body)
}

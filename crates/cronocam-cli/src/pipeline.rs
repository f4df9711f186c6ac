//! Per-run orchestration: admission, upload, and ledger bookkeeping.

use std::fmt;
use std::path::{Path, PathBuf};

use cronocam_core::{ErrorMetadata, FormatPolicy, LogLevel};
use cronocam_db::UploadLedger;
use cronocam_uploader::{calculate_file_hash, Uploader};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Upload even when the fingerprint is already recorded
    pub force: bool,
    /// Stop after this many uploads; 0 means unlimited
    pub max_files: usize,
}

/// Per-run counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: usize,
    pub imported: usize,
    pub skipped: usize,
    pub unsupported: usize,
    pub failed: usize,
    /// Forced re-uploads of content the ledger already held
    pub duplicates: usize,
}

impl RunSummary {
    /// Files that reached the remote library during this run
    pub fn transferred(&self) -> usize {
        self.uploaded + self.duplicates
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} imported, {} already known, {} duplicates, {} unsupported, {} failed",
            self.uploaded, self.imported, self.skipped, self.duplicates, self.unsupported, self.failed
        )
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run cancelled ({summary})")]
    Cancelled { summary: RunSummary },

    /// An error no later file could get past, such as a closed rate limiter
    #[error("Run aborted: {reason} ({summary})")]
    Aborted { summary: RunSummary, reason: String },
}

impl RunError {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunError::Cancelled { summary } | RunError::Aborted { summary, .. } => summary,
        }
    }
}

/// One backup run over an ordered list of candidate files.
///
/// Files are processed one at a time. A per-file failure is logged, written to
/// the failure log, and the run moves on. Cancellation and unrecoverable
/// errors end it early.
pub struct BackupRun {
    ledger: UploadLedger,
    formats: FormatPolicy,
    options: RunOptions,
}

impl BackupRun {
    pub fn new(ledger: UploadLedger, formats: FormatPolicy, options: RunOptions) -> Self {
        Self {
            ledger,
            formats,
            options,
        }
    }

    /// Upload every admitted file in `paths`, in order
    pub async fn upload_files(
        &self,
        uploader: &Uploader,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();

        for path in paths {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled { summary });
            }

            if !uploader.is_supported_file(path) {
                tracing::debug!(path = %path.display(), "Unsupported file type");
                summary.unsupported += 1;
                continue;
            }

            let Some(content_hash) = self.admit(path, &mut summary).await else {
                continue;
            };

            let remote_id = match uploader.upload_file(path, cancel).await {
                Ok(id) => id,
                Err(e) if e.is_cancelled() => return Err(RunError::Cancelled { summary }),
                Err(e) if !e.is_recoverable() => {
                    self.fail(path, &e).await;
                    summary.failed += 1;
                    tracing::error!(%summary, error = %e, "Upload run aborted");
                    return Err(RunError::Aborted {
                        summary,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    self.fail(path, &e).await;
                    summary.failed += 1;
                    continue;
                }
            };

            self.store(path, &content_hash, Some(&remote_id), &mut summary)
                .await;

            if self.options.max_files > 0 && summary.transferred() >= self.options.max_files {
                tracing::info!(max_files = self.options.max_files, "Upload limit reached");
                break;
            }
        }

        tracing::info!(%summary, "Upload run finished");
        Ok(summary)
    }

    /// Record supported files as already present remotely, without network calls
    pub async fn import_files(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();

        for path in paths {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled { summary });
            }

            if !self.formats.is_supported_path(path) {
                summary.unsupported += 1;
                continue;
            }

            let Some(content_hash) = self.admit(path, &mut summary).await else {
                continue;
            };

            self.store(path, &content_hash, None, &mut summary).await;
        }

        tracing::info!(%summary, "Import finished");
        Ok(summary)
    }

    /// Fingerprint `path` and decide whether it needs work.
    /// Returns `None` when the file is skipped or failed.
    async fn admit(&self, path: &Path, summary: &mut RunSummary) -> Option<String> {
        let content_hash = match calculate_file_hash(path).await {
            Ok(hash) => hash,
            Err(e) => {
                self.fail(path, &e).await;
                summary.failed += 1;
                return None;
            }
        };

        if self.options.force {
            return Some(content_hash);
        }

        match self.ledger.is_known(&content_hash).await {
            Ok(false) => Some(content_hash),
            Ok(true) => {
                tracing::debug!(path = %path.display(), "Already recorded, skipping");
                summary.skipped += 1;
                None
            }
            Err(e) => {
                self.fail(path, &e).await;
                summary.failed += 1;
                None
            }
        }
    }

    async fn store(
        &self,
        path: &Path,
        content_hash: &str,
        remote_id: Option<&str>,
        summary: &mut RunSummary,
    ) {
        let file_path = path.to_string_lossy();
        match self.ledger.record(&file_path, content_hash, remote_id).await {
            Ok(_) if remote_id.is_some() => summary.uploaded += 1,
            Ok(_) => summary.imported += 1,
            Err(e) if e.is_duplicate() => {
                log_error(path, &e);
                summary.duplicates += 1;
            }
            Err(e) => {
                self.fail(path, &e).await;
                summary.failed += 1;
            }
        }
    }

    async fn fail<E>(&self, path: &Path, err: &E)
    where
        E: ErrorMetadata + fmt::Display,
    {
        log_error(path, err);

        let file_path = path.to_string_lossy();
        if let Err(e) = self
            .ledger
            .record_failure(&file_path, &err.to_string())
            .await
        {
            tracing::error!(path = %path.display(), error = %e, "Failed to record upload failure");
        }
    }
}

fn log_error<E>(path: &Path, err: &E)
where
    E: ErrorMetadata + fmt::Display,
{
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(path = %path.display(), code, error = %err, "File not uploaded"),
        LogLevel::Warn => tracing::warn!(path = %path.display(), code, error = %err, "File not uploaded"),
        LogLevel::Error => tracing::error!(path = %path.display(), code, error = %err, "File not uploaded"),
    }
}

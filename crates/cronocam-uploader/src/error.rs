//! Upload error types

use std::path::PathBuf;

use cronocam_core::{ErrorMetadata, LogLevel};
use cronocam_infra::AcquireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    /// The remote service refused to open a transfer session
    #[error("Failed to start upload session: {0}")]
    SessionStart(String),

    #[error("Chunk transfer failed: {0}")]
    ChunkTransfer(String),

    #[error("Media item creation rejected: {0}")]
    FinalizeFatal(String),

    /// Every finalize attempt failed with a retryable error
    #[error("Media item creation failed after {attempts} attempt(s): {last_error}")]
    FinalizeRetryable { attempts: u32, last_error: String },

    #[error("Rate limiter has been shut down")]
    RateLimiterClosed,

    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

impl From<AcquireError> for UploadError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Cancelled => UploadError::Cancelled,
            AcquireError::Closed => UploadError::RateLimiterClosed,
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::Io(_) => "IO_ERROR",
            UploadError::EmptyFile(_) => "EMPTY_FILE",
            UploadError::SessionStart(_) => "SESSION_START_FAILED",
            UploadError::ChunkTransfer(_) => "CHUNK_TRANSFER_FAILED",
            UploadError::FinalizeFatal(_) => "FINALIZE_REJECTED",
            UploadError::FinalizeRetryable { .. } => "FINALIZE_RETRIES_EXHAUSTED",
            UploadError::RateLimiterClosed => "RATE_LIMITER_CLOSED",
            UploadError::Cancelled => "CANCELLED",
        }
    }

    /// Per-file failures are recoverable at run level; the next file can still go.
    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            UploadError::Cancelled | UploadError::RateLimiterClosed
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::Cancelled => LogLevel::Debug,
            UploadError::EmptyFile(_) | UploadError::FinalizeRetryable { .. } => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

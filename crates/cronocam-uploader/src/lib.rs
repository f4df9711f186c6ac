//! Cronocam Uploader
//!
//! Moves one local media file to the remote library: a resumable byte transfer
//! followed by a rate-limited, retried finalize call. Admission (whether a file
//! should be uploaded at all) and persistence are left to the caller.

pub mod auth;
pub mod error;
pub mod finalize;
pub mod hash;
pub mod resumable;
pub mod retry;
pub mod uploader;

pub use auth::{authorized_client, load_access_token};
pub use error::UploadError;
pub use finalize::{classify_response, FinalizeAttemptError, HttpMediaItemCreator, MediaItemCreator};
pub use hash::calculate_file_hash;
pub use resumable::{ResumableClient, TransferSession};
pub use retry::{FinalizeOrchestrator, RetryPolicy};
pub use uploader::Uploader;

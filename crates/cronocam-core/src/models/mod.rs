//! Domain models persisted by the ledger and reported by the CLI.

mod upload;

pub use upload::{UploadFailure, UploadRecord, UploadStats};

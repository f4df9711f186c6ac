use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file successfully processed and stored in the ledger.
///
/// `content_hash` is the deduplication key and is unique across all records.
/// `remote_id` is `None` for files recorded by the import path, which never
/// talks to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    pub file_path: String,
    pub content_hash: String,
    pub remote_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Whether the file is known to the remote service
    pub fn is_synced(&self) -> bool {
        self.remote_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// One failed upload attempt, kept for operator visibility only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub id: i64,
    pub file_path: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate ledger statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total_records: i64,
    pub last_record_time: Option<DateTime<Utc>>,
}

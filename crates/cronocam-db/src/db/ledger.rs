use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use cronocam_core::{UploadFailure, UploadRecord, UploadStats};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::db::pool::connect;
use crate::error::LedgerError;

/// Repository for upload records and the failure log
///
/// The ledger imposes exactly one business rule: a content fingerprint can be
/// recorded once. Whether a file should be uploaded at all is decided by the
/// caller through [`UploadLedger::is_known`].
#[derive(Clone, Debug)]
pub struct UploadLedger {
    pool: SqlitePool,
}

impl UploadLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the ledger file at `path`, creating and migrating it if needed
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        Ok(Self::new(connect(path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether a record with this content fingerprint exists
    pub async fn is_known(&self, content_hash: &str) -> Result<bool, LedgerError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM uploaded_files WHERE content_hash = ?)",
        )
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Persist a record atomically.
    ///
    /// Concurrent calls with the same fingerprint yield exactly one success; the
    /// others get [`LedgerError::Duplicate`]. An empty `remote_id` is stored as NULL.
    #[tracing::instrument(skip(self))]
    pub async fn record(
        &self,
        file_path: &str,
        content_hash: &str,
        remote_id: Option<&str>,
    ) -> Result<UploadRecord, LedgerError> {
        let remote_id = remote_id.filter(|id| !id.is_empty());

        let row = sqlx::query(
            r#"
            INSERT INTO uploaded_files (file_path, content_hash, remote_id)
            VALUES (?, ?, ?)
            RETURNING id, file_path, content_hash, remote_id, recorded_at
            "#,
        )
        .bind(file_path)
        .bind(content_hash)
        .bind(remote_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::from_insert(e, content_hash))?;

        let record = record_from_row(&row)?;

        tracing::debug!(
            id = record.id,
            synced = record.is_synced(),
            "Upload record stored"
        );

        Ok(record)
    }

    /// Paths of records without a remote identifier, oldest first
    pub async fn list_unsynced(&self) -> Result<Vec<String>, LedgerError> {
        let paths = sqlx::query_scalar::<_, String>(
            r#"
            SELECT file_path
            FROM uploaded_files
            WHERE remote_id IS NULL OR remote_id = ''
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(paths)
    }

    /// All records, in insertion order
    pub async fn list_records(&self) -> Result<Vec<UploadRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, content_hash, remote_id, recorded_at
            FROM uploaded_files
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| record_from_row(row).map_err(LedgerError::from))
            .collect()
    }

    pub async fn stats(&self) -> Result<UploadStats, LedgerError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, MAX(recorded_at) AS last_recorded FROM uploaded_files",
        )
        .fetch_one(&self.pool)
        .await?;

        let total_records: i64 = row.try_get("total")?;
        let last_recorded: Option<String> = row.try_get("last_recorded")?;
        let last_record_time = last_recorded
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(UploadStats {
            total_records,
            last_record_time,
        })
    }

    /// Append an entry to the failure log
    pub async fn record_failure(
        &self,
        file_path: &str,
        message: &str,
    ) -> Result<UploadFailure, LedgerError> {
        let row = sqlx::query(
            r#"
            INSERT INTO upload_failures (file_path, message)
            VALUES (?, ?)
            RETURNING id, file_path, message, occurred_at
            "#,
        )
        .bind(file_path)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        Ok(failure_from_row(&row)?)
    }

    /// Most recent failures first
    pub async fn recent_failures(&self, limit: u32) -> Result<Vec<UploadFailure>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, message, occurred_at
            FROM upload_failures
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| failure_from_row(row).map_err(LedgerError::from))
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> Result<UploadRecord, sqlx::Error> {
    let recorded_at: String = row.try_get("recorded_at")?;
    Ok(UploadRecord {
        id: row.try_get("id")?,
        file_path: row.try_get("file_path")?,
        content_hash: row.try_get("content_hash")?,
        remote_id: row.try_get("remote_id")?,
        recorded_at: parse_timestamp(&recorded_at)?,
    })
}

fn failure_from_row(row: &SqliteRow) -> Result<UploadFailure, sqlx::Error> {
    let occurred_at: String = row.try_get("occurred_at")?;
    Ok(UploadFailure {
        id: row.try_get("id")?,
        file_path: row.try_get("file_path")?,
        message: row.try_get("message")?,
        occurred_at: parse_timestamp(&occurred_at)?,
    })
}

/// Store timestamps are RFC 3339; plain `YYYY-MM-DD HH:MM:SS` (SQLite's
/// `CURRENT_TIMESTAMP`) is accepted as UTC too.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_ledger() -> (TempDir, UploadLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = UploadLedger::open(&dir.path().join("ledger.db"))
            .await
            .unwrap();
        (dir, ledger)
    }

    #[tokio::test]
    async fn test_record_then_is_known() {
        let (_dir, ledger) = open_ledger().await;

        assert!(!ledger.is_known("abc").await.unwrap());

        let record = ledger
            .record("/photos/a.jpg", "abc", Some("remote-1"))
            .await
            .unwrap();
        assert_eq!(record.file_path, "/photos/a.jpg");
        assert_eq!(record.content_hash, "abc");
        assert_eq!(record.remote_id.as_deref(), Some("remote-1"));
        assert!(record.is_synced());

        assert!(ledger.is_known("abc").await.unwrap());
        assert!(!ledger.is_known("def").await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let (_dir, ledger) = open_ledger().await;

        let first = ledger.record("/a.jpg", "h1", Some("r1")).await.unwrap();
        let second = ledger.record("/b.jpg", "h2", Some("r2")).await.unwrap();

        assert!(second.id > first.id);
        assert!(second.recorded_at >= first.recorded_at);
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_is_distinguishable() {
        let (_dir, ledger) = open_ledger().await;

        ledger.record("/a.jpg", "same", Some("r1")).await.unwrap();
        let err = ledger
            .record("/copy-of-a.jpg", "same", Some("r2"))
            .await
            .unwrap_err();

        assert!(err.is_duplicate(), "expected Duplicate, got {:?}", err);
        assert_eq!(ledger.stats().await.unwrap().total_records, 1);

        let records = ledger.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_path, "/a.jpg");
    }

    #[tokio::test]
    async fn test_concurrent_records_yield_single_success() {
        let (_dir, ledger) = open_ledger().await;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record(&format!("/copy-{}.jpg", i), "contended", Some("r"))
                    .await
            }));
        }

        let mut successes = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) if e.is_duplicate() => duplicates += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(ledger.stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn test_separate_pools_share_uniqueness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let first = UploadLedger::open(&path).await.unwrap();
        let second = UploadLedger::open(&path).await.unwrap();

        let (a, b) = tokio::join!(
            first.record("/a.jpg", "shared-hash", Some("r1")),
            second.record("/b.jpg", "shared-hash", Some("r2")),
        );

        assert!(a.is_ok() ^ b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(loser.unwrap_err().is_duplicate());
        assert!(second.is_known("shared-hash").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_unsynced_returns_import_only_records() {
        let (_dir, ledger) = open_ledger().await;

        ledger.record("/uploaded.jpg", "h1", Some("r1")).await.unwrap();
        ledger.record("/imported.jpg", "h2", None).await.unwrap();
        ledger.record("/blank.jpg", "h3", Some("")).await.unwrap();

        let unsynced = ledger.list_unsynced().await.unwrap();
        assert_eq!(unsynced, vec!["/imported.jpg", "/blank.jpg"]);

        let records = ledger.list_records().await.unwrap();
        assert_eq!(records[2].remote_id, None);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_dir, ledger) = open_ledger().await;

        let empty = ledger.stats().await.unwrap();
        assert_eq!(empty.total_records, 0);
        assert!(empty.last_record_time.is_none());

        ledger.record("/a.jpg", "h1", Some("r1")).await.unwrap();
        let latest = ledger.record("/b.jpg", "h2", None).await.unwrap();

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.last_record_time, Some(latest.recorded_at));
    }

    #[tokio::test]
    async fn test_recent_failures_most_recent_first() {
        let (_dir, ledger) = open_ledger().await;

        for i in 0..5 {
            ledger
                .record_failure(&format!("/f{}.jpg", i), &format!("error {}", i))
                .await
                .unwrap();
        }

        let failures = ledger.recent_failures(3).await.unwrap();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].file_path, "/f4.jpg");
        assert_eq!(failures[1].file_path, "/f3.jpg");
        assert_eq!(failures[2].message, "error 2");

        // Failures never affect admission
        assert!(!ledger.is_known("/f4.jpg").await.unwrap());
        assert_eq!(ledger.stats().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn test_reopen_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        let ledger = UploadLedger::open(&path).await.unwrap();
        ledger.record("/a.jpg", "persisted", Some("r1")).await.unwrap();
        ledger.close().await;

        let reopened = UploadLedger::open(&path).await.unwrap();
        assert!(reopened.is_known("persisted").await.unwrap());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2026-10-18T09:30:00.250Z").unwrap();
        assert_eq!(rfc.timestamp_millis() % 1000, 250);

        let plain = parse_timestamp("2026-10-18 09:30:00").unwrap();
        assert_eq!(plain.timestamp(), rfc.timestamp());

        assert!(parse_timestamp("yesterday").is_err());
    }
}

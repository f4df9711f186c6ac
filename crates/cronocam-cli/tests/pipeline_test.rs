//! End-to-end upload runs against a mock remote library.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cronocam_cli::{BackupRun, RunError, RunOptions};
use cronocam_core::{FormatPolicy, UploaderConfig};
use cronocam_db::UploadLedger;
use cronocam_infra::RateLimiter;
use cronocam_uploader::Uploader;
use mockito::{Matcher, Mock, Server, ServerGuard};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const MIB: usize = 1024 * 1024;

struct Harness {
    server: ServerGuard,
    dir: TempDir,
    ledger: UploadLedger,
    limiter: RateLimiter,
    uploader: Uploader,
}

impl Harness {
    async fn new(chunk_size: usize) -> Self {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let ledger = UploadLedger::open(&dir.path().join("data").join("uploads.db"))
            .await
            .unwrap();

        let config = UploaderConfig {
            api_base_url: server.url(),
            chunk_size,
            max_retries: 3,
            backoff_unit: Duration::from_millis(1),
            ..UploaderConfig::default()
        };
        let limiter = RateLimiter::new(100.0, 10).unwrap();
        let uploader = Uploader::new(
            reqwest::Client::new(),
            &config,
            limiter.clone(),
            formats(),
        );

        Self {
            server,
            dir,
            ledger,
            limiter,
            uploader,
        }
    }

    fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run(&self, options: RunOptions) -> BackupRun {
        BackupRun::new(self.ledger.clone(), formats(), options)
    }

    async fn mock_start(&mut self, hits: usize) -> Mock {
        let session_url = format!("{}/upload-session", self.server.url());
        self.server
            .mock("POST", "/v1/uploads")
            .match_header("x-goog-upload-command", "start")
            .with_status(200)
            .with_header("x-goog-upload-url", &session_url)
            .expect(hits)
            .create_async()
            .await
    }

    async fn mock_chunks(&mut self, hits: usize) -> Mock {
        self.server
            .mock("POST", "/upload-session")
            .with_status(200)
            .with_body("upload-token")
            .expect(hits)
            .create_async()
            .await
    }

    async fn mock_finalize(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", "/v1/mediaItems:batchCreate")
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}

fn formats() -> FormatPolicy {
    FormatPolicy::new([".jpg", ".mp4"])
}

fn success_body(id: &str) -> String {
    format!(
        r#"{{"newMediaItemResults":[{{"status":{{"message":"Success"}},"mediaItem":{{"id":"{}"}}}}]}}"#,
        id
    )
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_large_file_uploads_in_three_chunks_then_dedups() {
    let mut h = Harness::new(5 * MIB).await;
    let video = h.write("holiday.mp4", &vec![42u8; 12 * MIB]);

    let start = h.mock_start(1).await;
    let first = h
        .server
        .mock("POST", "/upload-session")
        .match_header("x-goog-upload-command", "upload")
        .match_header("x-goog-upload-offset", "0")
        .match_header("content-length", Matcher::Exact((5 * MIB).to_string()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let second = h
        .server
        .mock("POST", "/upload-session")
        .match_header("x-goog-upload-command", "upload")
        .match_header("x-goog-upload-offset", Matcher::Exact((5 * MIB).to_string()))
        .match_header("content-length", Matcher::Exact((5 * MIB).to_string()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let last = h
        .server
        .mock("POST", "/upload-session")
        .match_header("x-goog-upload-command", "upload, finalize")
        .match_header("x-goog-upload-offset", Matcher::Exact((10 * MIB).to_string()))
        .match_header("content-length", Matcher::Exact((2 * MIB).to_string()))
        .with_status(200)
        .with_body("upload-token")
        .expect(1)
        .create_async()
        .await;
    let finalize = h.mock_finalize(200, &success_body("remote-video"), 1).await;

    let summary = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[video.clone()], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.uploaded, 1);

    let records = h.ledger.list_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_path, path_string(&video));
    assert_eq!(records[0].remote_id.as_deref(), Some("remote-video"));

    // Second run: admission short-circuits before any network call
    let again = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[video], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.uploaded, 0);
    assert_eq!(again.skipped, 1);
    assert_eq!(h.ledger.stats().await.unwrap().total_records, 1);

    start.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
    last.assert_async().await;
    finalize.assert_async().await;
}

#[tokio::test]
async fn test_forced_reupload_counts_as_duplicate() {
    let mut h = Harness::new(MIB).await;
    let photo = h.write("a.jpg", b"same pixels");

    let start = h.mock_start(2).await;
    let _chunks = h.mock_chunks(2).await;
    let _finalize = h.mock_finalize(200, &success_body("remote-1"), 2).await;

    let first = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[photo.clone()], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.uploaded, 1);

    let forced = h
        .run(RunOptions {
            force: true,
            max_files: 0,
        })
        .upload_files(&h.uploader, &[photo], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(forced.uploaded, 0);
    assert_eq!(forced.duplicates, 1);
    assert_eq!(h.ledger.stats().await.unwrap().total_records, 1);

    start.assert_async().await;
}

#[tokio::test]
async fn test_fatal_finalize_records_failure_and_continues() {
    let mut h = Harness::new(MIB).await;
    let a = h.write("a.jpg", b"first");
    let b = h.write("b.jpg", b"second");

    let _start = h.mock_start(2).await;
    let _chunks = h.mock_chunks(2).await;
    let finalize = h.mock_finalize(400, "invalid upload token", 2).await;

    let summary = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[a, b], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.uploaded, 0);
    // One attempt per file: fatal responses are not retried
    finalize.assert_async().await;

    assert_eq!(h.ledger.stats().await.unwrap().total_records, 0);
    let failures = h.ledger.recent_failures(10).await.unwrap();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].file_path.ends_with("b.jpg"));
    assert!(failures[0].message.contains("invalid upload token"));
}

#[tokio::test]
async fn test_session_start_failure_is_isolated_per_file() {
    let mut h = Harness::new(MIB).await;
    let photo = h.write("a.jpg", b"pixels");

    let start = h
        .server
        .mock("POST", "/v1/uploads")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let finalize = h.mock_finalize(200, &success_body("unused"), 0).await;

    let summary = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[photo], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(h.ledger.recent_failures(10).await.unwrap().len(), 1);
    start.assert_async().await;
    finalize.assert_async().await;
}

#[tokio::test]
async fn test_unsupported_files_are_skipped_silently() {
    let mut h = Harness::new(MIB).await;
    let notes = h.write("notes.txt", b"not a photo");

    let start = h.mock_start(0).await;

    let summary = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[notes], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.unsupported, 1);
    assert!(h.ledger.recent_failures(10).await.unwrap().is_empty());
    start.assert_async().await;
}

#[tokio::test]
async fn test_max_files_stops_run() {
    let mut h = Harness::new(MIB).await;
    let files: Vec<_> = (0..3)
        .map(|i| h.write(&format!("{}.jpg", i), format!("content {}", i).as_bytes()))
        .collect();

    let start = h.mock_start(2).await;
    let _chunks = h.mock_chunks(2).await;
    let _finalize = h.mock_finalize(200, &success_body("r"), 2).await;

    let summary = h
        .run(RunOptions {
            force: false,
            max_files: 2,
        })
        .upload_files(&h.uploader, &files, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 2);
    start.assert_async().await;
}

#[tokio::test]
async fn test_cancelled_run_reports_partial_summary() {
    let mut h = Harness::new(MIB).await;
    let photo = h.write("a.jpg", b"pixels");

    let start = h.mock_start(0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[photo], &cancel)
        .await
        .unwrap_err();

    let RunError::Cancelled { summary } = err else {
        panic!("expected cancellation, got {:?}", err);
    };
    assert_eq!(summary.uploaded, 0);
    assert_eq!(h.ledger.stats().await.unwrap().total_records, 0);
    assert!(h.ledger.recent_failures(10).await.unwrap().is_empty());
    start.assert_async().await;
}

#[tokio::test]
async fn test_closed_limiter_aborts_run() {
    let mut h = Harness::new(MIB).await;
    let a = h.write("a.jpg", b"first");
    let b = h.write("b.jpg", b"second");

    let start = h.mock_start(1).await;
    let _chunks = h.mock_chunks(1).await;
    let finalize = h.mock_finalize(200, &success_body("unused"), 0).await;

    h.limiter.shutdown();

    let err = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[a, b], &CancellationToken::new())
        .await
        .unwrap_err();

    let RunError::Aborted { summary, reason } = err else {
        panic!("expected an aborted run, got {:?}", err);
    };
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.uploaded, 0);
    assert!(reason.contains("shut down"), "{}", reason);

    // The second file is never attempted
    start.assert_async().await;
    finalize.assert_async().await;
    let failures = h.ledger.recent_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].file_path.ends_with("a.jpg"));
}

#[tokio::test]
async fn test_import_then_pending_listing() {
    let h = Harness::new(MIB).await;
    let a = h.write("a.jpg", b"one");
    let b = h.write("b.mp4", b"two");

    let summary = h
        .run(RunOptions::default())
        .import_files(&[a.clone(), b.clone()], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.imported, 2);

    assert_eq!(
        h.ledger.list_unsynced().await.unwrap(),
        vec![path_string(&a), path_string(&b)]
    );

    // Imported content is known, so an upload run skips it
    let upload = h
        .run(RunOptions::default())
        .upload_files(&h.uploader, &[a], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(upload.skipped, 1);
}

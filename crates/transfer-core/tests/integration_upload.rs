//! End-to-end upload scenarios against a local HTTP server: multipart
//! splitting across just-enough target URIs, a too-large file rejected
//! before any HTTP call, and one asset failing without blocking the rest
//! of the batch.

mod common;

use std::io::Write;

use tempfile::tempdir;
use transfer_core::config::{Options, RetryOverrides, TransferConfig};
use transfer_core::{upload_files, Event, UploadFile};

fn write_local_file(dir: &std::path::Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents).unwrap();
    path
}

#[tokio::test]
async fn multipart_upload_splits_just_enough_urls() {
    let server = common::mock_server::start(Vec::new());
    let dir = tempdir().unwrap();
    let local = write_local_file(dir.path(), "src.bin", b"hello world 123");

    let cfg = TransferConfig::default();
    let file = UploadFile {
        file_url: vec![format!("{}u1", server.base_url), format!("{}u2", server.base_url)],
        file_path: local,
        file_size: 15,
        max_part_size: Some(8),
        min_part_size: None,
        multipart_headers: Default::default(),
    };
    let options = Options { preferred_part_size: Some(7), ..Default::default() };
    let handle = upload_files(vec![file], &cfg, options);
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.failed, 0);

    // required = max(ceil(15/2), min_part_size=1) = 8 = max_part_size, so
    // preferred_part_size(7) clamps up to 8: parts are 8 and 7 bytes.
    let uploaded = server.uploaded.lock().unwrap();
    assert_eq!(uploaded.get("/u1").map(Vec::as_slice), Some(&b"hello wo"[..]));
    assert_eq!(uploaded.get("/u2").map(Vec::as_slice), Some(&b"rld 123"[..]));
}

#[tokio::test]
async fn multipart_upload_insufficient_urls_fails_before_any_http_call() {
    let server = common::mock_server::start(Vec::new());
    let dir = tempdir().unwrap();
    let local = write_local_file(dir.path(), "src.bin", b"hello world 123");

    let cfg = TransferConfig::default();
    let file = UploadFile {
        file_url: vec![format!("{}u1", server.base_url), format!("{}u2", server.base_url)],
        file_path: local,
        file_size: 15,
        max_part_size: Some(5),
        min_part_size: None,
        multipart_headers: Default::default(),
    };
    let handle = upload_files(vec![file], &cfg, Options::default());
    let result = handle.wait().await;

    assert!(result.is_err());
    assert!(server.uploaded.lock().unwrap().is_empty());
    assert_eq!(server.attempt_count(), 0);
}

#[tokio::test]
async fn one_asset_failing_upload_does_not_block_the_others() {
    let server = common::mock_server::start(Vec::new());
    let dir = tempdir().unwrap();
    let good_local = write_local_file(dir.path(), "good.bin", b"0123456789");
    let bad_local = write_local_file(dir.path(), "bad.bin", b"0123456789");

    let cfg = TransferConfig::default();
    let good = UploadFile {
        file_url: vec![format!("{}good1", server.base_url), format!("{}good2", server.base_url)],
        file_path: good_local,
        file_size: 10,
        max_part_size: Some(10),
        min_part_size: None,
        multipart_headers: Default::default(),
    };
    let bad = UploadFile {
        file_url: vec!["http://127.0.0.1:1/bad1".to_string(), "http://127.0.0.1:1/bad2".to_string()],
        file_path: bad_local,
        file_size: 10,
        max_part_size: Some(10),
        min_part_size: None,
        multipart_headers: Default::default(),
    };

    let options = Options {
        preferred_part_size: Some(5),
        retry: RetryOverrides { max_count: Some(1), ..Default::default() },
        ..Default::default()
    };
    let errors_cell = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let errors_for_handler = std::sync::Arc::clone(&errors_cell);
    let mut handle = upload_files(vec![good, bad], &cfg, options);
    handle.on(move |event| {
        if let Event::FileError { .. } = event {
            errors_for_handler.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    });
    let outcome = handle.wait().await;
    let errors = errors_cell.load(std::sync::atomic::Ordering::SeqCst);

    assert_eq!(errors, 1);
    assert!(outcome.is_err());

    let uploaded = server.uploaded.lock().unwrap();
    assert_eq!(uploaded.get("/good1").map(Vec::as_slice), Some(&b"01234"[..]));
    assert_eq!(uploaded.get("/good2").map(Vec::as_slice), Some(&b"56789"[..]));
}

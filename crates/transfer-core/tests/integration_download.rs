//! End-to-end download scenarios against a local HTTP server: single-part,
//! multi-chunk, a transient 503 retried to success, and one-asset-fails
//! without blocking the rest of the batch.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use transfer_core::config::TransferConfig;
use transfer_core::{download_files, DownloadFile, Event, Options};

#[tokio::test]
async fn single_part_download_matches_source() {
    let body: Vec<u8> = (0u8..255).cycle().take(4096).collect();
    let server = common::mock_server::start(body.clone());
    let dest_dir = tempdir().unwrap();
    let dest = dest_dir.path().join("file.bin");

    let cfg = TransferConfig::default();
    let file = DownloadFile {
        file_url: server.base_url.clone(),
        file_path: dest.clone(),
        file_size: None,
        content_type: None,
    };

    // §8 Scenario 1: exactly one FILE_START, one FILE_PROGRESS with the full
    // byte count, then one FILE_END, and no FILE_ERROR.
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let events_for_handler = Arc::clone(&events);
    let mut handle = download_files(vec![file], &cfg, Options::default());
    handle.on(move |event| {
        let label = match event {
            Event::FileStart { .. } => "start".to_string(),
            Event::FileProgress { transferred, .. } => format!("progress:{transferred}"),
            Event::FileEnd { .. } => "end".to_string(),
            Event::FileError { .. } => "error".to_string(),
        };
        events_for_handler.lock().unwrap().push(label);
    });
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(
        events.lock().unwrap().as_slice(),
        &["start".to_string(), format!("progress:{}", body.len()), "end".to_string()]
    );
}

#[tokio::test]
async fn multi_chunk_download_reassembles_exactly() {
    let body: Vec<u8> = (0u8..=255).cycle().take(256 * 1024).collect();
    let server = common::mock_server::start(body.clone());
    let dest_dir = tempdir().unwrap();
    let dest = dest_dir.path().join("big.bin");

    let mut cfg = TransferConfig::default();
    cfg.preferred_part_size = 32 * 1024;
    cfg.min_part_size = 1;

    let file = DownloadFile {
        file_url: server.base_url.clone(),
        file_path: dest.clone(),
        file_size: None,
        content_type: None,
    };
    let handle = download_files(vec![file], &cfg, Options::default());
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.completed, 1);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn transient_failure_is_retried_to_success() {
    let body = b"retry-me-please".to_vec();
    let server = common::mock_server::start_with_options(
        body.clone(),
        common::mock_server::ServerOptions { fail_first_n_requests: 2, ..Default::default() },
    );
    let dest_dir = tempdir().unwrap();
    let dest = dest_dir.path().join("flaky.bin");

    let cfg = TransferConfig::default();
    let file = DownloadFile {
        file_url: server.base_url.clone(),
        file_path: dest.clone(),
        file_size: None,
        content_type: None,
    };
    let handle = download_files(vec![file], &cfg, Options::default());
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.completed, 1);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(server.attempt_count() >= 3);
}

#[tokio::test]
async fn one_asset_failing_does_not_block_the_others() {
    let body: Vec<u8> = (0u8..200).collect();
    let good_server = common::mock_server::start(body.clone());
    let dest_dir = tempdir().unwrap();
    let good_dest = dest_dir.path().join("good.bin");
    let bad_dest = dest_dir.path().join("bad.bin");

    let cfg = TransferConfig::default();
    let files = vec![
        DownloadFile {
            file_url: "http://127.0.0.1:1/does-not-exist".to_string(),
            file_path: bad_dest.clone(),
            file_size: None,
            content_type: None,
        },
        DownloadFile {
            file_url: good_server.base_url.clone(),
            file_path: good_dest.clone(),
            file_size: None,
            content_type: None,
        },
    ];

    let options = Options {
        retry: transfer_core::config::RetryOverrides { max_count: Some(1), ..Default::default() },
        ..Default::default()
    };
    let errors = Arc::new(AtomicU64::new(0));
    let errors_for_handler = Arc::clone(&errors);
    let mut handle = download_files(files, &cfg, options);
    handle.on(move |event| {
        if let Event::FileError { .. } = event {
            errors_for_handler.fetch_add(1, Ordering::SeqCst);
        }
    });
    let outcome = handle.wait().await;

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(outcome.is_err());
    assert_eq!(std::fs::read(&good_dest).unwrap(), body);
}

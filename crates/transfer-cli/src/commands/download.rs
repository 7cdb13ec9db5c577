//! `transfer download <url> <dest>` – fetch one file to a local path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use transfer_core::{DownloadFile, Event, Options, TransferConfig};

use super::parse_headers;

pub async fn run_download(
    cfg: &TransferConfig,
    url: String,
    dest: PathBuf,
    max_concurrent: Option<usize>,
    part_size: Option<u64>,
    headers: Vec<String>,
    mkdirs: bool,
) -> Result<()> {
    let headers = parse_headers(&headers)?;
    let file = DownloadFile {
        file_url: url.clone(),
        file_path: dest.clone(),
        file_size: None,
        content_type: None,
    };

    let options = Options {
        max_concurrent,
        preferred_part_size: part_size,
        headers,
        mkdirs: if mkdirs { Some(true) } else { None },
        ..Default::default()
    };

    let mut handle = transfer_core::download_files(vec![file], cfg, options);
    let last_reported = Arc::new(AtomicU64::new(0));
    let reported = Arc::clone(&last_reported);
    handle.on(move |event| match event {
        Event::FileStart { .. } => println!("downloading {url} -> {}", dest.display()),
        Event::FileProgress { transferred, .. } => {
            reported.store(*transferred, Ordering::Relaxed);
        }
        Event::FileEnd { .. } => {
            println!("done, {} bytes", reported.load(Ordering::Relaxed));
        }
        Event::FileError { error, .. } => {
            eprintln!("transfer failed: {error:#}");
        }
    });

    let outcome = handle.wait().await?;
    if outcome.failed > 0 {
        anyhow::bail!("{} file(s) failed", outcome.failed);
    }
    Ok(())
}

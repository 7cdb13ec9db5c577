//! `transfer upload <src> <url>...` – push one local file to one or more
//! target URIs (more than one URI requests a multipart upload).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use transfer_core::model::UploadMethod;
use transfer_core::{Event, Options, TransferConfig, UploadFile};

use super::parse_headers;
use crate::cli::UploadMethodArg;

pub async fn run_upload(
    cfg: &TransferConfig,
    src: PathBuf,
    url: Vec<String>,
    method: UploadMethodArg,
    max_concurrent: Option<usize>,
    headers: Vec<String>,
    multipart_headers: Vec<String>,
) -> Result<()> {
    let headers = parse_headers(&headers)?;
    let multipart_headers = parse_headers(&multipart_headers)?;
    let file_size = std::fs::metadata(&src)
        .with_context(|| format!("cannot stat {}", src.display()))?
        .len();

    let file = UploadFile {
        file_url: url.clone(),
        file_path: src.clone(),
        file_size,
        max_part_size: None,
        min_part_size: None,
        multipart_headers,
    };

    let method = match method {
        UploadMethodArg::Put => UploadMethod::Put,
        UploadMethodArg::Post => UploadMethod::Post,
    };
    let options = Options { max_concurrent, headers, method, ..Default::default() };

    let mut handle = transfer_core::upload_files(vec![file], cfg, options);
    let last_reported = Arc::new(AtomicU64::new(0));
    let reported = Arc::clone(&last_reported);
    handle.on(move |event| match event {
        Event::FileStart { .. } => println!("uploading {} -> {}", src.display(), url.join(", ")),
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

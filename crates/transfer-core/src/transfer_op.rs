//! Transfer Operation: the per-part unit of work. Obtains a memory block,
//! moves bytes between the network and the block, then positionally
//! writes/reads the block against the local file.
//!
//! Grounded on the teacher's `downloader::segment::download_one_segment`
//! (range GET + streamed write) and `downloader::single::download_single`
//! (whole-file GET), generalized to stream through a pooled `MemoryBlock`
//! instead of writing straight from the curl callback, and extended with
//! the upload direction (positional read + PUT/POST).

use std::collections::HashMap;
use std::str;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::TransferError;
use crate::model::{Direction, TransferPart, UploadMethod};
use crate::pool::{MemoryBlock, MemoryPool};
use crate::storage::FileRegistry;

/// Headers applied to every request, plus any per-part multipart headers.
#[derive(Clone, Default)]
pub struct RequestHeaders {
    pub common: Arc<HashMap<String, String>>,
    pub per_part: Arc<HashMap<String, String>>,
}

/// Outcome of one successful part transfer.
pub struct PartOutcome {
    pub bytes: u64,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const LOW_SPEED_LIMIT_BYTES_PER_SEC: u32 = 1024;
const LOW_SPEED_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY_CHARS: usize = 10_000;

/// Executes one attempt of a part's transfer. Blocking (libcurl); callers
/// invoke this through `spawn_blocking`. Guarantees the obtained block is
/// released on every return path. `socket_timeout` is the §6 `timeout`
/// option: the per-request socket timeout applied to the whole request.
pub fn run_part_attempt(
    part: &TransferPart,
    pool: &MemoryPool,
    files: &FileRegistry,
    headers: &RequestHeaders,
    method: UploadMethod,
    socket_timeout: Duration,
) -> Result<PartOutcome, TransferError> {
    let size = part.len();
    let mut block = pool.obtain(size)?;
    let result = match part.direction {
        Direction::Download => download_into_block(part, &mut block, headers, socket_timeout),
        Direction::Upload => upload_from_block(part, &mut block, files, headers, method, socket_timeout),
    };
    // MemoryBlock releases on Drop regardless of which branch returned, but
    // an explicit release keeps the "release on every exit path" invariant
    // visible at the call site rather than implicit in a destructor.
    block.release();
    result.map(|bytes| PartOutcome { bytes })
}

fn download_into_block(
    part: &TransferPart,
    block: &mut MemoryBlock,
    headers: &RequestHeaders,
    socket_timeout: Duration,
) -> Result<u64, TransferError> {
    let expected = part.len();
    let received = AtomicU64::new(0);
    let response_headers: Mutex<Vec<String>> = Mutex::new(Vec::new());

    let mut easy = curl::easy::Easy::new();
    easy.url(&part.remote_uri)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    easy.follow_location(true)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    easy.connect_timeout(CONNECT_TIMEOUT)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    easy.low_speed_limit(LOW_SPEED_LIMIT_BYTES_PER_SEC)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    easy.low_speed_time(LOW_SPEED_TIMEOUT)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    easy.timeout(socket_timeout)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;

    if part.use_range_header {
        easy.range(&format!("{}-{}", part.range.start, part.range.end.saturating_sub(1)))
            .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in headers.common.iter() {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    }
    easy.http_headers(list)
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    response_headers.lock().unwrap().push(s.trim_end().to_string());
                }
                true
            })
            .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
        transfer
            .write_function(|data| {
                let off = received.fetch_add(data.len() as u64, Ordering::Relaxed) as usize;
                let view = block.view_mut();
                let end = (off + data.len()).min(view.len());
                if off < view.len() {
                    view[off..end].copy_from_slice(&data[..end - off]);
                }
                Ok(data.len())
            })
            .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
        transfer
            .perform()
            .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;
    }

    let status = easy
        .response_code()
        .map_err(|e| connect_err("GET", &part.remote_uri, e.to_string()))?;

    validate_download_status(part, status, &response_headers.lock().unwrap())?;

    let received = received.load(Ordering::Relaxed);
    if received != expected {
        return Err(TransferError::Truncated { expected, received });
    }

    let file = files
        .handle_for_write(&part.local_path, part.asset.asset.declared_size, part.asset.asset.mkdirs)
        .map_err(TransferError::from)?;
    file.write_at(part.range.start, block.view())
        .map_err(|e| TransferError::Storage {
            path: (*part.local_path).clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

    Ok(received)
}

fn validate_download_status(
    part: &TransferPart,
    status: u32,
    response_headers: &[String],
) -> Result<(), TransferError> {
    match status {
        206 => {
            if let Some(first_byte) = content_range_first_byte(response_headers) {
                if first_byte != part.range.start {
                    return Err(TransferError::RangeNotRespected {
                        start: part.range.start,
                        end: part.range.end,
                    });
                }
            }
            Ok(())
        }
        200 => {
            if part.use_range_header && part.range.start != 0 {
                Err(TransferError::RangeNotRespected {
                    start: part.range.start,
                    end: part.range.end,
                })
            } else {
                Ok(())
            }
        }
        _ => Err(TransferError::HttpStatus {
            status,
            method: "GET",
            url: part.remote_uri.clone(),
            body: None,
        }),
    }
}

fn content_range_first_byte(lines: &[String]) -> Option<u64> {
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-range") {
                let value = value.trim();
                let rest = value.strip_prefix("bytes ")?;
                let first = rest.split(['-', '/']).next()?;
                return first.parse::<u64>().ok();
            }
        }
    }
    None
}

fn upload_from_block(
    part: &TransferPart,
    block: &mut MemoryBlock,
    files: &FileRegistry,
    headers: &RequestHeaders,
    method: UploadMethod,
    socket_timeout: Duration,
) -> Result<u64, TransferError> {
    let size = part.len();
    let file = files
        .handle_for_read(&part.local_path)
        .map_err(TransferError::from)?;
    let data = file
        .read_at(part.range.start, size as usize)
        .map_err(|e| TransferError::Storage {
            path: (*part.local_path).clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
    block.view_mut()[..data.len()].copy_from_slice(&data);

    let mut easy = curl::easy::Easy::new();
    easy.url(&part.remote_uri)
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    easy.connect_timeout(CONNECT_TIMEOUT)
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    easy.timeout(socket_timeout)
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    match method {
        UploadMethod::Put => easy
            .put(true)
            .map_err(|e| connect_err("PUT", &part.remote_uri, e.to_string()))?,
        UploadMethod::Post => {
            // CURLOPT_CUSTOMREQUEST only overrides the method string sent on
            // the wire; without CURLOPT_UPLOAD libcurl never calls
            // read_function and the request goes out with an empty body.
            easy.upload(true)
                .map_err(|e| connect_err("POST", &part.remote_uri, e.to_string()))?;
            easy.custom_request("POST")
                .map_err(|e| connect_err("POST", &part.remote_uri, e.to_string()))?;
        }
    };
    easy.in_filesize(size)
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;

    let mut list = curl::easy::List::new();
    list.append(&format!("Content-Length: {}", size))
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    for (k, v) in headers.common.iter().chain(headers.per_part.iter()) {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    }
    easy.http_headers(list)
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;

    let body = block.view().to_vec();
    let mut cursor = 0usize;
    let response_body: Mutex<Vec<u8>> = Mutex::new(Vec::new());
    {
        let mut transfer = easy.transfer();
        transfer
            .read_function(move |buf| {
                let remaining = &body[cursor..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                cursor += n;
                Ok(n)
            })
            .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
        transfer
            .write_function(|data| {
                response_body.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
        transfer
            .perform()
            .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    }

    let status = easy
        .response_code()
        .map_err(|e| connect_err(method.as_str(), &part.remote_uri, e.to_string()))?;
    if !(200..300).contains(&status) {
        let body_text = String::from_utf8_lossy(&response_body.lock().unwrap()).into_owned();
        return Err(TransferError::HttpStatus {
            status,
            method: method.as_str(),
            url: part.remote_uri.clone(),
            body: if body_text.is_empty() {
                None
            } else {
                Some(truncate_error_body(&body_text))
            },
        });
    }

    Ok(size)
}

fn connect_err(method: &'static str, url: &str, cause: String) -> TransferError {
    TransferError::HttpConnect {
        method,
        url: url.to_string(),
        cause,
    }
}

/// Truncates a captured non-2xx response body to the first
/// `MAX_ERROR_BODY_CHARS` characters, per §6's upload-adapter error contract.
pub fn truncate_error_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

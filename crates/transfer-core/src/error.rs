//! Typed error taxonomy for the transfer pipeline.
//!
//! Domain errors that callers may want to match on use this enum (mirrors
//! the teacher's narrow `SegmentError` but widened to the full taxonomy and
//! expressed with `thiserror` since the crate already depends on it).
//! Plumbing errors (I/O setup, directory creation, config parsing) stay as
//! `anyhow::Error` and get wrapped into `TransferError::Other` at the
//! boundary where a typed result is returned to a caller.

use std::path::PathBuf;

/// Errors surfaced by the transfer pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Option or asset-shape violation caught at the public boundary. Not retried.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The Part Planner could not fit `contentLength` into the available
    /// target URIs under `maxPartSize`. Not retried.
    #[error("file too large for available target URIs: content_length={content_length}, urls={url_count}, max_part_size={max_part_size}")]
    FileTooLarge {
        content_length: u64,
        url_count: usize,
        max_part_size: u64,
    },

    /// No `Content-Length` available and none was supplied by the caller.
    #[error("missing content length for asset")]
    MissingContentLength,

    /// A multipart target was requested with zero URIs.
    #[error("no target URLs supplied for multipart transfer")]
    NoTargetUrls,

    /// The asset's target shape is not supported (e.g. neither a file path nor a URI).
    #[error("unsupported target descriptor")]
    UnsupportedTarget,

    /// Non-2xx HTTP response.
    #[error("HTTP {status} from {method} {url}")]
    HttpStatus {
        status: u32,
        method: &'static str,
        url: String,
        body: Option<String>,
    },

    /// Transport-level failure (DNS, connection reset, timeout).
    #[error("transport error on {method} {url}: {cause}")]
    HttpConnect {
        method: &'static str,
        url: String,
        cause: String,
    },

    /// Server returned a status/range that does not match the requested byte range.
    #[error("range not respected for [{start}, {end})")]
    RangeNotRespected { start: u64, end: u64 },

    /// Streamed body was shorter than declared.
    #[error("truncated transfer: expected {expected} bytes, got {received}")]
    Truncated { expected: u64, received: u64 },

    /// Requested size exceeds the memory pool's total capacity.
    #[error("requested block of {requested} bytes exceeds pool capacity {capacity}")]
    OutOfMemoryPool { requested: u64, capacity: u64 },

    /// Local file I/O failure.
    #[error("storage error on {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure, wrapped from plumbing code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransferError {
    /// True for errors that represent a fatal, non-retryable part-level failure
    /// per §4.5 (range/truncation errors indicate a server-side protocol violation).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TransferError::RangeNotRespected { .. } | TransferError::Truncated { .. }
        )
    }
}

//! Classify a `TransferError` into a retry `ErrorKind`, and drive an async
//! retry loop around a part attempt. Grounded on the teacher's
//! `classify_http_status`/`classify_curl_error`/`run_with_retry`, widened to
//! the `TransferError` taxonomy and switched to `tokio::time::sleep` since
//! the mapper drives attempts from async tasks.

use std::time::Duration;

use crate::error::TransferError;

use super::policy::{ErrorKind, RetryConfig, RetryDecision};

pub fn classify_http_status(status: u32, retry_all_errors: bool) -> ErrorKind {
    match status {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(status as u16),
        400..=499 => ErrorKind::Http4xx(status as u16),
        _ if retry_all_errors => ErrorKind::Http4xx(status as u16),
        _ => ErrorKind::Fatal,
    }
}

pub fn classify(err: &TransferError) -> ErrorKind {
    match err {
        TransferError::HttpStatus { status, .. } => classify_http_status(*status, false),
        TransferError::HttpConnect { .. } => ErrorKind::Connection,
        _ => ErrorKind::Fatal,
    }
}

/// Runs `attempt` until it succeeds or `config` says to stop retrying,
/// sleeping for the computed backoff between attempts. On exhaustion,
/// returns the last error.
pub async fn run_with_retry<F, Fut, T>(config: &RetryConfig, mut attempt: F) -> Result<T, TransferError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransferError>>,
{
    let start = tokio::time::Instant::now();
    let mut attempt_no = 0u32;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = match &e {
                    TransferError::HttpStatus { status, .. } => {
                        classify_http_status(*status, config.retry_all_errors)
                    }
                    _ if e.is_protocol_violation() => ErrorKind::Fatal,
                    TransferError::HttpConnect { .. } => ErrorKind::Connection,
                    _ => ErrorKind::Fatal,
                };
                match config.decide(attempt_no, start.elapsed(), kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt_no += 1;
                    }
                }
            }
        }
    }
}

//! Concurrent Mapper: applies the Transfer Operation to a sequence of
//! TransferParts with at most `max_concurrent` in flight, emitting each
//! completed part as soon as it finishes (completion order, not input
//! order), and folding the Failed-Asset Filter in as a pre-dispatch check.
//!
//! Grounded on the teacher's `downloader::run::run_concurrent` bounded
//! worker-pool-plus-channel shape, ported from raw `std::thread` workers
//! over an `mpsc` channel to a `tokio::task::JoinSet` bounded by a
//! semaphore, since the rest of the pipeline already runs on a tokio
//! executor and `JoinSet::join_next` gives the same completion-order
//! delivery the teacher gets from its result channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::filter;
use crate::model::TransferPart;
use crate::pool::MemoryPool;
use crate::retry::{run_with_retry, RetryConfig};
use crate::storage::FileRegistry;
use crate::transfer_op::{run_part_attempt, PartOutcome, RequestHeaders};

use crate::error::TransferError;
use crate::model::UploadMethod;

/// Result of running one part to completion (success or exhausted retries).
pub struct PartResult {
    pub part: TransferPart,
    pub outcome: Result<PartOutcome, TransferError>,
}

/// Dispatches `parts` with bounded concurrency, returning a receiver that
/// yields a `PartResult` per part as soon as it completes. The returned
/// background task keeps pulling from `parts` as slots free; it never holds
/// more than `max_concurrent` attempts in flight.
pub fn spawn(
    parts: Vec<TransferPart>,
    pool: MemoryPool,
    files: Arc<FileRegistry>,
    headers: RequestHeaders,
    method: UploadMethod,
    retry_config: RetryConfig,
    max_concurrent: usize,
    cancel: CancelToken,
    socket_timeout: Duration,
) -> mpsc::Receiver<PartResult> {
    let (tx, rx) = mpsc::channel(max_concurrent.max(1));
    tokio::spawn(async move {
        run_loop(parts, pool, files, headers, method, retry_config, max_concurrent, cancel, socket_timeout, tx).await;
    });
    rx
}

async fn run_loop(
    parts: Vec<TransferPart>,
    pool: MemoryPool,
    files: Arc<FileRegistry>,
    headers: RequestHeaders,
    method: UploadMethod,
    retry_config: RetryConfig,
    max_concurrent: usize,
    cancel: CancelToken,
    socket_timeout: Duration,
    tx: mpsc::Sender<PartResult>,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut join_set: JoinSet<PartResult> = JoinSet::new();

    for part in parts {
        if cancel.is_cancelled() {
            break;
        }
        if filter::should_drop(&part) {
            continue;
        }

        // Backpressure: wait for a free slot before pulling the next part.
        let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore not closed");

        let pool = pool.clone();
        let files = Arc::clone(&files);
        let headers = headers.clone();
        let retry_config = retry_config;
        let cancel = cancel.clone();

        join_set.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() || filter::should_drop(&part) {
                return PartResult {
                    part,
                    outcome: Err(TransferError::Other(anyhow::anyhow!(crate::cancel::Cancelled))),
                };
            }
            let outcome = run_with_retry(&retry_config, || {
                let part = part.clone();
                let pool = pool.clone();
                let files = Arc::clone(&files);
                let headers = headers.clone();
                async move {
                    tokio::task::spawn_blocking(move || {
                        run_part_attempt(&part, &pool, &files, &headers, method, socket_timeout)
                    })
                    .await
                    .map_err(|e| TransferError::Other(anyhow::anyhow!("worker task panicked: {e}")))?
                }
            })
            .await;
            PartResult { part, outcome }
        });

        // Drain any results already available so the channel doesn't fill
        // up and deadlock the dispatch loop while new parts are still being
        // pulled in.
        while let Some(joined) = join_set.try_join_next() {
            let result = match joined {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "part task panicked; result dropped");
                    continue;
                }
            };
            if tx.send(result).await.is_err() {
                return;
            }
        }
    }

    while let Some(joined) = join_set.join_next().await {
        let result = match joined {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "part task panicked; result dropped");
                continue;
            }
        };
        if tx.send(result).await.is_err() {
            return;
        }
    }
}

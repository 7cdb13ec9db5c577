//! Pipeline-level cancellation: a shared token observed at the suspension
//! points named in §5 (memory-pool wait, HTTP send/receive, file I/O).
//!
//! Grounded on the teacher's `control::JobAborted`/`Arc<AtomicBool>` pair,
//! simplified since this crate has no job registry or control socket — just
//! the one token per batch call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised when an in-flight operation observes cancellation at a suspension
/// point instead of completing.
#[derive(Debug)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// A cloneable handle onto a single shared cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

//! Controller / Event Bus: the lifecycle-event capability set described in
//! §9's "event emitter -> subscription interface" design note, plus the
//! driver that threads mapper output through the joiner and enforces the
//! per-asset state machine and cleanup contract of §4.8.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::error::TransferError;
use crate::filter;
use crate::joiner::{self, JoinOutcome};
use crate::mapper;
use crate::model::{AssetId, TransferPart, UploadMethod};
use crate::pool::MemoryPool;
use crate::retry::RetryConfig;
use crate::storage::FileRegistry;
use crate::transfer_op::RequestHeaders;

/// A lifecycle event for one asset. Every event carries the asset's id;
/// `FileProgress` additionally carries the cumulative bytes transferred so
/// far, per §4.8/§8's progress-monotonicity invariant.
#[derive(Clone)]
pub enum Event {
    FileStart { asset_id: AssetId },
    FileProgress { asset_id: AssetId, transferred: u64 },
    FileEnd { asset_id: AssetId },
    FileError { asset_id: AssetId, error: Arc<TransferError> },
}

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// Dispatches events synchronously to registered handlers, in registration
/// order, per event kind. Handlers must not panic; a panicking handler
/// would poison the dispatch for every later handler and event.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Handler>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus { handlers: Vec::new() }
    }

    /// Registers a handler invoked for every event kind; callers match on
    /// the event's variant themselves (this crate has only the four kinds
    /// named in §4.8, so a single subscription point is simpler than four).
    pub fn on(&mut self, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler(&event);
        }
    }
}

/// Drives a planned batch of parts through the Concurrent Mapper and Part
/// Joiner, emitting lifecycle events and enforcing first-error-wins
/// semantics, then performs pipeline teardown.
pub struct Controller {
    bus: EventBus,
    files: Arc<FileRegistry>,
    pool: MemoryPool,
}

impl Controller {
    pub fn new(bus: EventBus, files: Arc<FileRegistry>, pool: MemoryPool) -> Self {
        Controller { bus, files, pool }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Runs `parts` to completion. Returns the first asset-level error
    /// recorded during the run, if any; all asset-level errors (first or
    /// suppressed) are observable via `FileError` events regardless.
    pub async fn run(
        &self,
        parts: Vec<TransferPart>,
        headers: RequestHeaders,
        method: UploadMethod,
        retry_config: RetryConfig,
        max_concurrent: usize,
        cancel: CancelToken,
        socket_timeout: Duration,
    ) -> Result<(), TransferError> {
        // FILE_START fires for the first part of each asset about to be
        // dispatched, strictly before the mapper can report any completion
        // for that asset (§5's ordering guarantee).
        for part in &parts {
            if !filter::should_drop(part) && part.asset.try_start() {
                self.bus.emit(Event::FileStart { asset_id: part.asset.id });
            }
        }

        let mut rx: mpsc::Receiver<mapper::PartResult> = mapper::spawn(
            parts,
            self.pool.clone(),
            Arc::clone(&self.files),
            headers,
            method,
            retry_config,
            max_concurrent,
            cancel,
            socket_timeout,
        );

        let mut first_error: Option<Arc<TransferError>> = None;
        while let Some(mapper::PartResult { part, outcome }) = rx.recv().await {
            match outcome {
                Ok(part_outcome) => match joiner::fold_success(&part.asset, part_outcome.bytes) {
                    JoinOutcome::Progress { asset, bytes_transferred } => {
                        self.bus.emit(Event::FileProgress {
                            asset_id: asset.id,
                            transferred: bytes_transferred,
                        });
                    }
                    JoinOutcome::AssetCompleted { asset, bytes_transferred } => {
                        self.bus.emit(Event::FileProgress {
                            asset_id: asset.id,
                            transferred: bytes_transferred,
                        });
                        self.bus.emit(Event::FileEnd { asset_id: asset.id });
                    }
                    _ => {}
                },
                Err(err) => match joiner::fold_failure(&part.asset, err) {
                    JoinOutcome::AssetFailed { asset, error } => {
                        self.bus.emit(Event::FileError {
                            asset_id: asset.id,
                            error: Arc::clone(&error),
                        });
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    _ => {}
                },
            }
        }

        self.files.close_all();

        match first_error {
            Some(err) => Err(Arc::try_unwrap(err).unwrap_or_else(|shared| {
                TransferError::Other(anyhow::anyhow!(shared.to_string()))
            })),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn event_bus_dispatches_in_registration_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(AtomicUsize::new(0));
        let o1 = Arc::clone(&order);
        bus.on(move |_e| {
            assert_eq!(o1.fetch_add(1, Ordering::SeqCst), 0);
        });
        let o2 = Arc::clone(&order);
        bus.on(move |_e| {
            assert_eq!(o2.fetch_add(1, Ordering::SeqCst), 1);
        });
        bus.emit(Event::FileEnd { asset_id: AssetId(0) });
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }
}

//! Public invocation surface: `download_files` / `upload_files`, mirroring
//! the `downloadFiles`/`uploadFiles` entry points in §6. Wires the Asset
//! Metadata Resolver, Part Planner, Memory-Pool Allocator, Random File
//! Accessor, and Controller together for one batch call.
//!
//! Both entry points return a `BatchHandle` synchronously; all asset
//! resolution, planning, and transfer work happens lazily inside
//! `BatchHandle::wait`, so callers always get a chance to register event
//! handlers via `on` before the first event can possibly fire.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::{Options, TransferConfig};
use crate::controller::{Controller, Event, EventBus};
use crate::error::TransferError;
use crate::fetch_head;
use crate::model::{Asset, AssetContext, AssetId, AssetState, Endpoint, RemoteSide, TransferPart, UploadMethod};
use crate::planner::{self, PlanInput};
use crate::pool::MemoryPool;
use crate::storage::FileRegistry;
use crate::transfer_op::RequestHeaders;

/// One file to download: a remote source and the local path to write it to.
/// `file_size` and `content_type` are hints; when absent the Asset Metadata
/// Resolver probes the source instead.
#[derive(Debug, Clone)]
pub struct DownloadFile {
    pub file_url: String,
    pub file_path: PathBuf,
    pub file_size: Option<u64>,
    pub content_type: Option<String>,
}

/// One file to upload: a local source and one or more remote target URIs
/// (a `Vec` with more than one entry requests a multipart upload).
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_url: Vec<String>,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub max_part_size: Option<u64>,
    pub min_part_size: Option<u64>,
    pub multipart_headers: HashMap<String, String>,
}

/// Outcome of a batch call: how many assets completed vs. failed. The first
/// asset-level error across the batch is also returned as the call's `Err`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: usize,
    pub failed: usize,
}

type BatchFuture = Pin<Box<dyn Future<Output = Result<BatchOutcome, TransferError>> + Send>>;

/// A batch call that hasn't started work yet. Subscribe to lifecycle events
/// via `on` before calling `wait`, mirroring §6's
/// `filestart`/`fileprogress`/`fileend`/`fileerror` subscription surface —
/// no metadata probe, plan, or transfer runs until `wait` is called, so
/// every event a batch can emit reaches handlers registered beforehand.
pub struct BatchHandle {
    bus: EventBus,
    run: Box<dyn FnOnce(EventBus) -> BatchFuture + Send>,
}

impl BatchHandle {
    pub fn on(&mut self, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.bus.on(handler);
    }

    pub async fn wait(self) -> Result<BatchOutcome, TransferError> {
        (self.run)(self.bus).await
    }
}

async fn resolve_metadata(
    url: &str,
    headers: &HashMap<String, String>,
    hinted_size: Option<u64>,
) -> Result<fetch_head::HeadResult, TransferError> {
    if let Some(size) = hinted_size {
        return Ok(fetch_head::HeadResult {
            content_length: Some(size),
            accept_ranges: true,
            etag: None,
            last_modified: None,
            content_disposition: None,
            content_type: None,
        });
    }
    let url = url.to_string();
    let headers = headers.clone();
    tokio::task::spawn_blocking(move || fetch_head::probe(&url, &headers))
        .await
        .map_err(|e| TransferError::Other(anyhow::anyhow!("metadata probe task panicked: {e}")))?
}

/// Parts and asset contexts the planning stage produced, plus how many
/// assets never made it to dispatch (metadata/validation/sizing failures)
/// and the first such error, so the batch can still fail overall even when
/// every dispatched part succeeds.
struct PlanResult {
    parts: Vec<TransferPart>,
    asset_ctxs: Vec<Arc<AssetContext>>,
    planning_failed: usize,
    first_planning_error: Option<Arc<TransferError>>,
}

impl PlanResult {
    fn new() -> Self {
        PlanResult { parts: Vec::new(), asset_ctxs: Vec::new(), planning_failed: 0, first_planning_error: None }
    }

    fn record_failure(&mut self, bus: &EventBus, asset_id: AssetId, err: TransferError) {
        let err = Arc::new(err);
        bus.emit(Event::FileError { asset_id, error: Arc::clone(&err) });
        self.planning_failed += 1;
        if self.first_planning_error.is_none() {
            self.first_planning_error = Some(err);
        }
    }
}

/// Resolves metadata, validates, and plans every download asset, reporting
/// per-asset planning failures as `FileError` directly (no `FileStart` ever
/// fires for an asset that never reached dispatch, per §5).
async fn plan_downloads(files: Vec<DownloadFile>, config: &TransferConfig, options: &Options, bus: &EventBus) -> PlanResult {
    let mut result = PlanResult::new();

    for (i, f) in files.into_iter().enumerate() {
        let asset_id = AssetId(i);
        let head = match resolve_metadata(&f.file_url, &options.headers, f.file_size).await {
            Ok(h) => h,
            Err(e) => {
                result.record_failure(bus, asset_id, e);
                continue;
            }
        };
        let content_length = match head.content_length {
            Some(n) => n,
            None => {
                result.record_failure(bus, asset_id, TransferError::MissingContentLength);
                continue;
            }
        };

        let asset = Asset {
            source: Some(Endpoint::Remote(RemoteSide::Single(f.file_url.clone()))),
            target: Some(Endpoint::Local(f.file_path.clone())),
            headers: options.headers.clone(),
            multipart_headers: HashMap::new(),
            accept_ranges: Some(head.accept_ranges),
            declared_size: Some(content_length),
            content_type: f.content_type.or(head.content_type),
            preferred_part_size: Some(config.preferred_part_size),
            min_part_size: Some(config.min_part_size),
            max_part_size: Some(config.max_part_size),
            method: UploadMethod::Put,
            mkdirs: options.mkdirs.unwrap_or(config.mkdirs),
        };
        if let Err(e) = asset.validate() {
            result.record_failure(bus, asset_id, e);
            continue;
        }
        let ctx = Arc::new(AssetContext::new(asset_id, asset));

        let input = PlanInput {
            content_length,
            preferred_part_size: Some(config.preferred_part_size),
            min_part_size: config.min_part_size,
            max_part_size: config.max_part_size,
            target_accepts_ranges: true,
            source_accepts_ranges: head.accept_ranges,
        };
        match planner::plan_download(&ctx, Arc::new(f.file_path), &input) {
            Ok(parts) => {
                ctx.set_parts_total(parts.len());
                result.parts.extend(parts);
                result.asset_ctxs.push(ctx);
            }
            Err(e) => result.record_failure(bus, asset_id, e),
        }
    }

    result
}

/// Validates and plans every upload asset. Upload assets need no metadata
/// probe: `file_size` is supplied by the caller up front.
fn plan_uploads(files: Vec<UploadFile>, config: &TransferConfig, options: &Options, bus: &EventBus) -> PlanResult {
    let mut result = PlanResult::new();

    for (i, f) in files.into_iter().enumerate() {
        let asset_id = AssetId(i);
        let target = if f.file_url.len() > 1 {
            RemoteSide::Multi(f.file_url.clone())
        } else {
            RemoteSide::Single(f.file_url.first().cloned().unwrap_or_default())
        };
        let min_part_size = f.min_part_size.unwrap_or(config.min_part_size);
        let max_part_size = f.max_part_size.unwrap_or(config.max_part_size);
        let asset = Asset {
            source: Some(Endpoint::Local(f.file_path.clone())),
            target: Some(Endpoint::Remote(target)),
            headers: options.headers.clone(),
            multipart_headers: f.multipart_headers.clone(),
            accept_ranges: Some(true),
            declared_size: Some(f.file_size),
            content_type: None,
            preferred_part_size: Some(config.preferred_part_size),
            min_part_size: Some(min_part_size),
            max_part_size: Some(max_part_size),
            method: options.method,
            mkdirs: false,
        };
        if let Err(e) = asset.validate() {
            result.record_failure(bus, asset_id, e);
            continue;
        }
        let ctx = Arc::new(AssetContext::new(asset_id, asset));

        let input = PlanInput {
            content_length: f.file_size,
            preferred_part_size: Some(config.preferred_part_size),
            min_part_size,
            max_part_size,
            target_accepts_ranges: true,
            source_accepts_ranges: true,
        };
        match planner::plan_upload(&ctx, Arc::new(f.file_path), &input) {
            Ok(parts) => {
                ctx.set_parts_total(parts.len());
                result.parts.extend(parts);
                result.asset_ctxs.push(ctx);
            }
            Err(e) => result.record_failure(bus, asset_id, e),
        }
    }

    result
}

async fn drive(plan: PlanResult, config: TransferConfig, options: Options, bus: EventBus) -> Result<BatchOutcome, TransferError> {
    let pool = MemoryPool::new(config.pool_capacity_bytes);
    let files = Arc::new(FileRegistry::new());
    let retry_config = config.retry_config();
    let request_headers = RequestHeaders {
        common: Arc::new(options.headers.clone()),
        per_part: Arc::new(options.multipart_headers.clone()),
    };

    let socket_timeout = std::time::Duration::from_secs(config.timeout_secs);
    let controller = Controller::new(bus, files, pool);
    let run_result = controller
        .run(
            plan.parts,
            request_headers,
            options.method,
            retry_config,
            config.max_concurrent,
            CancelToken::new(),
            socket_timeout,
        )
        .await;

    let mut outcome = BatchOutcome { completed: 0, failed: plan.planning_failed };
    for ctx in &plan.asset_ctxs {
        match ctx.state() {
            AssetState::Completed => outcome.completed += 1,
            AssetState::Failed => outcome.failed += 1,
            _ => {}
        }
    }

    match run_result {
        Ok(()) => match plan.first_planning_error {
            Some(err) => Err(unwrap_or_clone(err)),
            None => Ok(outcome),
        },
        Err(e) => Err(e),
    }
}

fn unwrap_or_clone(err: Arc<TransferError>) -> TransferError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| TransferError::Other(anyhow::anyhow!(shared.to_string())))
}

/// Downloads every file in `files` with bounded concurrency. No work starts
/// until the returned handle's `wait` is awaited.
pub fn download_files(files: Vec<DownloadFile>, base_config: &TransferConfig, options: Options) -> BatchHandle {
    let config = options.resolve(base_config);
    let run = move |bus: EventBus| -> BatchFuture {
        Box::pin(async move {
            let plan = plan_downloads(files, &config, &options, &bus).await;
            drive(plan, config, options, bus).await
        })
    };
    BatchHandle { bus: EventBus::new(), run: Box::new(run) }
}

/// Uploads every file in `files` with bounded concurrency; `file_url` with
/// more than one entry triggers a multipart upload across those URIs. No
/// work starts until the returned handle's `wait` is awaited.
pub fn upload_files(files: Vec<UploadFile>, base_config: &TransferConfig, options: Options) -> BatchHandle {
    let config = options.resolve(base_config);
    let run = move |bus: EventBus| -> BatchFuture {
        Box::pin(async move {
            let plan = plan_uploads(files, &config, &options, &bus);
            drive(plan, config, options, bus).await
        })
    };
    BatchHandle { bus: EventBus::new(), run: Box::new(run) }
}

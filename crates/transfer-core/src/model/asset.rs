//! Asset and TransferAsset: the logical unit moved by the pipeline, and its
//! mutable runtime state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::TransferError;

/// Upload method override. PUT is the default; POST is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMethod {
    Put,
    Post,
}

impl Default for UploadMethod {
    fn default() -> Self {
        UploadMethod::Put
    }
}

impl UploadMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadMethod::Put => "PUT",
            UploadMethod::Post => "POST",
        }
    }
}

/// One side of an asset: either a single remote URI or an ordered list of
/// URIs (multipart target, one URI per part).
#[derive(Debug, Clone)]
pub enum RemoteSide {
    Single(String),
    Multi(Vec<String>),
}

impl RemoteSide {
    pub fn url_count(&self) -> usize {
        match self {
            RemoteSide::Single(_) => 1,
            RemoteSide::Multi(urls) => urls.len(),
        }
    }

    pub fn url_at(&self, index: usize) -> Option<&str> {
        match self {
            RemoteSide::Single(u) => {
                if index == 0 {
                    Some(u.as_str())
                } else {
                    None
                }
            }
            RemoteSide::Multi(urls) => urls.get(index).map(String::as_str),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RemoteSide::Multi(_))
    }
}

/// Either side of an asset (source or target): a local file path, or a
/// remote HTTP(S) endpoint (single URI or multipart URI list).
#[derive(Debug, Clone)]
pub enum Endpoint {
    Local(PathBuf),
    Remote(RemoteSide),
}

impl Endpoint {
    pub fn as_remote(&self) -> Option<&RemoteSide> {
        match self {
            Endpoint::Remote(r) => Some(r),
            Endpoint::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            Endpoint::Local(p) => Some(p),
            Endpoint::Remote(_) => None,
        }
    }
}

/// User-supplied asset description: the input to the pipeline.
#[derive(Debug, Clone)]
pub struct Asset {
    pub source: Option<Endpoint>,
    pub target: Option<Endpoint>,
    pub headers: HashMap<String, String>,
    pub multipart_headers: HashMap<String, String>,
    pub accept_ranges: Option<bool>,
    pub declared_size: Option<u64>,
    pub content_type: Option<String>,
    pub preferred_part_size: Option<u64>,
    pub min_part_size: Option<u64>,
    pub max_part_size: Option<u64>,
    pub method: UploadMethod,
    /// Create the target's parent directory tree before writing (§6 `mkdirs`).
    pub mkdirs: bool,
}

/// Rejects a remote URI that doesn't parse as an absolute `http(s)` URL, so
/// a malformed target fails during planning rather than at curl dispatch
/// time with a confusing libcurl error.
fn validate_uri(uri: &str) -> Result<(), TransferError> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| TransferError::IllegalArgument(format!("invalid URL '{uri}': {e}")))?;
    if parsed.host_str().is_none() {
        return Err(TransferError::IllegalArgument(format!("URL missing host: {uri}")));
    }
    Ok(())
}

impl Asset {
    /// Validates the §3 invariants: at least one of source/target is present;
    /// a multipart endpoint's URI list is non-empty; every remote URI parses
    /// as a well-formed absolute URL.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.source.is_none() && self.target.is_none() {
            return Err(TransferError::IllegalArgument(
                "asset must have a source, a target, or both".into(),
            ));
        }
        for side in [&self.source, &self.target].into_iter().flatten() {
            if let Endpoint::Remote(remote) = side {
                match remote {
                    RemoteSide::Multi(urls) if urls.is_empty() => {
                        return Err(TransferError::NoTargetUrls)
                    }
                    RemoteSide::Multi(urls) => {
                        for u in urls {
                            validate_uri(u)?;
                        }
                    }
                    RemoteSide::Single(u) => validate_uri(u)?,
                }
            }
        }
        Ok(())
    }

    pub fn is_download(&self) -> bool {
        matches!(self.source, Some(Endpoint::Remote(_))) && matches!(self.target, Some(Endpoint::Local(_)))
    }

    pub fn is_upload(&self) -> bool {
        matches!(self.source, Some(Endpoint::Local(_))) && matches!(self.target, Some(Endpoint::Remote(_)))
    }
}

/// Opaque identifier for a `TransferAsset` within a batch's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(pub usize);

/// Lifecycle state of a `TransferAsset`. Only the Controller mutates this
/// (via `AssetContext`'s methods, which serialize the transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    InProgress,
    Failed,
    Completed,
}

impl AssetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssetState::Failed | AssetState::Completed)
    }
}

/// Runtime state for one `TransferAsset`: the immutable `Asset` config plus
/// the mutable state machine, first-error slot, and part-count tracker.
///
/// Parts reference their asset by `AssetId` rather than holding a back
/// pointer (arena + index, per the spec's cyclic-reference design note);
/// `AssetContext` is the arena entry, shared via `Arc` with every
/// `TransferPart` that belongs to it.
pub struct AssetContext {
    pub id: AssetId,
    pub asset: Asset,
    state: Mutex<AssetState>,
    error: OnceLock<Arc<TransferError>>,
    parts_total: AtomicU64,
    parts_completed: AtomicU64,
    bytes_transferred: AtomicU64,
}

/// Sentinel meaning "not yet known" for `parts_total` (set once by the planner).
const PARTS_TOTAL_UNSET: u64 = u64::MAX;

impl AssetContext {
    pub fn new(id: AssetId, asset: Asset) -> Self {
        AssetContext {
            id,
            asset,
            state: Mutex::new(AssetState::Pending),
            error: OnceLock::new(),
            parts_total: AtomicU64::new(PARTS_TOTAL_UNSET),
            parts_completed: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AssetState {
        *self.state.lock().unwrap()
    }

    pub fn set_parts_total(&self, total: usize) {
        self.parts_total.store(total as u64, Ordering::SeqCst);
    }

    pub fn parts_total(&self) -> Option<usize> {
        let v = self.parts_total.load(Ordering::SeqCst);
        if v == PARTS_TOTAL_UNSET {
            None
        } else {
            Some(v as usize)
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::SeqCst)
    }

    /// Attempts the PENDING -> IN_PROGRESS transition. Returns `true` only for
    /// the caller that actually performed it (the first part to dispatch).
    pub fn try_start(&self) -> bool {
        let mut s = self.state.lock().unwrap();
        if *s == AssetState::Pending {
            *s = AssetState::InProgress;
            true
        } else {
            false
        }
    }

    /// Records a completed part's bytes; transitions to COMPLETED once
    /// `parts_completed == parts_total`. Returns the new cumulative
    /// `bytes_transferred` and whether this call completed the asset.
    pub fn record_part_complete(&self, bytes: u64) -> (u64, bool) {
        let total_bytes = self.bytes_transferred.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let completed = self.parts_completed.fetch_add(1, Ordering::SeqCst) + 1;
        let mut became_complete = false;
        if let Some(total) = self.parts_total() {
            if completed as usize == total {
                let mut s = self.state.lock().unwrap();
                if !s.is_terminal() {
                    *s = AssetState::Completed;
                    became_complete = true;
                }
            }
        }
        (total_bytes, became_complete)
    }

    /// Records an error via compare-and-set into the first-error slot;
    /// returns `true` only when this call recorded the *first* error for the
    /// asset (callers use this to decide whether to transition to FAILED and
    /// emit FILE_ERROR).
    pub fn record_error(&self, err: Arc<TransferError>) -> bool {
        let is_first = self.error.set(err).is_ok();
        if is_first {
            let mut s = self.state.lock().unwrap();
            if !s.is_terminal() {
                *s = AssetState::Failed;
            }
        }
        is_first
    }

    pub fn first_error(&self) -> Option<&Arc<TransferError>> {
        self.error.get()
    }

    pub fn has_failed(&self) -> bool {
        self.error.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_asset() -> Asset {
        Asset {
            source: Some(Endpoint::Remote(RemoteSide::Single("http://x/f".into()))),
            target: Some(Endpoint::Local("/tmp/f".into())),
            headers: HashMap::new(),
            multipart_headers: HashMap::new(),
            accept_ranges: None,
            declared_size: Some(10),
            content_type: None,
            preferred_part_size: None,
            min_part_size: None,
            max_part_size: None,
            method: UploadMethod::Put,
            mkdirs: false,
        }
    }

    #[test]
    fn validate_requires_source_or_target() {
        let mut a = plain_asset();
        a.source = None;
        a.target = None;
        assert!(a.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_multipart_list() {
        let mut a = plain_asset();
        a.target = Some(Endpoint::Remote(RemoteSide::Multi(vec![])));
        assert!(matches!(a.validate(), Err(TransferError::NoTargetUrls)));
    }

    #[test]
    fn try_start_only_succeeds_once() {
        let ctx = AssetContext::new(AssetId(0), plain_asset());
        assert!(ctx.try_start());
        assert!(!ctx.try_start());
        assert_eq!(ctx.state(), AssetState::InProgress);
    }

    #[test]
    fn first_error_sticks() {
        let ctx = AssetContext::new(AssetId(0), plain_asset());
        assert!(ctx.record_error(Arc::new(TransferError::Truncated {
            expected: 10,
            received: 5
        })));
        assert!(!ctx.record_error(Arc::new(TransferError::MissingContentLength)));
        assert!(matches!(
            ctx.first_error().map(|e| e.as_ref()),
            Some(TransferError::Truncated { .. })
        ));
        assert_eq!(ctx.state(), AssetState::Failed);
    }

    #[test]
    fn completes_when_all_parts_done() {
        let ctx = AssetContext::new(AssetId(0), plain_asset());
        ctx.set_parts_total(2);
        let (total, done) = ctx.record_part_complete(4);
        assert_eq!(total, 4);
        assert!(!done);
        let (total, done) = ctx.record_part_complete(6);
        assert_eq!(total, 10);
        assert!(done);
        assert_eq!(ctx.state(), AssetState::Completed);
    }
}

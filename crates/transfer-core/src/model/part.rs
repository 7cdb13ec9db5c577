//! Part and TransferPart: a single contiguous byte range of an asset, and
//! the runtime unit dispatched to the Concurrent Mapper.

use std::path::PathBuf;
use std::sync::Arc;

use super::asset::AssetContext;
use super::range::Range;

/// Which way bytes flow for this part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// One planned slice of an asset: a byte range against one remote URI, paired
/// with the local file it reads from or writes to.
///
/// Holds an `Arc<AssetContext>` rather than an `AssetId` lookup so a part can
/// report progress/completion/error without re-entering a shared arena lock;
/// the memory-pool block backing the in-flight transfer is deliberately not
/// stored here (its lifetime is scoped to the `transfer_op` call, not the
/// part's), keeping this struct a plain, cheaply cloned descriptor.
#[derive(Clone)]
pub struct TransferPart {
    pub index: usize,
    pub asset: Arc<AssetContext>,
    pub range: Range,
    pub remote_uri: String,
    pub direction: Direction,
    pub local_path: Arc<PathBuf>,
    pub headers: Arc<Vec<(String, String)>>,
    /// False only for a single whole-file part against a source/target that
    /// does not support range requests (§4.1); the Transfer Operation omits
    /// the `Range:`/`Content-Range` machinery entirely in that case.
    pub use_range_header: bool,
}

impl TransferPart {
    pub fn len(&self) -> u64 {
        self.range.len()
    }
}

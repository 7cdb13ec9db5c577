//! Part Joiner: folds completed (or failed) parts back into per-asset
//! progress counters. Produces the fold outcome; the Controller turns that
//! into the public event stream.

use std::sync::Arc;

use crate::error::TransferError;
use crate::model::AssetContext;

/// What happened to the asset as a result of folding one part's outcome in.
pub enum JoinOutcome {
    /// The part succeeded; carries the asset's new cumulative bytes.
    Progress { asset: Arc<AssetContext>, bytes_transferred: u64 },
    /// The part succeeded and was the asset's last outstanding part. Still
    /// carries the final cumulative bytes: §4.7's FILE_PROGRESS emit is
    /// unconditional on every completed part, FILE_END is additional on top
    /// of it, not instead of it.
    AssetCompleted { asset: Arc<AssetContext>, bytes_transferred: u64 },
    /// The part failed and this was the first failure recorded for the asset.
    AssetFailed {
        asset: Arc<AssetContext>,
        error: Arc<TransferError>,
    },
    /// The part failed, but the asset had already failed from an earlier
    /// part; nothing new to report (suppressed per §7's propagation rule).
    AlreadyFailed,
}

/// Folds one part's success into `asset`'s counters (§4.7).
pub fn fold_success(asset: &Arc<AssetContext>, bytes: u64) -> JoinOutcome {
    let (total, completed) = asset.record_part_complete(bytes);
    if completed {
        JoinOutcome::AssetCompleted {
            asset: Arc::clone(asset),
            bytes_transferred: total,
        }
    } else {
        JoinOutcome::Progress {
            asset: Arc::clone(asset),
            bytes_transferred: total,
        }
    }
}

/// Folds one part's failure into `asset`'s error slot.
pub fn fold_failure(asset: &Arc<AssetContext>, error: TransferError) -> JoinOutcome {
    let error = Arc::new(error);
    let is_first = asset.record_error(Arc::clone(&error));
    if is_first {
        JoinOutcome::AssetFailed {
            asset: Arc::clone(asset),
            error,
        }
    } else {
        JoinOutcome::AlreadyFailed
    }
}

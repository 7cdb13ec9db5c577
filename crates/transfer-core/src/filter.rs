//! Failed-Asset Filter: sits between the Part Planner and the Concurrent
//! Mapper. A part whose asset has already recorded an error is dropped
//! without emitting anything for it.

use crate::model::TransferPart;

/// True if `part` should be dropped because its asset already failed.
pub fn should_drop(part: &TransferPart) -> bool {
    part.asset.has_failed()
}

//! Memory-Pool Allocator: lends non-overlapping byte-range slices of a
//! preallocated backing region, first-fit over a sorted occupancy list, FIFO
//! waiters on exhaustion.
//!
//! The teacher has no direct counterpart to this component (its downloader
//! writes straight from curl's callback into the storage writer); this is
//! built fresh in the teacher's idiom: a `Mutex`-guarded shared state struct
//! plus a `Condvar` for blocking waiters, mirroring the `Mutex<VecDeque<_>>`
//! work-queue pattern in `downloader/run.rs::run_concurrent`.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::TransferError;

/// Default capacity request, on the order of 10^8 bytes (100 MiB) per §4.2.
pub const DEFAULT_POOL_CAPACITY: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Allocation {
    start: u64,
    size: u64,
}

impl Allocation {
    fn end(&self) -> u64 {
        self.start + self.size
    }
}

struct PoolState {
    capacity: u64,
    allocations: Vec<Allocation>,
    /// Monotonically increasing ticket counter; the lowest-numbered waiting
    /// ticket is served first (FIFO), independent of `Condvar` wakeup order.
    next_ticket: u64,
    next_to_serve: u64,
}

impl PoolState {
    /// First-fit search over the sorted `allocations` list: the gap before
    /// the first block, between two adjacent blocks, or after the last
    /// block before `capacity`.
    fn find_fit(&self, size: u64) -> Option<u64> {
        let mut cursor = 0u64;
        for alloc in &self.allocations {
            if alloc.start - cursor >= size {
                return Some(cursor);
            }
            cursor = alloc.end();
        }
        if self.capacity - cursor >= size {
            Some(cursor)
        } else {
            None
        }
    }

    fn insert(&mut self, start: u64, size: u64) {
        let pos = self
            .allocations
            .binary_search_by_key(&start, |a| a.start)
            .unwrap_or_else(|p| p);
        self.allocations.insert(pos, Allocation { start, size });
    }

    fn remove(&mut self, start: u64) {
        if let Ok(pos) = self.allocations.binary_search_by_key(&start, |a| a.start) {
            self.allocations.remove(pos);
        }
    }
}

/// A lent sub-region of the pool's backing buffer. Exclusively owned by the
/// part that obtained it until `release`d back to the pool.
pub struct MemoryBlock {
    pool: Arc<MemoryPoolInner>,
    start: u64,
    size: u64,
    data: Vec<u8>,
    released: bool,
}

impl MemoryBlock {
    /// The block's offset into the pool's backing region. Per §4.2, a
    /// released block reads as `-1` rather than `0`, which would otherwise
    /// be indistinguishable from a live block allocated at the start of the
    /// region; `i64` can represent the sentinel, unlike the `u64` used for
    /// live offsets (which never approach `i64::MAX` in practice).
    pub fn start_index(&self) -> i64 {
        if self.released {
            -1
        } else {
            self.start as i64
        }
    }

    pub fn size(&self) -> u64 {
        if self.released {
            0
        } else {
            self.size
        }
    }

    pub fn view(&self) -> &[u8] {
        if self.released {
            &[]
        } else {
            &self.data
        }
    }

    pub fn view_mut(&mut self) -> &mut [u8] {
        if self.released {
            &mut []
        } else {
            &mut self.data
        }
    }

    /// Releases this block back to the pool. Idempotent: a second call is a
    /// no-op, matching §4.2's double-release invariant.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pool.release(self.start, self.size);
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        self.release();
    }
}

struct MemoryPoolInner {
    state: Mutex<PoolState>,
    released: Condvar,
}

impl MemoryPoolInner {
    fn release(&self, start: u64, size: u64) {
        if size == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.remove(start);
        self.released.notify_all();
    }
}

/// Owns a single fixed-capacity backing region, tracking allocations as a
/// sorted, non-overlapping list.
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<MemoryPoolInner>,
}

impl MemoryPool {
    pub fn new(capacity: u64) -> Self {
        MemoryPool {
            inner: Arc::new(MemoryPoolInner {
                state: Mutex::new(PoolState {
                    capacity,
                    allocations: Vec::new(),
                    next_ticket: 0,
                    next_to_serve: 0,
                }),
                released: Condvar::new(),
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.inner.state.lock().unwrap().capacity
    }

    pub fn available(&self) -> u64 {
        let state = self.inner.state.lock().unwrap();
        let used: u64 = state.allocations.iter().map(|a| a.size).sum();
        state.capacity - used
    }

    /// Non-blocking attempt: returns `None` if no slot currently fits rather
    /// than waiting.
    pub fn try_obtain(&self, size: u64) -> Result<Option<MemoryBlock>, TransferError> {
        let mut state = self.inner.state.lock().unwrap();
        if size > state.capacity {
            return Err(TransferError::OutOfMemoryPool {
                requested: size,
                capacity: state.capacity,
            });
        }
        if size == 0 {
            return Ok(Some(MemoryBlock {
                pool: Arc::clone(&self.inner),
                start: 0,
                size: 0,
                data: Vec::new(),
                released: false,
            }));
        }
        match state.find_fit(size) {
            Some(start) => {
                state.insert(start, size);
                Ok(Some(MemoryBlock {
                    pool: Arc::clone(&self.inner),
                    start,
                    size,
                    data: vec![0u8; size as usize],
                    released: false,
                }))
            }
            None => Ok(None),
        }
    }

    /// Blocking obtain: waits (FIFO among waiters) until a slot large enough
    /// to hold `size` bytes becomes free or the pool's capacity cannot ever
    /// satisfy the request.
    pub fn obtain(&self, size: u64) -> Result<MemoryBlock, TransferError> {
        let mut state = self.inner.state.lock().unwrap();
        if size > state.capacity {
            return Err(TransferError::OutOfMemoryPool {
                requested: size,
                capacity: state.capacity,
            });
        }
        if size == 0 {
            return Ok(MemoryBlock {
                pool: Arc::clone(&self.inner),
                start: 0,
                size: 0,
                data: Vec::new(),
                released: false,
            });
        }
        let my_ticket = state.next_ticket;
        state.next_ticket += 1;
        loop {
            if state.next_to_serve == my_ticket {
                if let Some(start) = state.find_fit(size) {
                    state.insert(start, size);
                    state.next_to_serve += 1;
                    self.inner.released.notify_all();
                    return Ok(MemoryBlock {
                        pool: Arc::clone(&self.inner),
                        start,
                        size,
                        data: vec![0u8; size as usize],
                        released: false,
                    });
                }
            }
            state = self.inner.released.wait(state).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obtain_and_release_roundtrip() {
        let pool = MemoryPool::new(100);
        let mut block = pool.obtain(40).unwrap();
        assert_eq!(block.start_index(), 0);
        assert_eq!(pool.available(), 60);
        block.release();
        assert_eq!(pool.available(), 100);
        assert_eq!(block.start_index(), -1);
        assert_eq!(block.size(), 0);
        assert!(block.view().is_empty());
    }

    #[test]
    fn double_release_is_noop() {
        let pool = MemoryPool::new(100);
        let mut block = pool.obtain(10).unwrap();
        block.release();
        block.release();
        assert_eq!(pool.available(), 100);
    }

    #[test]
    fn first_fit_reuses_holes() {
        let pool = MemoryPool::new(30);
        let mut a = pool.obtain(10).unwrap();
        let b = pool.obtain(10).unwrap();
        let _c = pool.obtain(10).unwrap();
        a.release();
        // Pool is full again except the hole a left at [0,10).
        let d = pool.try_obtain(10).unwrap().expect("should reuse the hole");
        assert_eq!(d.start_index(), 0);
        drop(b);
    }

    #[test]
    fn oversized_request_is_out_of_memory() {
        let pool = MemoryPool::new(10);
        let err = pool.obtain(11).unwrap_err();
        assert!(matches!(err, TransferError::OutOfMemoryPool { .. }));
    }

    #[test]
    fn no_two_blocks_overlap_under_contention() {
        let pool = MemoryPool::new(20);
        let a = pool.obtain(10).unwrap();
        let b = pool.obtain(10).unwrap();
        let a_start = a.start_index();
        let b_start = b.start_index();
        assert!(a_start + a.size() as i64 <= b_start || b_start + b.size() as i64 <= a_start);
    }
}

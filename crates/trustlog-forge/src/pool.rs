//! Bounded pre-generation pools.

use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use serde::{Deserialize, Serialize};

/// Seconds of run time per extra unit of generation cap.
const CAP_RAMP_SECS: u64 = 8;

/// Base generation cap once the warm-up has passed.
const CAP_BASE: usize = 2;

/// A lock-free bounded queue of ready-made items.
///
/// The queue's capacity is the pool's target fill level, so a push can
/// never grow it beyond the target no matter how many producers race.
pub struct Pool<T> {
    queue: Option<ArrayQueue<T>>,
    target: usize,
}

impl<T> Pool<T> {
    pub fn new(target: usize) -> Self {
        Self {
            queue: (target > 0).then(|| ArrayQueue::new(target)),
            target,
        }
    }

    /// Take ownership of one item, if any is ready.
    pub fn pop(&self) -> Option<T> {
        self.queue.as_ref().and_then(ArrayQueue::pop)
    }

    /// Offer an item. Returns `false` (dropping the item) if the pool is full.
    pub fn push(&self, item: T) -> bool {
        match &self.queue {
            Some(queue) => queue.push(item).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// The fill limit for this pool under a generation cap.
    pub fn limit(&self, cap: usize) -> usize {
        self.target.min(cap)
    }
}

/// Generation cap for a refill cycle, given time since the loop started.
///
/// Zero until the warm-up has passed, then two plus one per eight seconds
/// beyond it.
pub fn generation_cap(elapsed: Duration, warmup: Duration) -> usize {
    match elapsed.checked_sub(warmup) {
        Some(past) if !past.is_zero() => {
            CAP_BASE.saturating_add((past.as_secs() / CAP_RAMP_SECS) as usize)
        }
        _ => 0,
    }
}

/// A count per pool. Used both for fill targets and for size snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSizes {
    pub sign64: usize,
    pub sign128: usize,
    pub sign256: usize,
    pub encrypt128: usize,
    pub encrypt256: usize,
    pub aes128: usize,
    pub aes256: usize,
    pub salt: usize,
}

impl PoolSizes {
    pub fn total(&self) -> usize {
        self.sign64
            + self.sign128
            + self.sign256
            + self.encrypt128
            + self.encrypt256
            + self.aes128
            + self.aes256
            + self.salt
    }

    /// True if every count is at or below the matching count in `limit`.
    pub fn within(&self, limit: &PoolSizes) -> bool {
        self.sign64 <= limit.sign64
            && self.sign128 <= limit.sign128
            && self.sign256 <= limit.sign256
            && self.encrypt128 <= limit.encrypt128
            && self.encrypt256 <= limit.encrypt256
            && self.aes128 <= limit.aes128
            && self.aes256 <= limit.aes256
            && self.salt <= limit.salt
    }
}

//! Scheduled callback records and their pacing statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Identifier for a work item held in the [`WorkMgr`](crate::WorkMgr)
/// registry.
///
/// Ids are minted monotonically starting at 1001 and never re-issued within a
/// process run. [`WorkHandle::NONE`] (0) means "no work item".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkHandle(u32);

impl WorkHandle {
    pub const NONE: WorkHandle = WorkHandle(0);
    pub(crate) const FIRST_ID: u32 = 1001;

    pub(crate) fn from_raw(raw: u32) -> Self {
        WorkHandle(raw)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked by the dispatcher when a work item comes due.
pub type WorkCallback = Box<dyn Fn(WorkHandle) + Send + Sync>;

/// Inter-fire spacing observed by the dispatcher for one work item.
///
/// The counters describe the gap between successive dispatches (or from
/// enqueue to first dispatch), not callback runtime. `last` and `min` hold
/// [`PacingStats::SENTINEL`] until the first fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingStats {
    pub last: u64,
    pub min: u64,
    pub max: u64,
    pub total: u64,
    pub count: u64,
}

impl PacingStats {
    pub const SENTINEL: u64 = u64::MAX;

    fn new() -> Self {
        PacingStats {
            last: Self::SENTINEL,
            min: Self::SENTINEL,
            max: 0,
            total: 0,
            count: 0,
        }
    }

    fn update(&mut self, queue_time: u64, now: u64) {
        let since = if self.last == Self::SENTINEL {
            queue_time
        } else {
            self.last
        };
        let observed = now.saturating_sub(since);
        if observed < self.min {
            self.min = observed;
        }
        if observed > self.max {
            self.max = observed;
        }
        self.total += observed;
        self.count += 1;
        self.last = now;
    }

    /// Mean observed spacing, once at least one fire has been recorded.
    pub fn avg(&self) -> Option<u64> {
        (self.count != 0).then(|| self.total / self.count)
    }
}

/// A scheduled callback record.
///
/// Storage is owned by the [`WorkMgr`](crate::WorkMgr) map; the dispatcher
/// queue holds scheduling references to the same item. Statistics are only
/// touched by the dispatcher thread, `queue_time` only under the queue lock,
/// so the interior mutability here never contends in practice.
pub(crate) struct WorkItem {
    handle: WorkHandle,
    callback: WorkCallback,
    delay_us: AtomicU64,
    queue_time: AtomicU64,
    stats: Mutex<PacingStats>,
}

impl WorkItem {
    pub(crate) fn new(handle: WorkHandle, delay_us: u64, callback: WorkCallback) -> Self {
        WorkItem {
            handle,
            callback,
            delay_us: AtomicU64::new(delay_us),
            queue_time: AtomicU64::new(0),
            stats: Mutex::new(PacingStats::new()),
        }
    }

    fn lock_stats(&self) -> MutexGuard<'_, PacingStats> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn handle(&self) -> WorkHandle {
        self.handle
    }

    pub(crate) fn delay_us(&self) -> u64 {
        self.delay_us.load(Ordering::Relaxed)
    }

    pub(crate) fn set_delay_us(&self, delay_us: u64) {
        self.delay_us.store(delay_us, Ordering::Relaxed);
    }

    pub(crate) fn queue_time(&self) -> u64 {
        self.queue_time.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_queued(&self, now: u64) {
        self.queue_time.store(now, Ordering::Relaxed);
    }

    pub(crate) fn update_stats(&self, now: u64) {
        let queue_time = self.queue_time();
        self.lock_stats().update(queue_time, now);
    }

    pub(crate) fn reset_stats(&self) {
        *self.lock_stats() = PacingStats::new();
    }

    pub(crate) fn snapshot_stats(&self) -> PacingStats {
        *self.lock_stats()
    }

    pub(crate) fn run(&self) {
        (self.callback)(self.handle);
    }

    pub(crate) fn log_stats(&self) {
        let stats = self.snapshot_stats();
        if let Some(avg) = stats.avg() {
            tracing::debug!(
                handle = %self.handle,
                count = stats.count,
                avg_us = avg,
                min_us = stats.min,
                max_us = stats.max,
                "work item pacing"
            );
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("handle", &self.handle)
            .field("delay_us", &self.delay_us())
            .field("queue_time", &self.queue_time())
            .finish_non_exhaustive()
    }
}

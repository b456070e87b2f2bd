//! Work handle registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::queue::HrtWorkQueue;
use crate::work_item::{PacingStats, WorkCallback, WorkHandle, WorkItem};

/// Owns work item storage and mediates create/schedule/destroy against the
/// dispatcher queue.
///
/// Handles are opaque to callers; id 0 is reserved as [`WorkHandle::NONE`]
/// and real ids are never re-issued within a run.
pub struct WorkMgr {
    queue: Arc<HrtWorkQueue>,
    items: Mutex<HashMap<WorkHandle, Arc<WorkItem>>>,
    next_id: AtomicU32,
}

impl WorkMgr {
    pub fn new(queue: Arc<HrtWorkQueue>) -> Self {
        WorkMgr {
            queue,
            items: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(WorkHandle::FIRST_ID),
        }
    }

    fn lock_items(&self) -> MutexGuard<'_, HashMap<WorkHandle, Arc<WorkItem>>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Allocates a work item and returns its freshly minted handle.
    pub fn create(&self, delay_us: u64, callback: WorkCallback) -> WorkHandle {
        let handle = WorkHandle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let item = Arc::new(WorkItem::new(handle, delay_us, callback));
        self.lock_items().insert(handle, item);
        handle
    }

    /// Destroys the item and overwrites the caller's handle with
    /// [`WorkHandle::NONE`].
    ///
    /// The item is de-queued from the dispatcher first, so a pending schedule
    /// can never fire a destroyed item. Idempotent for unknown or `NONE`
    /// handles. Destroy must not race a concurrent [`WorkMgr::schedule`] of
    /// the same handle; callers stop the producer first.
    pub fn destroy(&self, handle: &mut WorkHandle) {
        let taken = std::mem::replace(handle, WorkHandle::NONE);
        if taken.is_none() {
            return;
        }
        self.queue.remove_item(taken);
        self.lock_items().remove(&taken);
    }

    /// Hands the item to the dispatcher. False if the handle is unknown.
    pub fn schedule(&self, handle: WorkHandle) -> bool {
        let item = self.lock_items().get(&handle).cloned();
        match item {
            Some(item) => {
                self.queue.schedule_item(item);
                true
            }
            None => false,
        }
    }

    /// Retargets the delay used for subsequent scheduling of `handle`.
    ///
    /// An entry already sitting in the dispatcher keeps its current timing.
    pub fn set_delay(&self, handle: WorkHandle, delay_us: u64) -> bool {
        match self.lock_items().get(&handle) {
            Some(item) => {
                item.set_delay_us(delay_us);
                true
            }
            None => false,
        }
    }

    /// Pacing snapshot for a live item.
    pub fn stats(&self, handle: WorkHandle) -> Option<PacingStats> {
        self.lock_items().get(&handle).map(|item| item.snapshot_stats())
    }

    /// Clears the pacing counters of a live item.
    pub fn reset_stats(&self, handle: WorkHandle) -> bool {
        match self.lock_items().get(&handle) {
            Some(item) => {
                item.reset_stats();
                true
            }
            None => false,
        }
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every stored item (shutdown path). The dispatcher queue is
    /// cleared separately.
    pub fn clear(&self) {
        self.lock_items().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mgr() -> (Arc<HrtWorkQueue>, WorkMgr) {
        let queue = HrtWorkQueue::start().expect("dispatcher start");
        let work_mgr = WorkMgr::new(Arc::clone(&queue));
        (queue, work_mgr)
    }

    #[test]
    fn handles_are_distinct_and_start_above_reserved_range() {
        let (queue, work_mgr) = mgr();
        let a = work_mgr.create(1_000, Box::new(|_| {}));
        let b = work_mgr.create(1_000, Box::new(|_| {}));
        let c = work_mgr.create(1_000, Box::new(|_| {}));
        assert!(a.raw() >= 1001);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert!(!a.is_none());
        queue.shutdown();
        queue.join();
    }

    #[test]
    fn destroy_zeroes_the_handle_and_is_idempotent() {
        let (queue, work_mgr) = mgr();
        let mut handle = work_mgr.create(1_000, Box::new(|_| {}));
        assert_eq!(work_mgr.len(), 1);

        work_mgr.destroy(&mut handle);
        assert_eq!(handle, WorkHandle::NONE);
        assert!(work_mgr.is_empty());

        // Destroying the zeroed handle again is a no-op.
        work_mgr.destroy(&mut handle);
        assert_eq!(handle, WorkHandle::NONE);
        queue.shutdown();
        queue.join();
    }

    #[test]
    fn schedule_of_unknown_handle_reports_false() {
        let (queue, work_mgr) = mgr();
        assert!(!work_mgr.schedule(WorkHandle::NONE));
        let mut handle = work_mgr.create(1_000, Box::new(|_| {}));
        let stale = handle;
        work_mgr.destroy(&mut handle);
        assert!(!work_mgr.schedule(stale));
        queue.shutdown();
        queue.join();
    }

    #[test]
    fn stats_and_delay_follow_item_lifetime() {
        let (queue, work_mgr) = mgr();
        let mut handle = work_mgr.create(5_000, Box::new(|_| {}));
        assert!(work_mgr.stats(handle).is_some());
        assert!(work_mgr.set_delay(handle, 7_500));
        assert!(work_mgr.reset_stats(handle));

        work_mgr.destroy(&mut handle);
        assert_eq!(work_mgr.stats(WorkHandle::NONE), None);
        assert!(!work_mgr.set_delay(WorkHandle::NONE, 1));
        assert!(!work_mgr.reset_stats(WorkHandle::NONE));
        queue.shutdown();
        queue.join();
    }
}

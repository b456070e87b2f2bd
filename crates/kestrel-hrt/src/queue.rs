//! Single-thread timer dispatcher.
//!
//! One high-priority OS thread multiplexes every periodic callback in the
//! process. Each wakeup scans the whole pending list and picks the soonest
//! deadline; the scan is O(n) per fire, but n is tens of drivers and a plain
//! list never rebalances when a periodic item reinserts itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::clock::{now_us, Deadline};
use crate::error::HrtResult;
use crate::rt::promote_to_realtime;
use crate::work_item::{WorkHandle, WorkItem};

/// Upper bound on dispatcher sleep when nothing is scheduled.
const IDLE_SLEEP_US: u64 = 10_000_000;

/// Fires between pacing-summary log lines when stats are enabled.
const STATS_LOG_PERIOD: u64 = 100;

struct QueueState {
    items: VecDeque<Arc<WorkItem>>,
    exit_requested: bool,
}

/// The timer-driven work queue.
///
/// Created once by the framework via [`HrtWorkQueue::start`], which spawns
/// the dispatcher thread. Items are owned by the work registry; the queue
/// only holds scheduling references. Callbacks always run with the queue lock
/// released, so a callback may re-schedule itself (or any other item) through
/// the normal entry points.
pub struct HrtWorkQueue {
    state: Mutex<QueueState>,
    reschedule: Condvar,
    stats_enabled: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HrtWorkQueue {
    /// Spawns the dispatcher thread and returns the shared queue.
    pub fn start() -> HrtResult<Arc<Self>> {
        let queue = Arc::new(HrtWorkQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                exit_requested: false,
            }),
            reschedule: Condvar::new(),
            stats_enabled: AtomicBool::new(false),
            thread: Mutex::new(None),
        });

        let runner = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name("kestrel-hrt".into())
            .spawn(move || {
                promote_to_realtime();
                runner.process();
            })?;
        *lock_or_recover(&queue.thread) = Some(handle);
        Ok(queue)
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        lock_or_recover(&self.state)
    }

    /// Enqueues an item: stamps its queue time and wakes the dispatcher.
    ///
    /// Scheduling an item that is already queued is a caller error; the queue
    /// does not deduplicate, each entry simply fires independently.
    pub(crate) fn schedule_item(&self, item: Arc<WorkItem>) {
        let mut state = self.lock_state();
        item.mark_queued(now_us());
        state.items.push_back(item);
        self.reschedule.notify_all();
    }

    /// De-queues every pending entry for `handle`.
    pub(crate) fn remove_item(&self, handle: WorkHandle) {
        let mut state = self.lock_state();
        state.items.retain(|item| item.handle() != handle);
    }

    /// Empties the pending list without touching the items themselves.
    pub fn clear_all(&self) {
        self.lock_state().items.clear();
    }

    /// Enables per-item pacing summaries in the debug log.
    pub fn set_stats_enabled(&self, enabled: bool) {
        self.stats_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Requests dispatcher exit and wakes it.
    ///
    /// The thread leaves at the top of its next iteration; items still
    /// pending are not executed. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        state.exit_requested = true;
        self.reschedule.notify_all();
    }

    /// Waits for the dispatcher thread to exit. Call after
    /// [`HrtWorkQueue::shutdown`].
    pub fn join(&self) {
        let handle = lock_or_recover(&self.thread).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("dispatcher thread exited by panic");
            }
        }
    }

    fn process(&self) {
        let mut state = self.lock_state();
        loop {
            if state.exit_requested {
                break;
            }

            let now = now_us();
            let mut next_sleep_us = IDLE_SLEEP_US;
            let mut due = None;
            for (idx, item) in state.items.iter().enumerate() {
                let elapsed = now.saturating_sub(item.queue_time());
                if elapsed >= item.delay_us() {
                    due = Some(idx);
                    break;
                }
                next_sleep_us = next_sleep_us.min(item.delay_us() - elapsed);
            }

            match due.and_then(|idx| state.items.remove(idx)) {
                Some(item) => {
                    item.update_stats(now);
                    if self.stats_enabled.load(Ordering::Relaxed)
                        && item.snapshot_stats().count % STATS_LOG_PERIOD == 0
                    {
                        item.log_stats();
                    }
                    // Run the callback with the queue lock released; it may
                    // re-enter schedule_item. Remaining due items are picked
                    // up by the rescan with a fresh `now`.
                    drop(state);
                    item.run();
                    state = self.lock_state();
                }
                None => {
                    let deadline = Deadline::from_offset_us(now + next_sleep_us);
                    state = match self.reschedule.wait_timeout(state, deadline.remaining()) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                }
            }
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

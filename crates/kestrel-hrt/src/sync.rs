//! Wait/signal primitive pairing one mutex with one condition variable.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::clock::Deadline;

/// A compound mutex + condition variable with generation-counted signals.
///
/// Every [`SyncObj::signal`] bumps a generation counter and wakes all
/// waiters. A waiter that captures the generation, scans its own state, and
/// then calls [`SyncObj::wait_past`] with the captured value can never lose a
/// signal delivered between the scan and the wait. Spurious wakeups are
/// permitted; callers re-check their conditions.
#[derive(Debug, Default)]
pub struct SyncObj {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl SyncObj {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        match self.generation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current signal generation.
    pub fn generation(&self) -> u64 {
        *self.lock()
    }

    /// Wakes every current waiter.
    pub fn signal(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Blocks until the generation moves past `seen` or `deadline` passes.
    ///
    /// `None` waits unbounded. Returns true iff a signal was observed.
    pub fn wait_past(&self, seen: u64, deadline: Option<Deadline>) -> bool {
        let mut generation = self.lock();
        while *generation == seen {
            match deadline {
                None => {
                    generation = match self.cond.wait(generation) {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
                Some(deadline) => {
                    let left = deadline.remaining();
                    if left.is_zero() {
                        return false;
                    }
                    generation = match self.cond.wait_timeout(generation, left) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                }
            }
        }
        true
    }

    /// Blocks until the next signal. `timeout_ms == 0` waits unbounded.
    ///
    /// Returns true iff signaled, false on timeout.
    pub fn wait(&self, timeout_ms: u64) -> bool {
        let seen = self.generation();
        let deadline = (timeout_ms != 0).then(|| Deadline::after_ms(timeout_ms));
        self.wait_past(seen, deadline)
    }
}

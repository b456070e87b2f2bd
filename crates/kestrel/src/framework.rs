//! Framework lifecycle: wiring and teardown of the dispatcher, the work
//! registry and the device registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kestrel_hrt::{HrtError, HrtWorkQueue, SyncObj, WorkMgr};
use thiserror::Error;

use crate::dev_mgr::DevMgr;

/// Initialization failures, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("dispatcher start failed: {0}")]
    Dispatcher(#[source] HrtError),
}

/// Owning handle for one initialized framework instance.
///
/// Brings up the dispatcher thread, the work registry and the device
/// registry, and tears them down again on [`Framework::shutdown`] (or on
/// drop). Independent instances share nothing, so tests and embedders can
/// run several side by side.
pub struct Framework {
    queue: Arc<HrtWorkQueue>,
    work_mgr: Arc<WorkMgr>,
    dev_mgr: Arc<DevMgr>,
    shutdown_started: AtomicBool,
    shutdown_complete: AtomicBool,
    shutdown_cond: SyncObj,
}

impl Framework {
    /// Brings the framework up: dispatcher thread first, then the device and
    /// work registries wired to it.
    pub fn initialize() -> Result<Framework, FrameworkError> {
        let queue = HrtWorkQueue::start().map_err(FrameworkError::Dispatcher)?;
        let work_mgr = Arc::new(WorkMgr::new(Arc::clone(&queue)));
        let dev_mgr = DevMgr::new(Arc::clone(&work_mgr));
        tracing::info!("framework initialized");
        Ok(Framework {
            queue,
            work_mgr,
            dev_mgr,
            shutdown_started: AtomicBool::new(false),
            shutdown_complete: AtomicBool::new(false),
            shutdown_cond: SyncObj::new(),
        })
    }

    pub fn dev_mgr(&self) -> &Arc<DevMgr> {
        &self.dev_mgr
    }

    pub fn work_mgr(&self) -> &Arc<WorkMgr> {
        &self.work_mgr
    }

    pub fn work_queue(&self) -> &Arc<HrtWorkQueue> {
        &self.queue
    }

    /// Tears the framework down; best-effort, idempotent, never fails.
    ///
    /// Order: stop the dispatcher, join its thread, then drain the work and
    /// device registries, then signal shutdown completion.
    pub fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();
        self.queue.join();
        self.queue.clear_all();
        self.work_mgr.clear();
        self.dev_mgr.clear();
        tracing::info!("framework shut down");
        self.shutdown_complete.store(true, Ordering::SeqCst);
        self.shutdown_cond.signal();
    }

    /// Blocks until [`Framework::shutdown`] has completed (possibly on
    /// another thread).
    pub fn wait_for_shutdown(&self) {
        loop {
            let seen = self.shutdown_cond.generation();
            if self.shutdown_complete.load(Ordering::SeqCst) {
                return;
            }
            self.shutdown_cond.wait_past(seen, None);
        }
    }
}

impl Drop for Framework {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Opened device references and their update-observer slots.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use kestrel_hrt::SyncObj;

use crate::dev_obj::DevObj;
use crate::error::{DeviceError, DeviceResult};

/// Per-handle observer record kept on the device's observer list.
///
/// `notify` and `subscribe` serialize on the waiter mutex, so an update
/// posted before a subscription is discarded and one posted after it is
/// always either flagged before the waiter's scan or signalled to it.
#[derive(Default)]
pub(crate) struct ObserverSlot {
    updated: AtomicBool,
    waiter: Mutex<Option<Arc<SyncObj>>>,
}

impl ObserverSlot {
    fn lock_waiter(&self) -> MutexGuard<'_, Option<Arc<SyncObj>>> {
        match self.waiter.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Marks the slot updated and wakes a parked waiter, if any.
    pub(crate) fn notify(&self) {
        let waiter = self.lock_waiter();
        self.updated.store(true, Ordering::Release);
        if let Some(waiter) = waiter.as_ref() {
            waiter.signal();
        }
    }

    /// Parks `waiter` on this slot, discarding any earlier update.
    pub(crate) fn subscribe(&self, waiter: Arc<SyncObj>) {
        let mut guard = self.lock_waiter();
        self.updated.store(false, Ordering::Release);
        *guard = Some(waiter);
    }

    pub(crate) fn unsubscribe(&self) {
        *self.lock_waiter() = None;
    }

    pub(crate) fn updated(&self) -> bool {
        self.updated.load(Ordering::Acquire)
    }
}

/// An opened reference to a registered device.
///
/// Produced by [`DevMgr::get_handle`](crate::DevMgr::get_handle). Handles are
/// single-owner (not clonable); the device keeps one observer slot per open
/// handle, which is what [`DevMgr::wait_for_update`](crate::DevMgr::wait_for_update)
/// parks on. Dropping the handle releases it.
pub struct DevHandle {
    obj: Option<Arc<DevObj>>,
    slot: Arc<ObserverSlot>,
}

impl DevHandle {
    pub(crate) fn open(obj: Arc<DevObj>) -> DevHandle {
        let slot = Arc::new(ObserverSlot::default());
        obj.add_observer(Arc::clone(&slot));
        DevHandle {
            obj: Some(obj),
            slot,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.obj.is_some()
    }

    /// The device this handle refers to, while the handle is valid.
    pub fn device(&self) -> Option<&Arc<DevObj>> {
        self.obj.as_ref()
    }

    pub(crate) fn obj(&self) -> DeviceResult<&Arc<DevObj>> {
        self.obj.as_ref().ok_or(DeviceError::InvalidHandle)
    }

    pub(crate) fn slot(&self) -> &Arc<ObserverSlot> {
        &self.slot
    }

    /// Issues a control request on the underlying device.
    pub fn ioctl(&self, cmd: u32, arg: &mut dyn Any) -> DeviceResult<i32> {
        self.obj()?.dev_ioctl(cmd, arg)
    }

    pub fn read(&self, buf: &mut [u8]) -> DeviceResult<usize> {
        self.obj()?.dev_read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> DeviceResult<usize> {
        self.obj()?.dev_write(buf)
    }

    /// Detaches from the device; later operations return
    /// [`DeviceError::InvalidHandle`]. Idempotent.
    pub(crate) fn release(&mut self) {
        if let Some(obj) = self.obj.take() {
            obj.remove_observer(&self.slot);
        }
    }
}

impl Drop for DevHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DevHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevHandle")
            .field("device", &self.obj.as_ref().map(|obj| obj.name().to_string()))
            .field("valid", &self.is_valid())
            .finish()
    }
}

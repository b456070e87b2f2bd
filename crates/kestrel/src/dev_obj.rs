//! Periodic driver instances.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use kestrel_hrt::{WorkHandle, WorkMgr};

use crate::device_id::DeviceId;
use crate::driver::Driver;
use crate::error::{DeviceError, DeviceResult};
use crate::handle::ObserverSlot;

#[derive(Default)]
struct Registration {
    instance: Option<usize>,
    instance_path: Option<String>,
    work_mgr: Weak<WorkMgr>,
}

/// A driver instance managed by the framework.
///
/// Wraps a [`Driver`] body with the bookkeeping the framework needs: name
/// and device-path identity, packed [`DeviceId`], sample interval, the work
/// handle of its periodic measure job, and the observer slots of currently
/// open handles.
///
/// Lifecycle: constructed → registered (instance and instance path assigned)
/// → started (periodic measurement running) → stopped → unregistered.
pub struct DevObj {
    name: String,
    base_path: String,
    id: DeviceId,
    sample_interval_us: AtomicU64,
    driver: Mutex<Box<dyn Driver>>,
    registration: Mutex<Registration>,
    work_handle: Mutex<WorkHandle>,
    observers: Mutex<Vec<Arc<ObserverSlot>>>,
}

impl DevObj {
    /// Wraps `driver` for registration. `base_path` is the device path stem,
    /// e.g. `/dev/imu`; the per-instance suffix is assigned at registration.
    pub fn new(
        driver: Box<dyn Driver>,
        name: impl Into<String>,
        base_path: impl Into<String>,
        id: DeviceId,
        sample_interval_us: u64,
    ) -> Arc<DevObj> {
        Arc::new(DevObj {
            name: name.into(),
            base_path: base_path.into(),
            id,
            sample_interval_us: AtomicU64::new(sample_interval_us),
            driver: Mutex::new(driver),
            registration: Mutex::new(Registration::default()),
            work_handle: Mutex::new(WorkHandle::NONE),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn sample_interval(&self) -> u64 {
        self.sample_interval_us.load(Ordering::Relaxed)
    }

    /// Retargets the sample interval. Takes effect when the measure job next
    /// reschedules itself; an already-queued fire keeps its timing.
    pub fn set_sample_interval(&self, interval_us: u64) {
        self.sample_interval_us.store(interval_us, Ordering::Relaxed);
    }

    /// Instance slot assigned at registration; `None` while unregistered.
    pub fn instance(&self) -> Option<usize> {
        self.lock_registration().instance
    }

    /// Full device path (`"<base>/<instance>"`) while registered.
    pub fn instance_path(&self) -> Option<String> {
        self.lock_registration().instance_path.clone()
    }

    pub fn is_registered(&self) -> bool {
        self.instance().is_some()
    }

    /// Whether the periodic measure job currently exists.
    pub fn is_started(&self) -> bool {
        !self.lock_work_handle().is_none()
    }

    /// Begins periodic measurement at the configured sample interval.
    ///
    /// Requires prior registration. A no-op when already started.
    pub fn start(self: &Arc<Self>) -> DeviceResult<()> {
        let work_mgr = {
            let registration = self.lock_registration();
            if registration.instance.is_none() {
                return Err(DeviceError::NotRegistered);
            }
            registration
                .work_mgr
                .upgrade()
                .ok_or(DeviceError::NotInitialized)?
        };

        let mut work_handle = self.lock_work_handle();
        if !work_handle.is_none() {
            return Ok(());
        }

        // Weak on both captures: the work registry owns this callback, so a
        // strong reference back to it (or to the device) would be a cycle.
        let dev = Arc::downgrade(self);
        let rescheduler = Arc::downgrade(&work_mgr);
        let handle = work_mgr.create(
            self.sample_interval(),
            Box::new(move |wh| {
                if let (Some(dev), Some(work_mgr)) = (dev.upgrade(), rescheduler.upgrade()) {
                    dev.fire(wh, &work_mgr);
                }
            }),
        );
        *work_handle = handle;
        work_mgr.schedule(handle);
        tracing::debug!(name = self.name.as_str(), handle = %handle, "measurement started");
        Ok(())
    }

    /// Stops periodic measurement, destroying the measure job. Idempotent.
    pub fn stop(&self) -> DeviceResult<()> {
        let work_mgr = self.lock_registration().work_mgr.upgrade();
        let mut work_handle = self.lock_work_handle();
        if work_handle.is_none() {
            return Ok(());
        }
        match work_mgr {
            Some(work_mgr) => work_mgr.destroy(&mut work_handle),
            // Framework already gone; the job died with it.
            None => *work_handle = WorkHandle::NONE,
        }
        tracing::debug!(name = self.name.as_str(), "measurement stopped");
        Ok(())
    }

    /// Measure trampoline, run on the dispatcher thread.
    fn fire(&self, handle: WorkHandle, work_mgr: &WorkMgr) {
        {
            let mut driver = self.lock_driver();
            driver.measure(self);
        }
        // A concurrent stop() has already destroyed the item; the reschedule
        // then simply reports it gone.
        work_mgr.set_delay(handle, self.sample_interval());
        work_mgr.schedule(handle);
    }

    /// Signals every open handle that fresh data is available. Drivers call
    /// this from `measure` after publishing.
    pub fn update_notify(&self) {
        let observers = self.lock_observers().clone();
        for slot in observers {
            slot.notify();
        }
    }

    pub fn dev_ioctl(&self, cmd: u32, arg: &mut dyn Any) -> DeviceResult<i32> {
        self.lock_driver().ioctl(cmd, arg)
    }

    pub fn dev_read(&self, buf: &mut [u8]) -> DeviceResult<usize> {
        self.lock_driver().read(buf)
    }

    pub fn dev_write(&self, buf: &[u8]) -> DeviceResult<usize> {
        self.lock_driver().write(buf)
    }

    /// Typed access to the driver body; fails if the body is not a `T`.
    pub fn with_driver<T: Driver, R>(&self, f: impl FnOnce(&mut T) -> R) -> DeviceResult<R> {
        let mut driver = self.lock_driver();
        let driver = driver
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(DeviceError::InvalidHandle)?;
        Ok(f(driver))
    }

    /// Number of currently open handles.
    pub fn open_handles(&self) -> usize {
        self.lock_observers().len()
    }

    pub(crate) fn add_observer(&self, slot: Arc<ObserverSlot>) {
        self.lock_observers().push(slot);
    }

    pub(crate) fn remove_observer(&self, slot: &Arc<ObserverSlot>) {
        self.lock_observers()
            .retain(|other| !Arc::ptr_eq(other, slot));
    }

    pub(crate) fn complete_registration(
        &self,
        instance: usize,
        instance_path: String,
        work_mgr: Weak<WorkMgr>,
    ) {
        let mut registration = self.lock_registration();
        registration.instance = Some(instance);
        registration.instance_path = Some(instance_path);
        registration.work_mgr = work_mgr;
    }

    pub(crate) fn clear_registration(&self) {
        *self.lock_registration() = Registration::default();
    }

    fn lock_driver(&self) -> MutexGuard<'_, Box<dyn Driver>> {
        match self.driver.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_registration(&self) -> MutexGuard<'_, Registration> {
        match self.registration.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_work_handle(&self) -> MutexGuard<'_, WorkHandle> {
        match self.work_handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Arc<ObserverSlot>>> {
        match self.observers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for DevObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevObj")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("instance", &self.instance())
            .field("sample_interval_us", &self.sample_interval())
            .finish_non_exhaustive()
    }
}

//! Device registry, path resolution and the multi-handle update wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use kestrel_hrt::{Deadline, SyncObj, WorkMgr};

use crate::dev_obj::DevObj;
use crate::device_id::DeviceId;
use crate::driver::Driver;
use crate::error::{DeviceError, DeviceResult};
use crate::handle::DevHandle;

/// Per-name cap on driver instances.
pub const MAX_INSTANCES: usize = 5;

/// Handles passed to [`DevMgr::wait_for_update`].
pub type UpdateList<'a> = [&'a DevHandle];

#[derive(Default)]
struct Registry {
    by_name: HashMap<String, Vec<Option<Arc<DevObj>>>>,
    by_id: HashMap<DeviceId, Arc<DevObj>>,
}

/// Registry of driver instances, keyed by name+instance and by packed id.
///
/// Also the access path for consumers: open a [`DevHandle`] by device path,
/// issue I/O through it, and block on [`DevMgr::wait_for_update`] across a
/// set of handles, poll-style.
pub struct DevMgr {
    registry: Mutex<Registry>,
    work_mgr: Arc<WorkMgr>,
}

impl DevMgr {
    pub(crate) fn new(work_mgr: Arc<WorkMgr>) -> Arc<DevMgr> {
        Arc::new(DevMgr {
            registry: Mutex::new(Registry::default()),
            work_mgr,
        })
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a driver instance and returns its instance slot.
    ///
    /// The lowest free slot in `[0, MAX_INSTANCES)` for the driver's name is
    /// assigned and the instance path becomes `"<base>/<instance>"`. The
    /// packed id must be unique across the registry.
    pub fn register_driver(&self, obj: &Arc<DevObj>) -> DeviceResult<usize> {
        let mut registry = self.lock_registry();
        if obj.is_registered() || registry.by_id.contains_key(&obj.id()) {
            return Err(DeviceError::AlreadyRegistered(obj.id()));
        }

        let bucket = registry
            .by_name
            .entry(obj.name().to_string())
            .or_insert_with(|| vec![None; MAX_INSTANCES]);
        let instance = bucket
            .iter()
            .position(|slot| slot.is_none())
            .ok_or_else(|| DeviceError::NoFreeInstance(obj.name().to_string()))?;
        bucket[instance] = Some(Arc::clone(obj));
        registry.by_id.insert(obj.id(), Arc::clone(obj));

        let instance_path = format!("{}/{}", obj.base_path(), instance);
        obj.complete_registration(instance, instance_path, Arc::downgrade(&self.work_mgr));
        tracing::info!(
            name = obj.name(),
            instance,
            id = %obj.id(),
            "driver registered"
        );
        Ok(instance)
    }

    /// Removes the driver from both indexes.
    ///
    /// The caller stops the driver first; the manager does not stop work.
    pub fn unregister_driver(&self, obj: &Arc<DevObj>) -> DeviceResult<()> {
        let mut registry = self.lock_registry();
        let Some(instance) = obj.instance() else {
            return Err(DeviceError::NotRegistered);
        };

        if let Some(bucket) = registry.by_name.get_mut(obj.name()) {
            if let Some(slot) = bucket.get_mut(instance) {
                if slot.as_ref().is_some_and(|held| Arc::ptr_eq(held, obj)) {
                    *slot = None;
                }
            }
        }
        registry.by_id.remove(&obj.id());
        obj.clear_registration();
        tracing::info!(name = obj.name(), instance, "driver unregistered");
        Ok(())
    }

    pub fn get_dev_obj_by_name(&self, name: &str, instance: usize) -> Option<Arc<DevObj>> {
        self.lock_registry()
            .by_name
            .get(name)?
            .get(instance)?
            .clone()
    }

    pub fn get_dev_obj_by_id(&self, id: DeviceId) -> Option<Arc<DevObj>> {
        self.lock_registry().by_id.get(&id).cloned()
    }

    /// Opens a handle on the device at `"<base>/<instance>"`.
    ///
    /// Concurrent opens of the same device are permitted; each handle gets
    /// its own observer slot.
    pub fn get_handle(&self, path: &str) -> DeviceResult<DevHandle> {
        let not_found = || DeviceError::NotFound(path.to_string());
        let (base, instance) = split_device_path(path).ok_or_else(not_found)?;
        let obj = self
            .lock_registry()
            .by_id
            .values()
            .find(|obj| obj.instance() == Some(instance) && obj.base_path() == base)
            .cloned()
            .ok_or_else(not_found)?;
        Ok(DevHandle::open(obj))
    }

    /// Detaches the handle from its device. Idempotent; equivalent to
    /// dropping the handle.
    pub fn release_handle(&self, handle: &mut DevHandle) {
        handle.release();
    }

    /// Typed access to the driver behind a handle.
    ///
    /// The default build trusts the handle's stored reference; with the
    /// `checked-handles` feature the device must additionally still be live
    /// in this registry. Either way the downcast to `T` is explicit and
    /// fails with [`DeviceError::InvalidHandle`].
    pub fn with_driver<T: Driver, R>(
        &self,
        handle: &DevHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> DeviceResult<R> {
        let obj = handle.obj()?;
        #[cfg(feature = "checked-handles")]
        if !self.is_live(obj) {
            return Err(DeviceError::InvalidHandle);
        }
        obj.with_driver(f)
    }

    #[cfg(feature = "checked-handles")]
    fn is_live(&self, obj: &Arc<DevObj>) -> bool {
        self.lock_registry()
            .by_id
            .get(&obj.id())
            .is_some_and(|held| Arc::ptr_eq(held, obj))
    }

    /// Signals every open handle of `obj`. Equivalent to
    /// [`DevObj::update_notify`].
    pub fn update_notify(&self, obj: &DevObj) {
        obj.update_notify();
    }

    /// Blocks until at least one handle in `in_set` observes an update.
    ///
    /// Earlier updates are discarded at subscription; only updates posted
    /// after this call starts count. Returns the indexes into `in_set` of
    /// the updated handles. `timeout_ms == 0` waits unbounded;
    /// [`DeviceError::Timeout`] reports an expired wait.
    pub fn wait_for_update(
        &self,
        in_set: &UpdateList<'_>,
        timeout_ms: u64,
    ) -> DeviceResult<Vec<usize>> {
        if in_set.iter().any(|handle| !handle.is_valid()) {
            return Err(DeviceError::InvalidHandle);
        }

        let waiter = Arc::new(SyncObj::new());
        for handle in in_set {
            handle.slot().subscribe(Arc::clone(&waiter));
        }
        let deadline = (timeout_ms != 0).then(|| Deadline::after_ms(timeout_ms));

        let collect_ready = || -> Vec<usize> {
            in_set
                .iter()
                .enumerate()
                .filter(|(_, handle)| handle.slot().updated())
                .map(|(index, _)| index)
                .collect()
        };

        let result = loop {
            let seen = waiter.generation();
            let ready = collect_ready();
            if !ready.is_empty() {
                break Ok(ready);
            }
            if !waiter.wait_past(seen, deadline) {
                // Timed out; pick up an update that raced the deadline.
                let ready = collect_ready();
                break if ready.is_empty() {
                    Err(DeviceError::Timeout)
                } else {
                    Ok(ready)
                };
            }
        };

        for handle in in_set {
            handle.slot().unsubscribe();
        }
        result
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.lock_registry().by_id.len()
    }

    /// Drains both indexes (shutdown path). Residually registered drivers
    /// are logged and forcibly unregistered.
    pub(crate) fn clear(&self) {
        let mut registry = self.lock_registry();
        if !registry.by_id.is_empty() {
            let residual: Vec<String> = registry
                .by_id
                .values()
                .map(|obj| {
                    obj.instance_path()
                        .unwrap_or_else(|| obj.name().to_string())
                })
                .collect();
            tracing::warn!(?residual, "devices still registered at shutdown");
        }
        for obj in registry.by_id.values() {
            obj.clear_registration();
        }
        registry.by_name.clear();
        registry.by_id.clear();
    }
}

/// Splits `"<base>/<instance>"`; the instance is a decimal slot index.
fn split_device_path(path: &str) -> Option<(&str, usize)> {
    let (base, instance) = path.rsplit_once('/')?;
    let instance: usize = instance.parse().ok()?;
    (!base.is_empty() && instance < MAX_INSTANCES).then_some((base, instance))
}

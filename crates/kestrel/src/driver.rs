//! The driver capability contract.

use std::any::Any;

use crate::dev_obj::DevObj;
use crate::error::{DeviceError, DeviceResult};

/// Capability set a concrete driver implements.
///
/// `measure` runs on the dispatcher thread every sample interval and must
/// stay bounded and non-blocking; the usual body performs one bus
/// transaction, publishes the result into the driver's own state, and calls
/// [`DevObj::update_notify`] so parked readers wake. The I/O hooks default to
/// [`DeviceError::Unsupported`] and are overridden per driver.
///
/// `measure` holds the device's driver lock, so it must not call back into
/// the same device's `ioctl`/`read`/`write` forwarding; it operates on
/// `self` directly.
pub trait Driver: Send + 'static {
    /// Acquires one sample. Runs on the dispatcher thread.
    fn measure(&mut self, dev: &DevObj);

    /// Driver-specific control request.
    fn ioctl(&mut self, _cmd: u32, _arg: &mut dyn Any) -> DeviceResult<i32> {
        Err(DeviceError::Unsupported)
    }

    fn read(&mut self, _buf: &mut [u8]) -> DeviceResult<usize> {
        Err(DeviceError::Unsupported)
    }

    fn write(&mut self, _buf: &[u8]) -> DeviceResult<usize> {
        Err(DeviceError::Unsupported)
    }

    /// Downcast seam used by typed handle access; implementations return
    /// `self`.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

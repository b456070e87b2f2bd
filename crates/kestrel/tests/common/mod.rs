#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use kestrel::{now_us, BusType, DevObj, DeviceError, DeviceId, DeviceResult, Driver};

/// ioctl: copy the driver's current sample counter into a `u32` argument.
pub const IOCTL_SAMPLE_COUNT: u32 = 1;

/// An I2C id unique per bus address.
pub fn i2c_id(address: u8) -> DeviceId {
    DeviceId::new(BusType::I2c, 0, address, 0x10)
}

/// Test sensor: counts fires, records fire timestamps, publishes every
/// sample.
pub struct CountingSensor {
    fires: Arc<AtomicU32>,
    stamps: Arc<Mutex<Vec<u64>>>,
    value: u32,
    config: u8,
}

pub fn counting_sensor() -> (Box<CountingSensor>, Arc<AtomicU32>, Arc<Mutex<Vec<u64>>>) {
    let fires = Arc::new(AtomicU32::new(0));
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let sensor = Box::new(CountingSensor {
        fires: Arc::clone(&fires),
        stamps: Arc::clone(&stamps),
        value: 0,
        config: 0,
    });
    (sensor, fires, stamps)
}

impl Driver for CountingSensor {
    fn measure(&mut self, dev: &DevObj) {
        self.value = self.value.wrapping_add(1);
        self.fires.fetch_add(1, Ordering::SeqCst);
        self.stamps.lock().unwrap().push(now_us());
        dev.update_notify();
    }

    fn ioctl(&mut self, cmd: u32, arg: &mut dyn Any) -> DeviceResult<i32> {
        match cmd {
            IOCTL_SAMPLE_COUNT => {
                let out = arg
                    .downcast_mut::<u32>()
                    .ok_or(DeviceError::Unsupported)?;
                *out = self.value;
                Ok(0)
            }
            _ => Err(DeviceError::Unsupported),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let bytes = self.value.to_le_bytes();
        if buf.len() < bytes.len() {
            return Err(DeviceError::Unsupported);
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if let Some(&first) = buf.first() {
            self.config = first;
        }
        Ok(buf.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl CountingSensor {
    pub fn config(&self) -> u8 {
        self.config
    }
}

/// Minimal driver with no I/O overrides and no publishing.
pub struct SilentSensor;

impl Driver for SilentSensor {
    fn measure(&mut self, _dev: &DevObj) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//! Cooperative periodic driver framework for embedded Linux / POSIX hosts.
//!
//! Sensor drivers on I2C/SPI/virtual buses are periodic: each must acquire a
//! sample every configured interval and publish it to readers. Instead of a
//! thread per driver, the framework multiplexes every driver onto the single
//! high-priority dispatcher of [`kestrel_hrt`]:
//!
//! - a [`Driver`] implements the capability set (`measure` plus optional
//!   `ioctl`/`read`/`write`),
//! - a [`DevObj`] wraps it with identity ([`DeviceId`], name, device path)
//!   and pacing state, and is registered with the [`DevMgr`],
//! - consumers open [`DevHandle`]s by path, issue I/O through them, and
//!   block in [`DevMgr::wait_for_update`] across any set of handles until a
//!   driver publishes fresh data.
//!
//! [`Framework::initialize`] wires the pieces together and owns their
//! teardown.

mod dev_mgr;
mod dev_obj;
mod device_id;
mod driver;
mod error;
mod framework;
mod handle;

pub use dev_mgr::{DevMgr, UpdateList, MAX_INSTANCES};
pub use dev_obj::DevObj;
pub use device_id::{BusType, DeviceId};
pub use driver::Driver;
pub use error::{DeviceError, DeviceResult};
pub use framework::{Framework, FrameworkError};
pub use handle::DevHandle;

pub use kestrel_hrt::{now_us, PacingStats, SyncObj, WorkHandle, WorkMgr};

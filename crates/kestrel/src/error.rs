use thiserror::Error;

use crate::device_id::DeviceId;

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors surfaced by the device framework.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The framework backing this operation has been torn down.
    #[error("framework is not initialized or has shut down")]
    NotInitialized,

    /// Unknown path, id or name/instance.
    #[error("no device at {0}")]
    NotFound(String),

    /// A device with the same packed id is already registered.
    #[error("device id {0} is already registered")]
    AlreadyRegistered(DeviceId),

    /// Every instance slot for this driver name is taken.
    #[error("no free instance slot for driver {0:?}")]
    NoFreeInstance(String),

    /// The operation requires the driver to be registered first.
    #[error("driver is not registered")]
    NotRegistered,

    /// The handle is released, or does not refer to a live device of the
    /// requested type.
    #[error("invalid device handle")]
    InvalidHandle,

    /// The driver does not implement this operation.
    #[error("operation not supported by this device")]
    Unsupported,

    /// The wait expired with no update posted.
    #[error("timed out waiting for a device update")]
    Timeout,
}

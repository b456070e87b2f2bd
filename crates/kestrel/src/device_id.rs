//! Packed 32-bit device identity.

use std::fmt;

/// Bus a device hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusType {
    Unknown = 0,
    I2c = 1,
    Spi = 2,
    Uavcan = 3,
    Virt = 4,
}

impl BusType {
    fn from_bits(bits: u32) -> BusType {
        match bits & 0x7 {
            1 => BusType::I2c,
            2 => BusType::Spi,
            3 => BusType::Uavcan,
            4 => BusType::Virt,
            _ => BusType::Unknown,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BusType::Unknown => "unknown",
            BusType::I2c => "i2c",
            BusType::Spi => "spi",
            BusType::Uavcan => "uavcan",
            BusType::Virt => "virt",
        }
    }
}

/// Bus type, bus index, bus address and device type folded into one `u32`.
///
/// In-word layout: bits 0–2 bus type, 3–7 bus index, 8–15 address,
/// 16–23 devtype, 24–31 reserved (zero). With the reserved byte zero the
/// packed value stays below 2^24, so it survives an `f32` round-trip
/// losslessly; external parameter transports rely on that. Equality and
/// ordering are by the packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u32);

impl DeviceId {
    pub fn new(bus_type: BusType, bus_index: u8, address: u8, devtype: u8) -> DeviceId {
        let mut raw = bus_type as u32;
        raw |= u32::from(bus_index & 0x1f) << 3;
        raw |= u32::from(address) << 8;
        raw |= u32::from(devtype) << 16;
        DeviceId(raw)
    }

    /// Reinterprets a packed value. Reserved bits are cleared.
    pub fn from_raw(raw: u32) -> DeviceId {
        DeviceId(raw & 0x00ff_ffff)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn bus_type(self) -> BusType {
        BusType::from_bits(self.0)
    }

    pub fn bus_index(self) -> u8 {
        ((self.0 >> 3) & 0x1f) as u8
    }

    pub fn address(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn devtype(self) -> u8 {
        (self.0 >> 16) as u8
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:0x{:02x}:0x{:02x}",
            self.bus_type().label(),
            self.bus_index(),
            self.address(),
            self.devtype()
        )
    }
}

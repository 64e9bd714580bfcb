//! I2C master
//!
//! Addresses are `u16` so 10-bit targets go through the same calls as
//! 7-bit ones; the driver decides from the value which form to put on
//! the wire.

use core::ops::RangeInclusive;

/// Controller side of an I2C bus
pub trait I2cBus {
    type Error;

    /// Send `data` to `address`, then STOP
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` from `address`, then STOP
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Send `out`, repeated START, fill `buf`
    fn write_read(&mut self, address: u16, out: &[u8], buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Whether a target ACKs an empty write
    fn acknowledges(&mut self, address: u16) -> bool {
        self.write(address, &[]).is_ok()
    }
}

/// Bus clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::FAST
    }
}

impl I2cConfig {
    pub const STANDARD: Self = Self { frequency: 100_000 };
    pub const FAST: Self = Self { frequency: 400_000 };

    /// 7-bit addresses outside the reserved blocks at either end
    pub const SCAN_RANGE: RangeInclusive<u8> = 0x08..=0x77;

    /// Clock rates the CXD56 controller runs at
    pub const fn is_supported(frequency: i64) -> bool {
        frequency == Self::STANDARD.frequency as i64 || frequency == Self::FAST.frequency as i64
    }
}

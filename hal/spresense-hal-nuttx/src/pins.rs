//! Spresense pin table
//!
//! Scripting code addresses pins by their index in [`PIN_TABLE`]
//! (D00..D28 then LED0..LED3). Each entry carries the board pin code and
//! the CXD56 pad that backs it.
//!
//! Pin codes pack the pin type in the top two bits:
//! - `0x0N`: digital header pin
//! - `0x4N`: on-board LED
//! - `0x8N`: analog header pin

use crate::error::Error;

/// Code returned for pins that do not map to a pad
pub const PIN_NOT_ASSIGNED: u8 = 0xFF;

/// Pin type bits
pub const PINTYPE_MASK: u8 = 0xC0;
pub const PINTYPE_DIGITAL: u8 = 0x00;
pub const PINTYPE_LED: u8 = 0x40;
pub const PINTYPE_ANALOG: u8 = 0x80;

const fn digital(n: u8) -> u8 {
    PINTYPE_DIGITAL | n
}

const fn led(n: u8) -> u8 {
    PINTYPE_LED | n
}

/// Analog header pin code
pub const fn analog(n: u8) -> u8 {
    PINTYPE_ANALOG | n
}

/// Strip the type bits from a pin code
pub const fn pin_offset(code: u8) -> u8 {
    code & !PINTYPE_MASK
}

/// CXD56 pad numbers (`arch/chip/pin.h`)
pub mod pad {
    pub const I2C0_BCK: u8 = 4;
    pub const I2C0_BDT: u8 = 5;
    pub const SEN_IRQ_IN: u8 = 37;
    pub const SPI2_MOSI: u8 = 55;
    pub const SPI2_MISO: u8 = 56;
    pub const SPI3_CS1_X: u8 = 59;
    pub const EMMC_CLK: u8 = 64;
    pub const EMMC_CMD: u8 = 65;
    pub const EMMC_DATA0: u8 = 66;
    pub const EMMC_DATA1: u8 = 67;
    pub const EMMC_DATA2: u8 = 68;
    pub const EMMC_DATA3: u8 = 69;
    pub const SPI4_CS_X: u8 = 70;
    pub const SPI4_SCK: u8 = 71;
    pub const SPI4_MOSI: u8 = 72;
    pub const SPI4_MISO: u8 = 73;
    pub const HIF_IRQ_OUT: u8 = 74;
    pub const UART2_TXD: u8 = 75;
    pub const UART2_RXD: u8 = 76;
    pub const UART2_CTS: u8 = 77;
    pub const UART2_RTS: u8 = 78;
    pub const I2S0_BCK: u8 = 79;
    pub const I2S0_LRCK: u8 = 80;
    pub const I2S0_DATA_IN: u8 = 81;
    pub const I2S0_DATA_OUT: u8 = 82;
    pub const I2S1_BCK: u8 = 83;
    pub const I2S1_LRCK: u8 = 84;
    pub const I2S1_DATA_IN: u8 = 85;
    pub const I2S1_DATA_OUT: u8 = 86;
    pub const PWM0: u8 = 97;
    pub const PWM1: u8 = 98;
    pub const PWM2: u8 = 99;
    pub const PWM3: u8 = 100;
}

/// One row of the pin table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinEntry {
    /// Board pin code
    pub code: u8,
    /// CXD56 pad
    pub pad: u8,
}

const fn entry(code: u8, pad: u8) -> PinEntry {
    PinEntry { code, pad }
}

/// Number of pins addressable from scripts
pub const PIN_COUNT: usize = 33;

/// Header and LED pins in scripting order
pub const PIN_TABLE: [PinEntry; PIN_COUNT] = [
    entry(digital(0), pad::UART2_RXD),
    entry(digital(1), pad::UART2_TXD),
    entry(digital(2), pad::HIF_IRQ_OUT),
    entry(digital(3), pad::PWM3),
    entry(digital(4), pad::SPI2_MOSI),
    entry(digital(5), pad::PWM1),
    entry(digital(6), pad::PWM0),
    entry(digital(7), pad::SPI3_CS1_X),
    entry(digital(8), pad::SPI2_MISO),
    entry(digital(9), pad::PWM2),
    entry(digital(10), pad::SPI4_CS_X),
    entry(digital(11), pad::SPI4_MOSI),
    entry(digital(12), pad::SPI4_MISO),
    entry(digital(13), pad::SPI4_SCK),
    entry(digital(14), pad::I2C0_BDT),
    entry(digital(15), pad::I2C0_BCK),
    entry(digital(16), pad::EMMC_DATA0),
    entry(digital(17), pad::EMMC_DATA1),
    entry(digital(18), pad::I2S0_DATA_OUT),
    entry(digital(19), pad::I2S0_DATA_IN),
    entry(digital(20), pad::EMMC_DATA2),
    entry(digital(21), pad::EMMC_DATA3),
    entry(digital(22), pad::SEN_IRQ_IN),
    entry(digital(23), pad::EMMC_CLK),
    entry(digital(24), pad::EMMC_CMD),
    entry(digital(25), pad::I2S0_LRCK),
    entry(digital(26), pad::I2S0_BCK),
    entry(digital(27), pad::UART2_CTS),
    entry(digital(28), pad::UART2_RTS),
    entry(led(0), pad::I2S1_BCK),
    entry(led(1), pad::I2S1_LRCK),
    entry(led(2), pad::I2S1_DATA_IN),
    entry(led(3), pad::I2S1_DATA_OUT),
];

/// PWM channel n is wired to `PWM_PINS[n]`
pub const PWM_PINS: [u8; 4] = [digital(6), digital(5), digital(9), digital(3)];

/// Index into [`PIN_TABLE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    /// Validate a scripting pin number
    pub fn new(n: i64) -> Result<Self, Error> {
        if (0..PIN_COUNT as i64).contains(&n) {
            Ok(Self(n as u8))
        } else {
            Err(Error::InvalidPin)
        }
    }

    /// First LED pin
    pub const LED0: PinId = PinId(29);

    /// Table index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Board pin code
    pub const fn code(self) -> u8 {
        PIN_TABLE[self.0 as usize].code
    }

    /// CXD56 pad
    pub const fn pad(self) -> u8 {
        PIN_TABLE[self.0 as usize].pad
    }

    /// Whether this is one of the on-board LEDs
    pub const fn is_led(self) -> bool {
        self.code() & PINTYPE_MASK == PINTYPE_LED
    }

    /// Iterate every pin in table order
    pub fn all() -> impl Iterator<Item = PinId> {
        (0..PIN_COUNT as u8).map(PinId)
    }
}

/// Map a scripting pin number to its pad, or [`PIN_NOT_ASSIGNED`]
pub fn pin_convert(n: i64) -> u8 {
    PinId::new(n).map(PinId::pad).unwrap_or(PIN_NOT_ASSIGNED)
}

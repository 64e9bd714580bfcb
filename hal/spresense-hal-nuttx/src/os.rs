//! OS contract
//!
//! Everything the peripheral banks need from NuttX goes through [`Os`]:
//! character devices under `/dev`, a typed view of the `ioctl` commands
//! the drivers understand, a readiness wait standing in for `select`, and
//! the board-level GPIO and `boardctl` entry points.
//!
//! Requests that carry driver structures borrow them, so the backend can
//! hand pointers to the kernel without copying.

use core::time::Duration;

use crate::error::Errno;

/// Open file descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fd(pub i32);

/// Access mode for [`Os::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// PWM driver characteristics (`struct pwm_info_s`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmInfo {
    /// Frequency in Hz
    pub frequency: u32,
    /// Duty as an unsigned 16.16 fraction
    pub duty: u32,
}

/// I2C message flags
pub mod i2c_flags {
    /// Read data from the target
    pub const READ: u16 = 0x0001;
    /// Ten-bit address
    pub const TEN: u16 = 0x0002;
    /// Do not issue STOP after this message
    pub const NOSTOP: u16 = 0x0040;
    /// Do not issue (repeated) START before this message
    pub const NOSTART: u16 = 0x0080;
}

/// Data carried by one I2C message
#[derive(Debug)]
pub enum I2cBuffer<'a> {
    /// Bytes to send
    Write(&'a [u8]),
    /// Bytes to receive
    Read(&'a mut [u8]),
}

impl I2cBuffer<'_> {
    /// Message length in bytes
    pub fn len(&self) -> usize {
        match self {
            I2cBuffer::Write(buf) => buf.len(),
            I2cBuffer::Read(buf) => buf.len(),
        }
    }

    /// Whether the message carries no data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One message of an I2C transfer (`struct i2c_msg_s`)
#[derive(Debug)]
pub struct I2cMessage<'a> {
    /// Bus frequency in Hz
    pub frequency: u32,
    /// 7-bit target address
    pub addr: u16,
    /// Combination of [`i2c_flags`]
    pub flags: u16,
    /// Payload
    pub buffer: I2cBuffer<'a>,
}

/// One full-duplex SPI exchange (`struct spi_sequence_s` with one transfer)
#[derive(Debug)]
pub struct SpiExchange<'a> {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// SPI mode 0..=3
    pub mode: u8,
    /// Word size in bits
    pub bits: u8,
    /// Words clocked out
    pub tx: &'a [u8],
    /// Words clocked in (same length as `tx`)
    pub rx: &'a mut [u8],
}

/// Number of control characters in [`Termios`]
pub const NCCS: usize = 12;

/// Terminal attributes (`struct termios`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Termios {
    pub c_iflag: u32,
    pub c_oflag: u32,
    pub c_cflag: u32,
    pub c_lflag: u32,
    pub c_cc: [u8; NCCS],
    /// Input and output speed in baud
    pub c_speed: u32,
}

/// Typed `ioctl` request
#[derive(Debug)]
pub enum Ioctl<'a> {
    /// `SCUIOC_SETFIFOMODE`: 1 = overwrite oldest sample when full
    ScuFifoMode(u32),
    /// `ANIOC_CXD56_FIFOSIZE`
    AdcFifoSize(u32),
    /// `ANIOC_CXD56_START`
    AdcStart,
    /// `ANIOC_CXD56_STOP`
    AdcStop,
    /// `PWMIOC_SETCHARACTERISTICS`
    PwmSetCharacteristics(&'a PwmInfo),
    /// `PWMIOC_START`
    PwmStart,
    /// `PWMIOC_STOP`
    PwmStop,
    /// `I2CIOC_TRANSFER`
    I2cTransfer(&'a mut [I2cMessage<'a>]),
    /// `SPIIOC_TRANSFER`
    SpiTransfer(&'a mut SpiExchange<'a>),
    /// `TCGETS`
    GetTermios(&'a mut Termios),
    /// `TCSETS`
    SetTermios(&'a Termios),
    /// `TCFLSH`
    Flush,
    /// `TIOCSBRK`
    SendBreak,
    /// `FIONREAD`: bytes waiting to be read
    BytesReadable(&'a mut i32),
    /// `FIONSPACE`: free space in the write buffer
    BytesWritable(&'a mut i32),
}

impl Ioctl<'_> {
    /// Command name, for logs and call traces
    pub fn name(&self) -> &'static str {
        match self {
            Ioctl::ScuFifoMode(_) => "SCUIOC_SETFIFOMODE",
            Ioctl::AdcFifoSize(_) => "ANIOC_CXD56_FIFOSIZE",
            Ioctl::AdcStart => "ANIOC_CXD56_START",
            Ioctl::AdcStop => "ANIOC_CXD56_STOP",
            Ioctl::PwmSetCharacteristics(_) => "PWMIOC_SETCHARACTERISTICS",
            Ioctl::PwmStart => "PWMIOC_START",
            Ioctl::PwmStop => "PWMIOC_STOP",
            Ioctl::I2cTransfer(_) => "I2CIOC_TRANSFER",
            Ioctl::SpiTransfer(_) => "SPIIOC_TRANSFER",
            Ioctl::GetTermios(_) => "TCGETS",
            Ioctl::SetTermios(_) => "TCSETS",
            Ioctl::Flush => "TCFLSH",
            Ioctl::SendBreak => "TIOCSBRK",
            Ioctl::BytesReadable(_) => "FIONREAD",
            Ioctl::BytesWritable(_) => "FIONSPACE",
        }
    }
}

/// CXD56 pad pull setting (`PIN_FLOAT`, `PIN_PULLUP`, `PIN_PULLDOWN`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PadPull {
    #[default]
    Float,
    PullUp,
    PullDown,
}

impl PadPull {
    /// Value passed to `board_gpio_config`
    pub const fn raw(self) -> i32 {
        match self {
            PadPull::Float => 0,
            PadPull::PullUp => 1,
            PadPull::PullDown => 2,
        }
    }
}

impl From<spresense_hal::gpio::Pull> for PadPull {
    fn from(pull: spresense_hal::gpio::Pull) -> Self {
        match pull {
            spresense_hal::gpio::Pull::None => PadPull::Float,
            spresense_hal::gpio::Pull::Up => PadPull::PullUp,
            spresense_hal::gpio::Pull::Down => PadPull::PullDown,
        }
    }
}

/// Arguments of `board_gpio_config`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioConfig {
    /// Pad function mode (0 = GPIO)
    pub mode: u8,
    /// Enable the input buffer
    pub input: bool,
    /// High drive current
    pub high_drive: bool,
    /// Pull resistor
    pub pull: PadPull,
}

impl GpioConfig {
    /// GPIO function with high drive, as every pin on this port uses
    pub const fn gpio(input: bool, pull: PadPull) -> Self {
        Self {
            mode: 0,
            input,
            high_drive: true,
            pull,
        }
    }
}

/// `boardctl` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardCtl {
    /// `BOARDIOC_INIT`
    Init,
    /// `BOARDIOC_RESET`
    Reset,
}

/// Operating system services used by the peripheral banks
pub trait Os {
    /// Open a device node
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Fd, Errno>;

    /// Close a descriptor
    fn close(&mut self, fd: Fd) -> Result<(), Errno>;

    /// Read into `buf`, returning the byte count (0 = nothing available)
    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno>;

    /// Write `buf`, returning the byte count accepted
    fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Errno>;

    /// Wait until `fd` is readable or `timeout` passes (`select`)
    ///
    /// Returns `true` when readable.
    fn wait_readable(&mut self, fd: Fd, timeout: Duration) -> Result<bool, Errno>;

    /// Issue a driver command
    fn ioctl(&mut self, fd: Fd, request: Ioctl<'_>) -> Result<(), Errno>;

    /// Configure a CXD56 pad as GPIO
    fn gpio_config(&mut self, pin: u8, config: GpioConfig) -> Result<(), Errno>;

    /// Drive a GPIO (`None` turns the output driver off)
    fn gpio_write(&mut self, pin: u8, level: Option<bool>);

    /// Sample a GPIO
    fn gpio_read(&self, pin: u8) -> bool;

    /// Board control
    fn board_ctl(&mut self, cmd: BoardCtl) -> Result<(), Errno>;
}

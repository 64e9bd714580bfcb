//! UART serial communication abstractions
//!
//! Provides traits for serial communication that can be implemented by
//! board-specific HALs.

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Returns the number of bytes the driver accepted.
    fn write_blocking(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Waits at most the configured timeout for the first byte and returns
    /// the number of bytes read (0 on timeout).
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read a single byte from the UART, `None` on timeout
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.read_blocking(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Line status queries
pub trait UartStatus {
    /// Error type for status queries
    type Error;

    /// Bytes waiting in the receive buffer
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Free space in the transmit buffer
    fn space_available(&mut self) -> Result<usize, Self::Error>;

    /// Send a break condition on the line
    fn send_break(&mut self) -> Result<(), Self::Error>;
}

/// Combined UART interface
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Read timeout in milliseconds
    pub timeout_ms: u16,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout_ms: 0,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

impl DataBits {
    /// Bit count
    pub const fn count(self) -> u8 {
        match self {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

/// Poll flags, matching the runtime's stream poll bits
pub mod poll {
    /// Readable
    pub const RD: u32 = 0x0001;
    /// Writable
    pub const WR: u32 = 0x0004;
}

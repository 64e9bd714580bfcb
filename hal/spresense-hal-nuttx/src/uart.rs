//! UART
//!
//! UART0 and UART1 belong to the console, so only UART2 (`/dev/ttyS2`,
//! D00 = RX, D01 = TX) is handed to scripts. Unlike the other peripherals
//! each UART object owns its own descriptor: constructing a second object
//! opens the device again.
//!
//! The driver runs 8N1 only; the baud rate is set through termios.

use core::time::Duration;

use spresense_hal::uart::{poll, DataBits, Parity, StopBits, UartConfig, UartRx, UartStatus, UartTx};

use crate::error::{Context, Errno, Error};
use crate::os::{Fd, Ioctl, OpenMode, Os, Termios};

/// Device node of UART2
pub const UART_DEVPATH: &str = "/dev/ttyS2";

/// The one UART id scripts may use
pub const UART_ID: i64 = 2;

/// Check a scripting UART id
pub fn check_id(id: i64) -> Result<(), Error> {
    match id {
        UART_ID => Ok(()),
        0 | 1 => Err(Error::UartReserved(id)),
        _ => Err(Error::NoSuchUart(id)),
    }
}

/// Check that a frame format is one the driver supports
pub fn check_frame(config: &UartConfig) -> Result<(), Error> {
    if config.data_bits != DataBits::Eight {
        return Err(Error::Unsupported("only 8bit data is supported"));
    }
    if config.parity != Parity::None {
        return Err(Error::Unsupported("only none parity is supported"));
    }
    if config.stop_bits != StopBits::One {
        return Err(Error::Unsupported("only 1 stop bit is supported"));
    }
    Ok(())
}

/// An open UART2 instance
#[derive(Debug)]
pub struct Uart {
    fd: Option<Fd>,
    config: UartConfig,
}

impl Uart {
    /// Open UART `id` with the default 115200 8N1 settings recorded
    pub fn open<O: Os>(os: &mut O, id: i64) -> Result<Self, Error> {
        check_id(id)?;
        let fd = os
            .open(UART_DEVPATH, OpenMode::ReadWrite)
            .context("Failed to initialize UART2")?;
        debug!("uart2 opened");
        Ok(Self {
            fd: Some(fd),
            config: UartConfig::default(),
        })
    }

    /// Current settings
    pub fn config(&self) -> UartConfig {
        self.config
    }

    /// Whether the descriptor is still open
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    fn fd(&self) -> Result<Fd, Error> {
        self.fd.ok_or(Error::Deinitialized("UART"))
    }

    /// Apply settings; a zero baud rate leaves the line speed alone
    pub fn init<O: Os>(&mut self, os: &mut O, config: UartConfig) -> Result<(), Error> {
        check_frame(&config)?;
        let fd = self.fd()?;

        if config.baudrate > 0 {
            let mut termios = Termios::default();
            os.ioctl(fd, Ioctl::GetTermios(&mut termios))
                .context("cannot get termios fields")?;
            termios.c_speed = config.baudrate;
            os.ioctl(fd, Ioctl::SetTermios(&termios))
                .context("cannot set termios fields")?;
            os.ioctl(fd, Ioctl::Flush).context("cannot flush UART")?;
            self.config.baudrate = config.baudrate;
        }
        self.config.data_bits = config.data_bits;
        self.config.parity = config.parity;
        self.config.stop_bits = config.stop_bits;
        self.config.timeout_ms = config.timeout_ms;
        Ok(())
    }

    /// Wait up to the timeout for data, then read what is there
    ///
    /// Returns 0 when nothing arrived in time.
    pub fn read<O: Os>(&mut self, os: &mut O, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let fd = self.fd()?;
        let timeout = Duration::from_millis(self.config.timeout_ms as u64);
        if !os.wait_readable(fd, timeout).context("select() error")? {
            return Ok(0);
        }
        os.read(fd, buf).context("UART read failed")
    }

    /// Read until a newline (kept) or a timeout
    pub fn readline<O: Os>(&mut self, os: &mut O) -> Result<Vec<u8>, Error> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while self.read(os, &mut byte)? == 1 {
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(line)
    }

    /// Write bytes, returning how many the driver took
    pub fn write<O: Os>(&mut self, os: &mut O, data: &[u8]) -> Result<usize, Error> {
        let fd = self.fd()?;
        os.write(fd, data)
            .map_err(|_| Error::os("UART write failed", Errno::EAGAIN))
    }

    /// Bytes waiting to be read
    pub fn any<O: Os>(&self, os: &mut O) -> Result<usize, Error> {
        let mut count = 0i32;
        os.ioctl(self.fd()?, Ioctl::BytesReadable(&mut count))
            .context("Serial FIONREAD not supported")?;
        Ok(count.max(0) as usize)
    }

    /// Free space in the transmit buffer
    pub fn space<O: Os>(&self, os: &mut O) -> Result<usize, Error> {
        let mut count = 0i32;
        os.ioctl(self.fd()?, Ioctl::BytesWritable(&mut count))
            .context("Serial FIONSPACE not supported")?;
        Ok(count.max(0) as usize)
    }

    /// Hold the line in break
    pub fn send_break<O: Os>(&self, os: &mut O) -> Result<(), Error> {
        os.ioctl(self.fd()?, Ioctl::SendBreak)
            .context("Serial TIOCSBRK not supported")
    }

    /// Stream poll: which of the requested [`poll`] flags are ready
    pub fn poll<O: Os>(&self, os: &mut O, flags: u32) -> Result<u32, Error> {
        let mut ready = 0;
        if flags & poll::RD != 0 && self.any(os)? > 0 {
            ready |= poll::RD;
        }
        if flags & poll::WR != 0 && self.space(os)? > 0 {
            ready |= poll::WR;
        }
        Ok(ready)
    }

    /// Close the descriptor
    pub fn deinit<O: Os>(&mut self, os: &mut O) -> Result<(), Error> {
        if let Some(fd) = self.fd.take() {
            os.close(fd).context("Failed to close UART2")?;
        }
        Ok(())
    }

    /// Borrow this instance together with the OS
    pub fn port<'a, O: Os>(&'a mut self, os: &'a mut O) -> UartPort<'a, O> {
        UartPort { os, uart: self }
    }
}

/// A UART bound to the OS, usable through the HAL and `embedded-io` traits
pub struct UartPort<'a, O: Os> {
    os: &'a mut O,
    uart: &'a mut Uart,
}

impl<O: Os> UartTx for UartPort<'_, O> {
    type Error = Error;

    fn write_blocking(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.uart.write(self.os, data)
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<O: Os> UartRx for UartPort<'_, O> {
    type Error = Error;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.uart.read(self.os, buf)
    }
}

impl<O: Os> UartStatus for UartPort<'_, O> {
    type Error = Error;

    fn bytes_available(&mut self) -> Result<usize, Error> {
        self.uart.any(self.os)
    }

    fn space_available(&mut self) -> Result<usize, Error> {
        self.uart.space(self.os)
    }

    fn send_break(&mut self) -> Result<(), Error> {
        self.uart.send_break(self.os)
    }
}

impl<O: Os> embedded_io::ErrorType for UartPort<'_, O> {
    type Error = Error;
}

impl<O: Os> embedded_io::Read for UartPort<'_, O> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.uart.read(self.os, buf)
    }
}

impl<O: Os> embedded_io::ReadReady for UartPort<'_, O> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.any(self.os)? > 0)
    }
}

impl<O: Os> embedded_io::Write for UartPort<'_, O> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(self.os, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<O: Os> embedded_io::WriteReady for UartPort<'_, O> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.space(self.os)? > 0)
    }
}

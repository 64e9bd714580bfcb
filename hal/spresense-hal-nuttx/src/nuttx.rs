//! NuttX backend
//!
//! Implements [`Os`] with libc file calls plus the board entry points the
//! Spresense BSP exports (`board_gpio_*`, `boardctl`). Typed [`Ioctl`]
//! requests are lowered to the driver structures here and nowhere else.

use core::ffi::{c_int, c_uint, c_ulong, c_void};
use core::time::Duration;
use std::ffi::CString;

use crate::error::Errno;
use crate::os::{BoardCtl, Fd, GpioConfig, I2cBuffer, Ioctl, OpenMode, Os};

/// ioctl command numbers (`nuttx/fs/ioctl.h` and the CXD56 driver headers)
mod cmd {
    use core::ffi::{c_int, c_uint};

    const fn ioc(base: c_int, nr: c_int) -> c_int {
        base | nr
    }

    const TIOC: c_int = 0x0100;
    const FIOC: c_int = 0x0300;
    const ANIOC: c_int = 0x0b00;
    const PWMIOC: c_int = 0x0c00;
    const I2CIOC: c_int = 0x2000;
    const SPIIOC: c_int = 0x2100;
    const SCUIOC: c_int = 0xa000;

    pub const TCGETS: c_int = ioc(TIOC, 0x0001);
    pub const TCSETS: c_int = ioc(TIOC, 0x0002);
    pub const TIOCSBRK: c_int = ioc(TIOC, 0x000b);
    pub const TCFLSH: c_int = ioc(TIOC, 0x000e);
    pub const FIONREAD: c_int = ioc(FIOC, 0x0008);
    pub const FIONSPACE: c_int = ioc(FIOC, 0x000a);
    pub const ANIOC_CXD56_START: c_int = ioc(ANIOC, 0x0005);
    pub const ANIOC_CXD56_STOP: c_int = ioc(ANIOC, 0x0006);
    pub const ANIOC_CXD56_FIFOSIZE: c_int = ioc(ANIOC, 0x0008);
    pub const PWMIOC_SETCHARACTERISTICS: c_int = ioc(PWMIOC, 0x0001);
    pub const PWMIOC_START: c_int = ioc(PWMIOC, 0x0003);
    pub const PWMIOC_STOP: c_int = ioc(PWMIOC, 0x0004);
    pub const I2CIOC_TRANSFER: c_int = ioc(I2CIOC, 0x0001);
    pub const SPIIOC_TRANSFER: c_int = ioc(SPIIOC, 0x0001);
    pub const SCUIOC_SETFIFOMODE: c_int = ioc(SCUIOC, 0x0013);

    pub const BOARDIOC_INIT: c_uint = 0xff01;
    pub const BOARDIOC_RESET: c_uint = 0xff04;
}

/// `struct i2c_msg_s`
#[repr(C)]
struct I2cMsgS {
    frequency: u32,
    addr: u16,
    flags: u16,
    buffer: *mut u8,
    length: isize,
}

/// `struct i2c_transfer_s`
#[repr(C)]
struct I2cTransferS {
    msgv: *mut I2cMsgS,
    msgc: usize,
}

/// `struct spi_trans_s`
#[repr(C)]
struct SpiTransS {
    deselect: bool,
    delay: u32,
    nwords: usize,
    txbuffer: *const c_void,
    rxbuffer: *mut c_void,
}

/// `struct spi_sequence_s`
#[repr(C)]
struct SpiSequenceS {
    dev: u32,
    mode: u8,
    nbits: u8,
    ntrans: u8,
    frequency: u32,
    trans: *mut SpiTransS,
}

extern "C" {
    fn ioctl(fd: c_int, req: c_int, ...) -> c_int;
    fn boardctl(cmd: c_uint, arg: usize) -> c_int;
    fn board_gpio_config(pin: u32, mode: c_int, input: bool, drive: bool, pull: c_int) -> c_int;
    fn board_gpio_write(pin: u32, value: c_int);
    fn board_gpio_read(pin: u32) -> c_int;
}

fn last_errno() -> Errno {
    Errno(std::io::Error::last_os_error().raw_os_error().unwrap_or(Errno::EIO.0))
}

fn check(ret: c_int) -> Result<c_int, Errno> {
    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret)
    }
}

/// The running NuttX kernel
#[derive(Debug, Default)]
pub struct NuttxOs;

impl NuttxOs {
    pub const fn new() -> Self {
        Self
    }

    fn raw_ioctl(fd: Fd, req: c_int, arg: c_ulong) -> Result<(), Errno> {
        // SAFETY: `arg` is 0 or points at a live driver structure for the
        // duration of the call
        check(unsafe { ioctl(fd.0, req, arg) }).map(|_| ())
    }
}

impl Os for NuttxOs {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Fd, Errno> {
        let path = CString::new(path).map_err(|_| Errno::EINVAL)?;
        let flags = match mode {
            OpenMode::ReadOnly => libc::O_RDONLY,
            OpenMode::WriteOnly => libc::O_WRONLY,
            OpenMode::ReadWrite => libc::O_RDWR,
        };
        // SAFETY: `path` is NUL-terminated and outlives the call
        check(unsafe { libc::open(path.as_ptr(), flags) }).map(Fd)
    }

    fn close(&mut self, fd: Fd) -> Result<(), Errno> {
        // SAFETY: plain descriptor call
        check(unsafe { libc::close(fd.0) }).map(|_| ())
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        // SAFETY: the kernel writes at most `buf.len()` bytes into `buf`
        let n = unsafe { libc::read(fd.0, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(last_errno())
        } else {
            Ok(n as usize)
        }
    }

    fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        // SAFETY: the kernel reads at most `buf.len()` bytes from `buf`
        let n = unsafe { libc::write(fd.0, buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(last_errno())
        } else {
            Ok(n as usize)
        }
    }

    fn wait_readable(&mut self, fd: Fd, timeout: Duration) -> Result<bool, Errno> {
        let mut pfd = libc::pollfd {
            fd: fd.0,
            events: libc::POLLIN,
            revents: 0,
        };
        let ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        // SAFETY: one valid pollfd
        let ready = check(unsafe { libc::poll(&mut pfd, 1, ms) })?;
        Ok(ready > 0 && pfd.revents & libc::POLLIN != 0)
    }

    fn ioctl(&mut self, fd: Fd, request: Ioctl<'_>) -> Result<(), Errno> {
        match request {
            Ioctl::ScuFifoMode(mode) => {
                Self::raw_ioctl(fd, cmd::SCUIOC_SETFIFOMODE, mode as c_ulong)
            }
            Ioctl::AdcFifoSize(size) => {
                Self::raw_ioctl(fd, cmd::ANIOC_CXD56_FIFOSIZE, size as c_ulong)
            }
            Ioctl::AdcStart => Self::raw_ioctl(fd, cmd::ANIOC_CXD56_START, 0),
            Ioctl::AdcStop => Self::raw_ioctl(fd, cmd::ANIOC_CXD56_STOP, 0),
            Ioctl::PwmSetCharacteristics(info) => Self::raw_ioctl(
                fd,
                cmd::PWMIOC_SETCHARACTERISTICS,
                info as *const _ as c_ulong,
            ),
            Ioctl::PwmStart => Self::raw_ioctl(fd, cmd::PWMIOC_START, 0),
            Ioctl::PwmStop => Self::raw_ioctl(fd, cmd::PWMIOC_STOP, 0),
            Ioctl::I2cTransfer(msgs) => {
                let mut raw: Vec<I2cMsgS> = msgs
                    .iter_mut()
                    .map(|msg| {
                        let (buffer, length) = match &mut msg.buffer {
                            I2cBuffer::Write(buf) => (buf.as_ptr() as *mut u8, buf.len()),
                            I2cBuffer::Read(buf) => (buf.as_mut_ptr(), buf.len()),
                        };
                        I2cMsgS {
                            frequency: msg.frequency,
                            addr: msg.addr,
                            flags: msg.flags,
                            buffer,
                            length: length as isize,
                        }
                    })
                    .collect();
                let mut xfer = I2cTransferS {
                    msgv: raw.as_mut_ptr(),
                    msgc: raw.len(),
                };
                Self::raw_ioctl(fd, cmd::I2CIOC_TRANSFER, &mut xfer as *mut _ as c_ulong)
            }
            Ioctl::SpiTransfer(x) => {
                let word_bytes = if x.bits > 8 { 2 } else { 1 };
                let mut trans = SpiTransS {
                    deselect: true,
                    delay: 0,
                    nwords: x.tx.len() / word_bytes,
                    txbuffer: x.tx.as_ptr().cast(),
                    rxbuffer: x.rx.as_mut_ptr().cast(),
                };
                let mut seq = SpiSequenceS {
                    dev: 0,
                    mode: x.mode,
                    nbits: x.bits,
                    ntrans: 1,
                    frequency: x.frequency,
                    trans: &mut trans,
                };
                Self::raw_ioctl(fd, cmd::SPIIOC_TRANSFER, &mut seq as *mut _ as c_ulong)
            }
            Ioctl::GetTermios(t) => Self::raw_ioctl(fd, cmd::TCGETS, t as *mut _ as c_ulong),
            Ioctl::SetTermios(t) => Self::raw_ioctl(fd, cmd::TCSETS, t as *const _ as c_ulong),
            Ioctl::Flush => Self::raw_ioctl(fd, cmd::TCFLSH, 0),
            Ioctl::SendBreak => Self::raw_ioctl(fd, cmd::TIOCSBRK, 0),
            Ioctl::BytesReadable(n) => Self::raw_ioctl(fd, cmd::FIONREAD, n as *mut _ as c_ulong),
            Ioctl::BytesWritable(n) => Self::raw_ioctl(fd, cmd::FIONSPACE, n as *mut _ as c_ulong),
        }
    }

    fn gpio_config(&mut self, pin: u8, config: GpioConfig) -> Result<(), Errno> {
        // SAFETY: board call with plain values
        let ret = unsafe {
            board_gpio_config(
                pin as u32,
                config.mode as c_int,
                config.input,
                config.high_drive,
                config.pull.raw(),
            )
        };
        if ret < 0 {
            Err(Errno(-ret))
        } else {
            Ok(())
        }
    }

    fn gpio_write(&mut self, pin: u8, level: Option<bool>) {
        let value = match level {
            Some(true) => 1,
            Some(false) => 0,
            None => -1,
        };
        // SAFETY: board call with plain values
        unsafe { board_gpio_write(pin as u32, value) }
    }

    fn gpio_read(&self, pin: u8) -> bool {
        // SAFETY: board call with plain values
        unsafe { board_gpio_read(pin as u32) > 0 }
    }

    fn board_ctl(&mut self, ctl: BoardCtl) -> Result<(), Errno> {
        let cmd = match ctl {
            BoardCtl::Init => cmd::BOARDIOC_INIT,
            BoardCtl::Reset => cmd::BOARDIOC_RESET,
        };
        // SAFETY: neither command takes a pointer argument
        check(unsafe { boardctl(cmd, 0) }).map(|_| ())
    }
}

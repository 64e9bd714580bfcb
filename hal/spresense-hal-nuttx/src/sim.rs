//! In-memory board
//!
//! [`SimOs`] stands in for NuttX on the host. It knows the Spresense
//! device nodes, keeps enough driver state to answer the requests the
//! peripheral banks make, and records every call so tests can check the
//! exact open/ioctl sequence. Failures can be injected per device path or
//! per ioctl command.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use crate::error::Errno;
use crate::os::{
    i2c_flags, BoardCtl, Fd, GpioConfig, I2cBuffer, I2cMessage, Ioctl, OpenMode, Os, PwmInfo,
    SpiExchange, Termios,
};

/// Kind of simulated device node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimDevice {
    Adc,
    Pwm,
    I2c,
    Spi,
    Serial,
}

/// One recorded OS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Close(Fd),
    Read(Fd),
    Write(Fd, Vec<u8>),
    Wait(Fd, Duration),
    Ioctl(Fd, &'static str),
    GpioConfig(u8, GpioConfig),
    GpioWrite(u8, Option<bool>),
    BoardCtl(BoardCtl),
}

/// Simulated ADC driver
#[derive(Debug, Default)]
pub struct AdcSim {
    /// Samples handed out by `read`, oldest first
    pub samples: VecDeque<i16>,
    /// Sample returned once the queue is empty
    pub level: i16,
    /// Reads that report no data before samples are returned
    pub empty_reads: u32,
    pub fifo_mode: Option<u32>,
    pub fifo_size: Option<u32>,
    pub running: bool,
}

/// Simulated PWM driver
#[derive(Debug, Default)]
pub struct PwmSim {
    pub info: Option<PwmInfo>,
    pub running: bool,
    pub starts: u32,
}

/// I2C target with byte-addressed register memory
#[derive(Debug, Default, Clone)]
pub struct I2cTarget {
    pub memory: Vec<u8>,
    pointer: usize,
}

/// One message seen on the simulated I2C bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cRecord {
    pub addr: u16,
    pub flags: u16,
    pub frequency: u32,
    /// Bytes written, or `len` zeros for reads
    pub data: Vec<u8>,
}

/// One exchange seen on a simulated SPI bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiRecord {
    pub frequency: u32,
    pub mode: u8,
    pub bits: u8,
    pub tx: Vec<u8>,
}

/// Simulated SPI driver
#[derive(Debug, Default)]
pub struct SpiSim {
    /// Replies clocked in on upcoming exchanges; loopback when empty
    pub replies: VecDeque<Vec<u8>>,
    pub log: Vec<SpiRecord>,
}

/// Simulated serial port
#[derive(Debug)]
pub struct SerialSim {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub termios: Termios,
    pub flushes: u32,
    pub breaks: u32,
    pub tx_space: i32,
}

impl Default for SerialSim {
    fn default() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            termios: Termios {
                c_speed: 115200,
                ..Termios::default()
            },
            flushes: 0,
            breaks: 0,
            tx_space: 256,
        }
    }
}

/// Simulated Spresense running NuttX
#[derive(Debug, Default)]
pub struct SimOs {
    nodes: HashMap<String, SimDevice>,
    open: HashMap<i32, String>,
    next_fd: i32,
    /// Every call made, in order
    pub calls: Vec<Call>,
    open_failures: HashMap<String, Errno>,
    ioctl_failures: HashMap<&'static str, Errno>,
    io_failures: HashMap<&'static str, Errno>,
    adc: HashMap<String, AdcSim>,
    pwm: HashMap<String, PwmSim>,
    spi: HashMap<String, SpiSim>,
    serial: HashMap<String, SerialSim>,
    i2c_targets: BTreeMap<u16, I2cTarget>,
    i2c_log: Vec<I2cRecord>,
    gpio_out: HashMap<u8, Option<bool>>,
    gpio_in: HashMap<u8, bool>,
    gpio_cfg: HashMap<u8, GpioConfig>,
}

impl SimOs {
    /// Empty board with no device nodes
    pub fn new() -> Self {
        Self {
            next_fd: 3,
            ..Self::default()
        }
    }

    /// Board with every node the Spresense port uses
    pub fn spresense() -> Self {
        let mut os = Self::new();
        for path in crate::adc::ADC_DEVPATHS {
            os.add_node(path, SimDevice::Adc);
        }
        for path in crate::pwm::PWM_DEVPATHS {
            os.add_node(path, SimDevice::Pwm);
        }
        os.add_node(crate::i2c::I2C_DEVPATH, SimDevice::I2c);
        for path in crate::spi::SPI_DEVPATHS {
            os.add_node(path, SimDevice::Spi);
        }
        os.add_node(crate::uart::UART_DEVPATH, SimDevice::Serial);
        os
    }

    /// Register a device node
    pub fn add_node(&mut self, path: &str, kind: SimDevice) {
        self.nodes.insert(path.to_string(), kind);
        match kind {
            SimDevice::Adc => {
                self.adc.entry(path.to_string()).or_default();
            }
            SimDevice::Pwm => {
                self.pwm.entry(path.to_string()).or_default();
            }
            SimDevice::Spi => {
                self.spi.entry(path.to_string()).or_default();
            }
            SimDevice::Serial => {
                self.serial.entry(path.to_string()).or_default();
            }
            SimDevice::I2c => {}
        }
    }

    /// Make `open(path)` fail
    pub fn fail_open(&mut self, path: &str, errno: Errno) {
        self.open_failures.insert(path.to_string(), errno);
    }

    /// Make every ioctl with this command name fail
    pub fn fail_ioctl(&mut self, name: &'static str, errno: Errno) {
        self.ioctl_failures.insert(name, errno);
    }

    /// Make `read`, `write` or `wait` fail
    pub fn fail_io(&mut self, op: &'static str, errno: Errno) {
        self.io_failures.insert(op, errno);
    }

    /// Drop all injected failures
    pub fn clear_failures(&mut self) {
        self.open_failures.clear();
        self.ioctl_failures.clear();
        self.io_failures.clear();
    }

    /// Number of descriptors currently open
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Whether a node is currently open
    pub fn is_open(&self, path: &str) -> bool {
        self.open.values().any(|p| p == path)
    }

    /// Number of `open` calls made for a path
    pub fn opens_of(&self, path: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Open(p) if p == path))
            .count()
    }

    /// Ioctl command names issued, in order
    pub fn ioctl_names(&self) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Ioctl(_, name) => Some(*name),
                _ => None,
            })
            .collect()
    }

    /// ADC state for a node
    pub fn adc_mut(&mut self, path: &str) -> &mut AdcSim {
        self.adc.entry(path.to_string()).or_default()
    }

    /// PWM state for a node
    pub fn pwm(&self, path: &str) -> Option<&PwmSim> {
        self.pwm.get(path)
    }

    /// SPI state for a node
    pub fn spi_mut(&mut self, path: &str) -> &mut SpiSim {
        self.spi.entry(path.to_string()).or_default()
    }

    /// Serial state for a node
    pub fn serial_mut(&mut self, path: &str) -> &mut SerialSim {
        self.serial.entry(path.to_string()).or_default()
    }

    /// Attach an I2C target
    pub fn add_i2c_target(&mut self, addr: u16, memory: Vec<u8>) {
        self.i2c_targets.insert(addr, I2cTarget { memory, pointer: 0 });
    }

    /// Register memory of an I2C target
    pub fn i2c_memory(&self, addr: u16) -> Option<&[u8]> {
        self.i2c_targets.get(&addr).map(|t| t.memory.as_slice())
    }

    /// Messages seen on the I2C bus
    pub fn i2c_log(&self) -> &[I2cRecord] {
        &self.i2c_log
    }

    /// Level driven on a pad (`None` = output off)
    pub fn gpio_level(&self, pad: u8) -> Option<bool> {
        self.gpio_out.get(&pad).copied().flatten()
    }

    /// Last configuration applied to a pad
    pub fn gpio_config_of(&self, pad: u8) -> Option<GpioConfig> {
        self.gpio_cfg.get(&pad).copied()
    }

    /// Level seen on an input pad
    pub fn set_gpio_input(&mut self, pad: u8, high: bool) {
        self.gpio_in.insert(pad, high);
    }

    fn path_of(&self, fd: Fd) -> Result<&str, Errno> {
        self.open.get(&fd.0).map(String::as_str).ok_or(Errno::EBADF)
    }

    fn kind_of(&self, fd: Fd) -> Result<(String, SimDevice), Errno> {
        let path = self.path_of(fd)?;
        let kind = *self.nodes.get(path).ok_or(Errno::ENODEV)?;
        Ok((path.to_string(), kind))
    }

    fn io_failure(&self, op: &'static str) -> Result<(), Errno> {
        match self.io_failures.get(op) {
            Some(errno) => Err(*errno),
            None => Ok(()),
        }
    }

    fn i2c_transfer(&mut self, msgs: &mut [I2cMessage<'_>]) -> Result<(), Errno> {
        // Any absent target fails the whole transfer, as the driver does
        if msgs.iter().any(|m| !self.i2c_targets.contains_key(&m.addr)) {
            return Err(Errno::ENXIO);
        }
        // The first write of a transfer selects the register; later writes are data
        let mut addressed = false;
        for msg in msgs.iter_mut() {
            let target = self.i2c_targets.get_mut(&msg.addr).ok_or(Errno::ENXIO)?;
            let data = match &mut msg.buffer {
                I2cBuffer::Write(buf) => {
                    let payload = match buf.split_first() {
                        Some((&reg, rest)) if !addressed => {
                            target.pointer = reg as usize;
                            addressed = true;
                            rest
                        }
                        _ => &buf[..],
                    };
                    for &byte in payload {
                        if target.pointer >= target.memory.len() {
                            target.memory.resize(target.pointer + 1, 0);
                        }
                        target.memory[target.pointer] = byte;
                        target.pointer += 1;
                    }
                    buf.to_vec()
                }
                I2cBuffer::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = target.memory.get(target.pointer).copied().unwrap_or(0xFF);
                        target.pointer += 1;
                    }
                    vec![0; buf.len()]
                }
            };
            debug_assert!(
                matches!(msg.buffer, I2cBuffer::Read(_)) == (msg.flags & i2c_flags::READ != 0)
            );
            self.i2c_log.push(I2cRecord {
                addr: msg.addr,
                flags: msg.flags,
                frequency: msg.frequency,
                data,
            });
        }
        Ok(())
    }

    fn spi_transfer(&mut self, path: &str, xfer: &mut SpiExchange<'_>) -> Result<(), Errno> {
        if xfer.tx.len() != xfer.rx.len() {
            return Err(Errno::EINVAL);
        }
        let spi = self.spi.entry(path.to_string()).or_default();
        spi.log.push(SpiRecord {
            frequency: xfer.frequency,
            mode: xfer.mode,
            bits: xfer.bits,
            tx: xfer.tx.to_vec(),
        });
        match spi.replies.pop_front() {
            Some(reply) => {
                for (i, byte) in xfer.rx.iter_mut().enumerate() {
                    *byte = reply.get(i).copied().unwrap_or(0);
                }
            }
            None => xfer.rx.copy_from_slice(xfer.tx),
        }
        Ok(())
    }
}

impl Os for SimOs {
    fn open(&mut self, path: &str, _mode: OpenMode) -> Result<Fd, Errno> {
        self.calls.push(Call::Open(path.to_string()));
        if let Some(errno) = self.open_failures.get(path) {
            return Err(*errno);
        }
        if !self.nodes.contains_key(path) {
            return Err(Errno::ENOENT);
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.open.insert(fd, path.to_string());
        Ok(Fd(fd))
    }

    fn close(&mut self, fd: Fd) -> Result<(), Errno> {
        self.calls.push(Call::Close(fd));
        self.open.remove(&fd.0).map(|_| ()).ok_or(Errno::EBADF)
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        self.calls.push(Call::Read(fd));
        self.io_failure("read")?;
        let (path, kind) = self.kind_of(fd)?;
        match kind {
            SimDevice::Adc => {
                let adc = self.adc.entry(path).or_default();
                if adc.empty_reads > 0 {
                    adc.empty_reads -= 1;
                    return Ok(0);
                }
                let sample = adc.samples.pop_front().unwrap_or(adc.level);
                let bytes = sample.to_ne_bytes();
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            SimDevice::Serial => {
                let serial = self.serial.entry(path).or_default();
                let n = buf.len().min(serial.rx.len());
                for (slot, byte) in buf.iter_mut().zip(serial.rx.drain(..n)) {
                    *slot = byte;
                }
                Ok(n)
            }
            _ => Err(Errno::EINVAL),
        }
    }

    fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        self.calls.push(Call::Write(fd, buf.to_vec()));
        self.io_failure("write")?;
        let (path, kind) = self.kind_of(fd)?;
        match kind {
            SimDevice::Serial => {
                self.serial.entry(path).or_default().tx.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(Errno::EINVAL),
        }
    }

    fn wait_readable(&mut self, fd: Fd, timeout: Duration) -> Result<bool, Errno> {
        self.calls.push(Call::Wait(fd, timeout));
        self.io_failure("wait")?;
        let (path, kind) = self.kind_of(fd)?;
        match kind {
            SimDevice::Serial => Ok(!self.serial.entry(path).or_default().rx.is_empty()),
            SimDevice::Adc => Ok(true),
            _ => Ok(false),
        }
    }

    fn ioctl(&mut self, fd: Fd, request: Ioctl<'_>) -> Result<(), Errno> {
        let name = request.name();
        self.calls.push(Call::Ioctl(fd, name));
        if let Some(errno) = self.ioctl_failures.get(name) {
            return Err(*errno);
        }
        let (path, kind) = self.kind_of(fd)?;
        match (kind, request) {
            (SimDevice::Adc, Ioctl::ScuFifoMode(mode)) => {
                self.adc_mut(&path).fifo_mode = Some(mode);
            }
            (SimDevice::Adc, Ioctl::AdcFifoSize(size)) => {
                self.adc_mut(&path).fifo_size = Some(size);
            }
            (SimDevice::Adc, Ioctl::AdcStart) => self.adc_mut(&path).running = true,
            (SimDevice::Adc, Ioctl::AdcStop) => self.adc_mut(&path).running = false,
            (SimDevice::Pwm, Ioctl::PwmSetCharacteristics(info)) => {
                self.pwm.entry(path).or_default().info = Some(*info);
            }
            (SimDevice::Pwm, Ioctl::PwmStart) => {
                let pwm = self.pwm.entry(path).or_default();
                if pwm.info.is_none() {
                    return Err(Errno::EPERM);
                }
                pwm.running = true;
                pwm.starts += 1;
            }
            (SimDevice::Pwm, Ioctl::PwmStop) => {
                self.pwm.entry(path).or_default().running = false;
            }
            (SimDevice::I2c, Ioctl::I2cTransfer(msgs)) => self.i2c_transfer(msgs)?,
            (SimDevice::Spi, Ioctl::SpiTransfer(xfer)) => self.spi_transfer(&path, xfer)?,
            (SimDevice::Serial, Ioctl::GetTermios(termios)) => {
                *termios = self.serial_mut(&path).termios;
            }
            (SimDevice::Serial, Ioctl::SetTermios(termios)) => {
                self.serial_mut(&path).termios = *termios;
            }
            (SimDevice::Serial, Ioctl::Flush) => self.serial_mut(&path).flushes += 1,
            (SimDevice::Serial, Ioctl::SendBreak) => self.serial_mut(&path).breaks += 1,
            (SimDevice::Serial, Ioctl::BytesReadable(count)) => {
                *count = self.serial_mut(&path).rx.len() as i32;
            }
            (SimDevice::Serial, Ioctl::BytesWritable(count)) => {
                *count = self.serial_mut(&path).tx_space;
            }
            _ => return Err(Errno::ENOTTY),
        }
        Ok(())
    }

    fn gpio_config(&mut self, pin: u8, config: GpioConfig) -> Result<(), Errno> {
        self.calls.push(Call::GpioConfig(pin, config));
        self.gpio_cfg.insert(pin, config);
        Ok(())
    }

    fn gpio_write(&mut self, pin: u8, level: Option<bool>) {
        self.calls.push(Call::GpioWrite(pin, level));
        self.gpio_out.insert(pin, level);
    }

    fn gpio_read(&self, pin: u8) -> bool {
        match self.gpio_out.get(&pin).copied().flatten() {
            Some(level) => level,
            None => self.gpio_in.get(&pin).copied().unwrap_or(false),
        }
    }

    fn board_ctl(&mut self, cmd: BoardCtl) -> Result<(), Errno> {
        self.calls.push(Call::BoardCtl(cmd));
        Ok(())
    }
}

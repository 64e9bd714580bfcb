//! ADC channel table
//!
//! The CXD5602 has four low-power and two high-precision ADC inputs, each
//! behind its own device node:
//! - A0..A3: `/dev/lpadc0`..`/dev/lpadc3`
//! - A4, A5: `/dev/hpadc0`, `/dev/hpadc1`
//!
//! A channel is opened once and then stays running; the SCU FIFO is put in
//! overwrite mode so a read always returns a recent sample.

use spresense_hal::adc::AnalogInput;

use crate::error::{Context, Errno, Error};
use crate::os::{Fd, Ioctl, OpenMode, Os};

/// Number of ADC channels
pub const ADC_COUNT: usize = 6;

/// Device node per channel
pub const ADC_DEVPATHS: [&str; ADC_COUNT] = [
    "/dev/lpadc0",
    "/dev/lpadc1",
    "/dev/lpadc2",
    "/dev/lpadc3",
    "/dev/hpadc0",
    "/dev/hpadc1",
];

/// SCU FIFO mode: overwrite the oldest sample when full
const SCU_FIFO_OVERWRITE: u32 = 1;

/// ADC FIFO size in samples
const ADC_FIFO_SIZE: u32 = 2;

/// Largest scaled reading
pub const ADC_MAX: u16 = 1023;

/// Scale a raw signed sample to `0..=ADC_MAX`
pub const fn scale(sample: i16) -> u16 {
    let offset = sample as i32 - i16::MIN as i32;
    let span = i16::MAX as i32 - i16::MIN as i32;
    (offset * ADC_MAX as i32 / span) as u16
}

/// Validated ADC channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcId(u8);

impl AdcId {
    /// Check a scripting channel number
    pub fn new(n: i64) -> Result<Self, Error> {
        if (0..ADC_COUNT as i64).contains(&n) {
            Ok(Self(n as u8))
        } else {
            Err(Error::NoSuchAdc(n))
        }
    }

    /// Channel number
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Device node
    pub const fn devpath(self) -> &'static str {
        ADC_DEVPATHS[self.0 as usize]
    }
}

/// Open descriptors of every ADC channel
#[derive(Debug, Default)]
pub struct AdcBank {
    fds: [Option<Fd>; ADC_COUNT],
}

impl AdcBank {
    pub const fn new() -> Self {
        Self {
            fds: [None; ADC_COUNT],
        }
    }

    /// Whether a channel is open and running
    pub fn is_open(&self, id: AdcId) -> bool {
        self.fds[id.index() as usize].is_some()
    }

    /// Open and start a channel; does nothing if it is already running
    pub fn open<O: Os>(&mut self, os: &mut O, id: AdcId) -> Result<(), Error> {
        if self.is_open(id) {
            return Ok(());
        }

        let fd = os
            .open(id.devpath(), OpenMode::ReadOnly)
            .context("Failed to open adc device")?;

        if let Err(e) = Self::start(os, fd) {
            if os.close(fd).is_err() {
                warn!("adc {=u8}: close after failed start", id.index());
            }
            return Err(e);
        }

        debug!("adc {=u8} started", id.index());
        self.fds[id.index() as usize] = Some(fd);
        Ok(())
    }

    fn start<O: Os>(os: &mut O, fd: Fd) -> Result<(), Error> {
        os.ioctl(fd, Ioctl::ScuFifoMode(SCU_FIFO_OVERWRITE))
            .context("Failed to set SCU FIFO mode")?;
        os.ioctl(fd, Ioctl::AdcFifoSize(ADC_FIFO_SIZE))
            .context("Failed to set ADC FIFO size")?;
        os.ioctl(fd, Ioctl::AdcStart).context("Failed to start ADC")
    }

    /// Raw signed sample
    pub fn read_raw<O: Os>(&self, os: &mut O, id: AdcId) -> Result<i16, Error> {
        let fd = self.fds[id.index() as usize].ok_or(Error::Deinitialized("ADC"))?;
        let mut buf = [0u8; 2];
        loop {
            match os.read(fd, &mut buf) {
                Ok(0) => continue,
                Ok(_) => return Ok(i16::from_ne_bytes(buf)),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(Error::os("Failed to read analog", errno)),
            }
        }
    }

    /// Sample scaled to `0..=1023`
    pub fn read<O: Os>(&self, os: &mut O, id: AdcId) -> Result<u16, Error> {
        self.read_raw(os, id).map(scale)
    }

    /// Stop and close every open channel
    pub fn stop_all<O: Os>(&mut self, os: &mut O) {
        for (n, slot) in self.fds.iter_mut().enumerate() {
            if let Some(fd) = slot.take() {
                if os.ioctl(fd, Ioctl::AdcStop).is_err() {
                    warn!("adc {=usize}: stop failed", n);
                }
                if os.close(fd).is_err() {
                    warn!("adc {=usize}: close failed", n);
                }
            }
        }
    }

    /// Borrow one channel together with the OS
    pub fn channel<'a, O: Os>(&'a self, os: &'a mut O, id: AdcId) -> AdcChannel<'a, O> {
        AdcChannel { os, bank: self, id }
    }
}

/// One ADC channel usable through [`AnalogInput`]
pub struct AdcChannel<'a, O: Os> {
    os: &'a mut O,
    bank: &'a AdcBank,
    id: AdcId,
}

impl<O: Os> AnalogInput for AdcChannel<'_, O> {
    type Error = Error;

    const MAX: u16 = ADC_MAX;

    fn read(&mut self) -> Result<u16, Error> {
        self.bank.read(self.os, self.id)
    }
}

//! I2C bus
//!
//! The board exposes one I2C port (`/dev/i2c0`, D14 = SDA, D15 = SCL).
//! Each request is sent as a single `I2CIOC_TRANSFER` carrying one message
//! per buffer; every message but the last has NOSTOP set so the target
//! sees repeated starts instead of separate transactions.

use heapless::Vec as HVec;
use spresense_hal::i2c::{I2cBus, I2cConfig};

use crate::error::{Context, Error};
use crate::os::{i2c_flags, Fd, I2cBuffer, I2cMessage, Ioctl, OpenMode, Os};

/// Device node of I2C0
pub const I2C_DEVPATH: &str = "/dev/i2c0";

/// Check a scripting port number
pub fn check_port(port: i64) -> Result<(), Error> {
    match port {
        0 => Ok(()),
        _ => Err(Error::I2cPortUnavailable),
    }
}

/// Check a bus frequency
pub fn check_frequency(hz: i64) -> Result<u32, Error> {
    if I2cConfig::is_supported(hz) {
        Ok(hz as u32)
    } else {
        Err(Error::I2cFrequency)
    }
}

/// Register address bytes for the `*_mem` helpers, big-endian
pub fn mem_address(memaddr: u32, addrsize: u32) -> Result<HVec<u8, 2>, Error> {
    let bytes = memaddr.to_be_bytes();
    let len = match addrsize {
        8 => 1,
        16 => 2,
        _ => return Err(Error::Unsupported("addrsize must be 8 or 16")),
    };
    HVec::from_slice(&bytes[4 - len..]).map_err(|_| Error::Unsupported("addrsize must be 8 or 16"))
}

/// I2C0 state
#[derive(Debug)]
pub struct I2cBank {
    fd: Option<Fd>,
    config: I2cConfig,
}

impl Default for I2cBank {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cBank {
    pub const fn new() -> Self {
        Self {
            fd: None,
            config: I2cConfig::FAST,
        }
    }

    /// Whether the bus is open
    pub fn is_initialized(&self) -> bool {
        self.fd.is_some()
    }

    /// Configured bus frequency
    pub fn frequency(&self) -> u32 {
        self.config.frequency
    }

    /// Open the bus on first use and set the frequency
    pub fn init<O: Os>(&mut self, os: &mut O, frequency: u32) -> Result<(), Error> {
        check_frequency(frequency as i64)?;
        if self.fd.is_none() {
            let fd = os
                .open(I2C_DEVPATH, OpenMode::ReadWrite)
                .context("Failed to initialize I2C bus")?;
            self.fd = Some(fd);
            debug!("i2c0 opened");
        }
        self.config.frequency = frequency;
        Ok(())
    }

    /// Close the bus
    pub fn deinit<O: Os>(&mut self, os: &mut O) -> Result<(), Error> {
        if let Some(fd) = self.fd.take() {
            os.close(fd).context("Failed to close I2C bus")?;
        }
        Ok(())
    }

    /// Send every segment to `addr` in one transfer
    ///
    /// Returns the number of bytes written (0 for reads). With `stop` false
    /// the bus is left claimed after the last segment.
    pub fn transfer<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        segments: Vec<I2cBuffer<'_>>,
        stop: bool,
    ) -> Result<usize, Error> {
        let fd = self.fd.ok_or(Error::Deinitialized("I2C"))?;
        let written = segments
            .iter()
            .filter_map(|seg| match seg {
                I2cBuffer::Write(buf) => Some(buf.len()),
                I2cBuffer::Read(_) => None,
            })
            .sum();

        let last = segments.len().saturating_sub(1);
        let mut msgs: Vec<I2cMessage<'_>> = segments
            .into_iter()
            .enumerate()
            .map(|(i, buffer)| {
                let mut flags = 0;
                if matches!(buffer, I2cBuffer::Read(_)) {
                    flags |= i2c_flags::READ;
                }
                if i < last || !stop {
                    flags |= i2c_flags::NOSTOP;
                }
                I2cMessage {
                    frequency: self.config.frequency,
                    addr,
                    flags,
                    buffer,
                }
            })
            .collect();

        trace!("i2c transfer to {=u16:#x}, {=usize} messages", addr, msgs.len());
        os.ioctl(fd, Ioctl::I2cTransfer(&mut msgs))
            .context("I2C transfer failed")?;
        Ok(written)
    }

    /// Addresses in the non-reserved range that acknowledge an empty write
    pub fn scan<O: Os>(&self, os: &mut O) -> Result<Vec<u8>, Error> {
        let mut found = Vec::new();
        for addr in I2cConfig::SCAN_RANGE {
            match self.transfer(os, addr as u16, vec![I2cBuffer::Write(&[])], true) {
                Ok(_) => found.push(addr),
                Err(Error::Os { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Read `buf.len()` bytes from a target
    pub fn readfrom_into<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        buf: &mut [u8],
        stop: bool,
    ) -> Result<(), Error> {
        self.transfer(os, addr, vec![I2cBuffer::Read(buf)], stop)
            .map(|_| ())
    }

    /// Read `n` bytes from a target
    pub fn readfrom<O: Os>(&self, os: &mut O, addr: u16, n: usize, stop: bool) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; n];
        self.readfrom_into(os, addr, &mut buf, stop)?;
        Ok(buf)
    }

    /// Write bytes to a target
    pub fn writeto<O: Os>(&self, os: &mut O, addr: u16, data: &[u8], stop: bool) -> Result<usize, Error> {
        self.transfer(os, addr, vec![I2cBuffer::Write(data)], stop)
    }

    /// Write several buffers back to back
    pub fn writevto<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        parts: &[&[u8]],
        stop: bool,
    ) -> Result<usize, Error> {
        let segments = parts.iter().map(|p| I2cBuffer::Write(*p)).collect();
        self.transfer(os, addr, segments, stop)
    }

    /// Read registers starting at `memaddr`
    pub fn readfrom_mem_into<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        memaddr: u32,
        addrsize: u32,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let reg = mem_address(memaddr, addrsize)?;
        self.transfer(os, addr, vec![I2cBuffer::Write(&reg)], false)?;
        self.readfrom_into(os, addr, buf, true)
    }

    /// Read `n` registers starting at `memaddr`
    pub fn readfrom_mem<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        memaddr: u32,
        addrsize: u32,
        n: usize,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; n];
        self.readfrom_mem_into(os, addr, memaddr, addrsize, &mut buf)?;
        Ok(buf)
    }

    /// Write registers starting at `memaddr`
    pub fn writeto_mem<O: Os>(
        &self,
        os: &mut O,
        addr: u16,
        memaddr: u32,
        addrsize: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        let reg = mem_address(memaddr, addrsize)?;
        self.transfer(
            os,
            addr,
            vec![I2cBuffer::Write(&reg), I2cBuffer::Write(data)],
            true,
        )
        .map(|_| ())
    }

    /// Borrow the bus together with the OS
    pub fn bus<'a, O: Os>(&'a self, os: &'a mut O) -> I2c<'a, O> {
        I2c { os, bank: self }
    }
}

/// I2C0 usable through [`I2cBus`] and `embedded-hal`
pub struct I2c<'a, O: Os> {
    os: &'a mut O,
    bank: &'a I2cBank,
}

impl<O: Os> I2cBus for I2c<'_, O> {
    type Error = Error;

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        self.bank.writeto(self.os, address, data, true).map(|_| ())
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Error> {
        self.bank.readfrom_into(self.os, address, buf, true)
    }

    fn write_read(&mut self, address: u16, out: &[u8], buf: &mut [u8]) -> Result<(), Error> {
        self.bank
            .transfer(
                self.os,
                address,
                vec![I2cBuffer::Write(out), I2cBuffer::Read(buf)],
                true,
            )
            .map(|_| ())
    }
}

impl<O: Os> embedded_hal::i2c::ErrorType for I2c<'_, O> {
    type Error = Error;
}

impl<O: Os> embedded_hal::i2c::I2c for I2c<'_, O> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        use embedded_hal::i2c::Operation;

        let segments = operations
            .iter_mut()
            .map(|op| match op {
                Operation::Read(buf) => I2cBuffer::Read(&mut **buf),
                Operation::Write(buf) => I2cBuffer::Write(*buf),
            })
            .collect();
        self.bank
            .transfer(self.os, address as u16, segments, true)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errno;
    use crate::sim::{I2cRecord, SimOs};

    fn ready() -> (SimOs, I2cBank) {
        let mut os = SimOs::spresense();
        let mut bank = I2cBank::new();
        bank.init(&mut os, 400_000).unwrap();
        (os, bank)
    }

    #[test]
    fn test_port_and_frequency_checks() {
        assert!(check_port(0).is_ok());
        assert_eq!(check_port(1), Err(Error::I2cPortUnavailable));
        assert_eq!(check_frequency(100_000), Ok(100_000));
        assert_eq!(check_frequency(400_000), Ok(400_000));
        assert_eq!(check_frequency(1_000_000), Err(Error::I2cFrequency));
    }

    #[test]
    fn test_reinit_updates_frequency_only() {
        let (mut os, mut bank) = ready();
        bank.init(&mut os, 100_000).unwrap();
        assert_eq!(bank.frequency(), 100_000);
        assert_eq!(os.opens_of(I2C_DEVPATH), 1);
    }

    #[test]
    fn test_write_flags_and_count() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x48, vec![0; 8]);
        let n = bank
            .writevto(&mut os, 0x48, &[&[2], &[0x11, 0x22]], true)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(
            os.i2c_log(),
            &[
                I2cRecord {
                    addr: 0x48,
                    flags: i2c_flags::NOSTOP,
                    frequency: 400_000,
                    data: vec![2]
                },
                I2cRecord {
                    addr: 0x48,
                    flags: 0,
                    frequency: 400_000,
                    data: vec![0x11, 0x22]
                },
            ]
        );
        assert_eq!(os.ioctl_names(), vec!["I2CIOC_TRANSFER"]);
    }

    #[test]
    fn test_read_sets_read_flag() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x10, vec![7, 8, 9]);
        let data = bank.readfrom(&mut os, 0x10, 2, true).unwrap();
        assert_eq!(data, vec![7, 8]);
        assert_eq!(os.i2c_log()[0].flags, i2c_flags::READ);
    }

    #[test]
    fn test_mem_helpers() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x50, vec![0; 16]);
        bank.writeto_mem(&mut os, 0x50, 4, 8, &[0xDE, 0xAD]).unwrap();
        assert_eq!(
            bank.readfrom_mem(&mut os, 0x50, 4, 8, 2).unwrap(),
            vec![0xDE, 0xAD]
        );
        assert_eq!(os.i2c_memory(0x50).unwrap()[4..6], [0xDE, 0xAD]);
    }

    #[test]
    fn test_mem_address_sizes() {
        assert_eq!(mem_address(0x1234, 16).unwrap().as_slice(), &[0x12, 0x34]);
        assert_eq!(mem_address(0x1234, 8).unwrap().as_slice(), &[0x34]);
        assert!(mem_address(0, 24).is_err());
    }

    #[test]
    fn test_scan() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x3C, vec![]);
        os.add_i2c_target(0x68, vec![]);
        os.add_i2c_target(0x03, vec![]);
        assert_eq!(bank.scan(&mut os).unwrap(), vec![0x3C, 0x68]);
    }

    #[test]
    fn test_nack_propagates_errno() {
        let (mut os, bank) = ready();
        let err = bank.writeto(&mut os, 0x22, &[1], true).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ENXIO));
    }

    #[test]
    fn test_transfer_on_deinitialized() {
        let (mut os, mut bank) = ready();
        bank.deinit(&mut os).unwrap();
        assert_eq!(
            bank.writeto(&mut os, 0x22, &[1], true),
            Err(Error::Deinitialized("I2C"))
        );
        assert_eq!(
            Error::Deinitialized("I2C").to_string(),
            "transfer on deinitialized I2C"
        );
    }

    #[test]
    fn test_bus_trait_register_access() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x48, vec![0x11, 0x22, 0x33, 0x44]);
        let mut bus = bank.bus(&mut os);
        assert!(bus.acknowledges(0x48));
        assert!(!bus.acknowledges(0x49));

        I2cBus::write(&mut bus, 0x48, &[2, 0xAB]).unwrap();
        let mut reg = [0u8; 1];
        I2cBus::write_read(&mut bus, 0x48, &[2], &mut reg).unwrap();
        assert_eq!(reg, [0xAB]);
        // continues from the register after the last one read
        let mut next = [0u8; 2];
        I2cBus::read(&mut bus, 0x48, &mut next).unwrap();
        assert_eq!(next, [0x44, 0xFF]);

        assert_eq!(os.i2c_memory(0x48).unwrap(), &[0x11, 0x22, 0xAB, 0x44]);
        assert!(os.i2c_log().iter().all(|r| r.frequency == 400_000));
    }

    #[test]
    fn test_embedded_hal_write_read() {
        let (mut os, bank) = ready();
        os.add_i2c_target(0x76, vec![0, 0x58, 0]);
        let mut id = [0u8; 1];
        let mut bus = bank.bus(&mut os);
        embedded_hal::i2c::I2c::write_read(&mut bus, 0x76, &[1], &mut id).unwrap();
        assert_eq!(id, [0x58]);
    }
}

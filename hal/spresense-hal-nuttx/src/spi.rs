//! SPI buses
//!
//! Two SPI ports are usable from scripts:
//! - SPI4: `/dev/spi4` (D10..D13 on the main board header)
//! - SPI5: `/dev/spi5`
//!
//! The NuttX driver always shifts MSB first, so LSB-first transfers are
//! done by bit-reversing every byte on the way out and on the way in.

use spresense_hal::spi::{BitOrder, Phase, Polarity, SpiBus, SpiConfig};

use crate::error::{Context, Error};
use crate::os::{Fd, Ioctl, OpenMode, Os, SpiExchange};

/// Number of SPI slots
pub const SPI_COUNT: usize = 2;

/// Device node per slot
pub const SPI_DEVPATHS: [&str; SPI_COUNT] = ["/dev/spi4", "/dev/spi5"];

/// Port number of the first slot
const FIRST_PORT: i64 = 4;

/// Reverse the bit order of one byte
pub const fn reverse_bits(byte: u8) -> u8 {
    byte.reverse_bits()
}

/// SPI slot, validated from a scripting port number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiId(u8);

impl SpiId {
    /// Map a port number (4 or 5) to its slot
    pub fn new(port: i64) -> Result<Self, Error> {
        match port {
            4 | 5 => Ok(Self((port - FIRST_PORT) as u8)),
            _ => Err(Error::NoSuchSpi(port)),
        }
    }

    /// Slot index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Port number as scripts see it
    pub const fn port(self) -> u8 {
        self.0 + FIRST_PORT as u8
    }

    /// Device node
    pub const fn devpath(self) -> &'static str {
        SPI_DEVPATHS[self.0 as usize]
    }
}

/// Settings given to [`SpiBank::init`]; `None` keeps the stored value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpiParams {
    pub frequency: Option<u32>,
    pub polarity: Option<Polarity>,
    pub phase: Option<Phase>,
    pub bits: Option<u8>,
    pub bit_order: Option<BitOrder>,
}

impl SpiParams {
    /// Every setting taken from `config`
    pub fn from_config(config: SpiConfig) -> Self {
        Self {
            frequency: Some(config.frequency),
            polarity: Some(config.polarity),
            phase: Some(config.phase),
            bits: Some(config.bits),
            bit_order: Some(config.bit_order),
        }
    }
}

#[derive(Debug, Default)]
struct SpiSlot {
    fd: Option<Fd>,
    config: SpiConfig,
}

/// State of both SPI slots
#[derive(Debug, Default)]
pub struct SpiBank {
    slots: [SpiSlot; SPI_COUNT],
}

impl SpiBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored configuration of a slot
    pub fn config(&self, id: SpiId) -> SpiConfig {
        self.slots[id.index() as usize].config
    }

    /// Whether the slot's device is open
    pub fn is_initialized(&self, id: SpiId) -> bool {
        self.slots[id.index() as usize].fd.is_some()
    }

    /// Open the bus on first use and apply the given settings
    pub fn init<O: Os>(&mut self, os: &mut O, id: SpiId, params: SpiParams) -> Result<(), Error> {
        if let Some(bits) = params.bits {
            if bits != 8 && bits != 16 {
                return Err(Error::SpiBits);
            }
        }

        let slot = &mut self.slots[id.index() as usize];
        if slot.fd.is_none() {
            let fd = os
                .open(id.devpath(), OpenMode::ReadWrite)
                .context("Failed to initialize SPI bus")?;
            slot.fd = Some(fd);
            debug!("spi{=u8} opened", id.port());
        }

        let config = &mut slot.config;
        if let Some(hz) = params.frequency {
            config.frequency = hz;
        }
        if let Some(polarity) = params.polarity {
            config.polarity = polarity;
        }
        if let Some(phase) = params.phase {
            config.phase = phase;
        }
        if let Some(bits) = params.bits {
            config.bits = bits;
        }
        if let Some(order) = params.bit_order {
            config.bit_order = order;
        }
        Ok(())
    }

    /// Close the bus
    pub fn deinit<O: Os>(&mut self, os: &mut O, id: SpiId) -> Result<(), Error> {
        if let Some(fd) = self.slots[id.index() as usize].fd.take() {
            os.close(fd).context("Failed to close SPI bus")?;
        }
        Ok(())
    }

    /// Close every open bus
    pub fn deinit_all<O: Os>(&mut self, os: &mut O) {
        for n in 0..SPI_COUNT as u8 {
            if self.deinit(os, SpiId(n)).is_err() {
                warn!("spi slot {=u8}: deinit failed", n);
            }
        }
    }

    /// Clock `tx` out while clocking `rx` in
    ///
    /// `tx` is left untouched even for LSB-first transfers.
    pub fn transfer<O: Os>(&self, os: &mut O, id: SpiId, tx: &[u8], rx: &mut [u8]) -> Result<(), Error> {
        let slot = &self.slots[id.index() as usize];
        let fd = slot.fd.ok_or(Error::Deinitialized("SPI"))?;
        if tx.len() != rx.len() {
            return Err(Error::Unsupported("buffers must be the same length"));
        }
        let config = slot.config;
        let lsb_first = config.bit_order == BitOrder::LsbFirst;

        let scratch: Vec<u8>;
        let out = if lsb_first {
            scratch = tx.iter().copied().map(reverse_bits).collect();
            &scratch[..]
        } else {
            tx
        };

        let mut exchange = SpiExchange {
            frequency: config.frequency,
            mode: config.mode().number(),
            bits: config.bits,
            tx: out,
            rx: &mut *rx,
        };
        os.ioctl(fd, Ioctl::SpiTransfer(&mut exchange))
            .context("SPI transfer failed")?;

        if lsb_first {
            for byte in rx.iter_mut() {
                *byte = reverse_bits(*byte);
            }
        }
        Ok(())
    }

    /// Write bytes, discarding what comes back
    pub fn write<O: Os>(&self, os: &mut O, id: SpiId, data: &[u8]) -> Result<(), Error> {
        let mut sink = vec![0; data.len()];
        self.transfer(os, id, data, &mut sink)
    }

    /// Read into `buf` while sending `fill`
    pub fn read_into<O: Os>(&self, os: &mut O, id: SpiId, buf: &mut [u8], fill: u8) -> Result<(), Error> {
        let out = vec![fill; buf.len()];
        self.transfer(os, id, &out, buf)
    }

    /// Borrow one bus together with the OS
    pub fn bus<'a, O: Os>(&'a self, os: &'a mut O, id: SpiId) -> Spi<'a, O> {
        Spi { os, bank: self, id }
    }
}

/// One SPI bus usable through [`SpiBus`] and `embedded-hal`
pub struct Spi<'a, O: Os> {
    os: &'a mut O,
    bank: &'a SpiBank,
    id: SpiId,
}

impl<O: Os> SpiBus for Spi<'_, O> {
    type Error = Error;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Error> {
        self.bank.transfer(self.os, self.id, write, read)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.bank.write(self.os, self.id, data)
    }

    fn read(&mut self, buf: &mut [u8], fill: u8) -> Result<(), Error> {
        self.bank.read_into(self.os, self.id, buf, fill)
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Error> {
        let out = data.to_vec();
        self.bank.transfer(self.os, self.id, &out, data)
    }
}

impl<O: Os> embedded_hal::spi::ErrorType for Spi<'_, O> {
    type Error = Error;
}

impl<O: Os> embedded_hal::spi::SpiBus for Spi<'_, O> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.bank.read_into(self.os, self.id, words, 0)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.bank.write(self.os, self.id, words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        // embedded-hal allows unequal lengths: pad the shorter side
        let len = read.len().max(write.len());
        let mut out = write.to_vec();
        out.resize(len, 0);
        let mut input = vec![0; len];
        self.bank.transfer(self.os, self.id, &out, &mut input)?;
        read.copy_from_slice(&input[..read.len()]);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let out = words.to_vec();
        self.bank.transfer(self.os, self.id, &out, words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimOs, SpiRecord};
    use proptest::prelude::*;

    fn ready(port: i64, params: SpiParams) -> (SimOs, SpiBank, SpiId) {
        let mut os = SimOs::spresense();
        let mut bank = SpiBank::new();
        let id = SpiId::new(port).unwrap();
        bank.init(&mut os, id, params).unwrap();
        (os, bank, id)
    }

    #[test]
    fn test_port_mapping() {
        assert_eq!(SpiId::new(4).unwrap().index(), 0);
        assert_eq!(SpiId::new(5).unwrap().devpath(), "/dev/spi5");
        assert_eq!(SpiId::new(3), Err(Error::NoSuchSpi(3)));
        assert_eq!(SpiId::new(6), Err(Error::NoSuchSpi(6)));
        assert_eq!(Error::NoSuchSpi(0).to_string(), "SPI(0) does not exist");
    }

    #[test]
    fn test_bits_validated() {
        let mut os = SimOs::spresense();
        let mut bank = SpiBank::new();
        let params = SpiParams {
            bits: Some(12),
            ..SpiParams::default()
        };
        assert_eq!(
            bank.init(&mut os, SpiId::new(4).unwrap(), params),
            Err(Error::SpiBits)
        );
        assert_eq!(os.open_count(), 0);
    }

    #[test]
    fn test_init_merges_and_reuses_fd() {
        let (mut os, mut bank, id) = ready(4, SpiParams::from_config(SpiConfig::default()));
        let params = SpiParams {
            polarity: Some(Polarity::IdleHigh),
            phase: Some(Phase::CaptureOnSecondTransition),
            ..SpiParams::default()
        };
        bank.init(&mut os, id, params).unwrap();

        let config = bank.config(id);
        assert_eq!(config.frequency, 500_000);
        assert_eq!(config.mode().number(), 3);
        assert_eq!(os.opens_of("/dev/spi4"), 1);
    }

    #[test]
    fn test_exchange_carries_config() {
        let (mut os, bank, id) = ready(5, SpiParams::from_config(SpiConfig::default()));
        os.spi_mut("/dev/spi5").replies.push_back(vec![0xAA, 0x55]);
        let mut rx = [0u8; 2];
        bank.transfer(&mut os, id, &[1, 2], &mut rx).unwrap();

        assert_eq!(rx, [0xAA, 0x55]);
        assert_eq!(
            os.spi_mut("/dev/spi5").log,
            vec![SpiRecord {
                frequency: 500_000,
                mode: 0,
                bits: 8,
                tx: vec![1, 2]
            }]
        );
    }

    #[test]
    fn test_lsb_first_reverses_both_ways() {
        let params = SpiParams {
            bit_order: Some(BitOrder::LsbFirst),
            ..SpiParams::default()
        };
        let (mut os, bank, id) = ready(4, params);
        os.spi_mut("/dev/spi4").replies.push_back(vec![0x80]);

        let tx = [0x01u8];
        let mut rx = [0u8; 1];
        bank.transfer(&mut os, id, &tx, &mut rx).unwrap();

        assert_eq!(tx, [0x01]);
        assert_eq!(os.spi_mut("/dev/spi4").log[0].tx, vec![0x80]);
        assert_eq!(rx, [0x01]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let (mut os, bank, id) = ready(4, SpiParams::default());
        let mut rx = [0u8; 1];
        assert!(bank.transfer(&mut os, id, &[1, 2], &mut rx).is_err());
    }

    #[test]
    fn test_transfer_on_deinitialized() {
        let (mut os, mut bank, id) = ready(4, SpiParams::default());
        bank.deinit(&mut os, id).unwrap();
        assert_eq!(
            bank.write(&mut os, id, &[1]),
            Err(Error::Deinitialized("SPI"))
        );
        assert_eq!(os.open_count(), 0);
    }

    #[test]
    fn test_read_sends_fill() {
        let (mut os, bank, id) = ready(4, SpiParams::default());
        let mut buf = [0u8; 3];
        bank.read_into(&mut os, id, &mut buf, 0xFF).unwrap();
        assert_eq!(os.spi_mut("/dev/spi4").log[0].tx, vec![0xFF; 3]);
        // Loopback
        assert_eq!(buf, [0xFF; 3]);
    }

    #[test]
    fn test_bus_trait_exchanges() {
        let (mut os, bank, id) = ready(5, SpiParams::default());
        os.spi_mut("/dev/spi5").replies.push_back(vec![0xC2, 0x20]);
        let mut bus = bank.bus(&mut os, id);

        let mut frame = [0x9F, 0x00];
        SpiBus::transfer_in_place(&mut bus, &mut frame).unwrap();
        assert_eq!(frame, [0xC2, 0x20]);

        SpiBus::write(&mut bus, &[0x06]).unwrap();
        let mut status = [0u8; 2];
        SpiBus::read(&mut bus, &mut status, 0xA5).unwrap();
        assert_eq!(status, [0xA5, 0xA5]);

        let sent: Vec<Vec<u8>> = os.spi_mut("/dev/spi5").log.iter().map(|r| r.tx.clone()).collect();
        assert_eq!(sent, vec![vec![0x9F, 0x00], vec![0x06], vec![0xA5, 0xA5]]);
    }

    #[test]
    fn test_embedded_hal_unequal_transfer() {
        let (mut os, bank, id) = ready(4, SpiParams::default());
        let mut bus = bank.bus(&mut os, id);
        let mut read = [0u8; 1];
        embedded_hal::spi::SpiBus::transfer(&mut bus, &mut read, &[9, 8, 7]).unwrap();
        assert_eq!(read, [9]);
    }

    proptest! {
        #[test]
        fn test_reverse_bits_is_involution(byte: u8) {
            prop_assert_eq!(reverse_bits(reverse_bits(byte)), byte);
            prop_assert_eq!(reverse_bits(byte).count_ones(), byte.count_ones());
        }
    }
}

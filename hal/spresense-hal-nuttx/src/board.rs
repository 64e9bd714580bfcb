//! Board state
//!
//! [`Board`] owns the OS handle and one table per peripheral class. Banks
//! are public fields so callers can borrow a bank and the OS at the same
//! time (`board.adc.read(&mut board.os, id)`).

use crate::adc::AdcBank;
use crate::error::Error;
use crate::gpio::{Pin, PinBank};
use crate::i2c::I2cBank;
use crate::os::{BoardCtl, Os};
use crate::pins::PinId;
use crate::pwm::PwmBank;
use crate::spi::SpiBank;

/// Spresense peripherals on top of an [`Os`]
#[derive(Debug)]
pub struct Board<O: Os> {
    pub os: O,
    pub pins: PinBank,
    pub adc: AdcBank,
    pub pwm: PwmBank,
    pub i2c: I2cBank,
    pub spi: SpiBank,
}

impl<O: Os> Board<O> {
    /// Board with every channel closed
    pub fn new(os: O) -> Self {
        Self {
            os,
            pins: PinBank::new(),
            adc: AdcBank::new(),
            pwm: PwmBank::new(),
            i2c: I2cBank::new(),
            spi: SpiBank::new(),
        }
    }

    /// Run the board's late initialization (`BOARDIOC_INIT`)
    pub fn init(&mut self) -> Result<(), Error> {
        self.os
            .board_ctl(BoardCtl::Init)
            .map_err(|errno| Error::os("board initialization failed", errno))
    }

    /// Borrow one pin
    pub fn pin(&mut self, id: PinId) -> Pin<'_, O> {
        self.pins.pin(&mut self.os, id)
    }

    /// Release every peripheral and return pins to inputs
    ///
    /// Failures on individual channels are logged and skipped so one bad
    /// descriptor cannot keep the rest open.
    pub fn reset(&mut self) {
        info!("board reset");
        self.adc.stop_all(&mut self.os);
        self.pwm.deinit_all(&mut self.os);
        if self.i2c.deinit(&mut self.os).is_err() {
            warn!("i2c: deinit failed");
        }
        self.spi.deinit_all(&mut self.os);
        if self.pins.reset(&mut self.os).is_err() {
            warn!("pins: reset failed");
        }
    }

    /// Give the OS back
    pub fn into_os(self) -> O {
        self.os
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::AdcId;
    use crate::pwm::PwmId;
    use crate::sim::{Call, SimOs};
    use crate::spi::{SpiId, SpiParams};
    use spresense_hal::gpio::PinMode;

    #[test]
    fn test_init_issues_boardctl() {
        let mut board = Board::new(SimOs::spresense());
        board.init().unwrap();
        assert_eq!(board.os.calls, vec![Call::BoardCtl(BoardCtl::Init)]);
    }

    #[test]
    fn test_reset_releases_everything() {
        let mut board = Board::new(SimOs::spresense());
        let os = &mut board.os;
        board.adc.open(os, AdcId::new(0).unwrap()).unwrap();
        let pwm = PwmId::for_pin(PinId::new(6).unwrap()).unwrap();
        board.pwm.init(os, pwm, Some(1000), Some(0x8000)).unwrap();
        board.i2c.init(os, 400_000).unwrap();
        board
            .spi
            .init(os, SpiId::new(4).unwrap(), SpiParams::default())
            .unwrap();
        board.pins.output(os, PinId::LED0).unwrap();
        assert_eq!(board.os.open_count(), 4);

        board.reset();

        assert_eq!(board.os.open_count(), 0);
        assert!(!board.pwm.state(pwm).active);
        assert!(!board.i2c.is_initialized());
        assert_eq!(board.pins.state(PinId::LED0).mode, PinMode::Input);
        assert!(!board.os.pwm("/dev/pwm0").unwrap().running);
    }

    #[test]
    fn test_pin_view() {
        use spresense_hal::gpio::{DigitalInput, DigitalOutput};

        let mut board = Board::new(SimOs::spresense());
        board.pins.output(&mut board.os, PinId::LED0).unwrap();
        let mut led = board.pin(PinId::LED0);
        led.drive(true).unwrap();
        assert!(led.driven());
        assert!(led.level());
        led.toggle().unwrap();
        assert!(!led.driven());
        assert!(!led.level());
    }
}

//! PWM channel table
//!
//! Four PWM outputs, one per PWM pad:
//! - PWM0: D06
//! - PWM1: D05
//! - PWM2: D09
//! - PWM3: D03
//!
//! Frequency and duty are held until both are non-zero; only then are the
//! characteristics written and the output started.

use spresense_hal::pwm::{PwmConfig, PwmOutput};

use crate::error::{Context, Error};
use crate::os::{Fd, Ioctl, OpenMode, Os, PwmInfo};
use crate::pins::{PinId, PWM_PINS};

/// Number of PWM channels
pub const PWM_COUNT: usize = 4;

/// Device node per channel
pub const PWM_DEVPATHS: [&str; PWM_COUNT] = ["/dev/pwm0", "/dev/pwm1", "/dev/pwm2", "/dev/pwm3"];

/// PWM channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmId(u8);

impl PwmId {
    /// Channel wired to a pin
    pub fn for_pin(pin: PinId) -> Result<Self, Error> {
        PWM_PINS
            .iter()
            .position(|&code| code == pin.code())
            .map(|ch| Self(ch as u8))
            .ok_or(Error::NoPwmOnPin)
    }

    /// Channel by number
    pub fn from_index(n: usize) -> Option<Self> {
        (n < PWM_COUNT).then_some(Self(n as u8))
    }

    /// Channel number
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Device node
    pub const fn devpath(self) -> &'static str {
        PWM_DEVPATHS[self.0 as usize]
    }
}

/// State of one PWM channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmState {
    pub fd: Option<Fd>,
    /// Channel has been initialized and not deinitialized since
    pub active: bool,
    pub config: PwmConfig,
    /// Output started
    pub running: bool,
}

/// State of every PWM channel
#[derive(Debug, Default)]
pub struct PwmBank {
    channels: [PwmState; PWM_COUNT],
}

impl PwmBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a channel
    pub fn state(&self, id: PwmId) -> PwmState {
        self.channels[id.index() as usize]
    }

    /// Activate a channel, storing any given frequency and duty
    pub fn init<O: Os>(
        &mut self,
        os: &mut O,
        id: PwmId,
        frequency: Option<u32>,
        duty: Option<u32>,
    ) -> Result<(), Error> {
        let ch = &mut self.channels[id.index() as usize];
        if ch.fd.is_none() {
            let fd = os
                .open(id.devpath(), OpenMode::ReadOnly)
                .context("Failed to open pwm device")?;
            ch.fd = Some(fd);
        }
        ch.active = true;
        if let Some(hz) = frequency {
            ch.config.frequency = hz;
        }
        if let Some(duty) = duty {
            ch.config.duty = duty;
        }
        self.apply(os, id)
    }

    /// Change the frequency
    pub fn set_frequency<O: Os>(&mut self, os: &mut O, id: PwmId, hz: u32) -> Result<(), Error> {
        self.fd(id)?;
        self.channels[id.index() as usize].config.frequency = hz;
        self.apply(os, id)
    }

    /// Change the duty (16.16 fraction)
    pub fn set_duty<O: Os>(&mut self, os: &mut O, id: PwmId, duty: u32) -> Result<(), Error> {
        self.fd(id)?;
        self.channels[id.index() as usize].config.duty = duty;
        self.apply(os, id)
    }

    fn fd(&self, id: PwmId) -> Result<Fd, Error> {
        self.channels[id.index() as usize]
            .fd
            .ok_or(Error::Deinitialized("PWM"))
    }

    fn apply<O: Os>(&mut self, os: &mut O, id: PwmId) -> Result<(), Error> {
        let fd = self.fd(id)?;
        let ch = &mut self.channels[id.index() as usize];
        if !ch.config.is_runnable() {
            return Ok(());
        }

        let info = PwmInfo {
            frequency: ch.config.frequency,
            duty: ch.config.duty,
        };
        os.ioctl(fd, Ioctl::PwmSetCharacteristics(&info))
            .context("Failed to set PWM characteristics")?;
        if !ch.running {
            os.ioctl(fd, Ioctl::PwmStart).context("Failed to start PWM")?;
            ch.running = true;
            debug!("pwm {=u8} started at {=u32} Hz", id.index(), info.frequency);
        }
        Ok(())
    }

    /// Stop the output and release the channel
    pub fn deinit<O: Os>(&mut self, os: &mut O, id: PwmId) -> Result<(), Error> {
        let ch = &mut self.channels[id.index() as usize];
        let state = core::mem::take(ch);
        let Some(fd) = state.fd else {
            return Ok(());
        };
        // close even when STOP fails, the slot is already cleared
        let stopped = if state.running {
            os.ioctl(fd, Ioctl::PwmStop)
        } else {
            Ok(())
        };
        let closed = os.close(fd);
        stopped.context("Failed to stop PWM")?;
        closed.context("Failed to close pwm device")
    }

    /// Deinitialize every channel
    pub fn deinit_all<O: Os>(&mut self, os: &mut O) {
        for n in 0..PWM_COUNT as u8 {
            if self.deinit(os, PwmId(n)).is_err() {
                warn!("pwm {=u8}: deinit failed", n);
            }
        }
    }

    /// Borrow one channel together with the OS
    pub fn channel<'a, O: Os>(&'a mut self, os: &'a mut O, id: PwmId) -> PwmChannel<'a, O> {
        PwmChannel { os, bank: self, id }
    }
}

/// One PWM channel usable through [`PwmOutput`]
pub struct PwmChannel<'a, O: Os> {
    os: &'a mut O,
    bank: &'a mut PwmBank,
    id: PwmId,
}

impl<O: Os> PwmOutput for PwmChannel<'_, O> {
    type Error = Error;

    fn frequency(&self) -> u32 {
        self.bank.state(self.id).config.frequency
    }

    fn duty(&self) -> u32 {
        self.bank.state(self.id).config.duty
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Error> {
        self.bank.set_frequency(self.os, self.id, hz)
    }

    fn set_duty(&mut self, duty: u32) -> Result<(), Error> {
        self.bank.set_duty(self.os, self.id, duty)
    }

    fn disable(&mut self) -> Result<(), Error> {
        self.bank.deinit(self.os, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errno;
    use crate::sim::SimOs;

    fn ch_for(n: i64) -> PwmId {
        PwmId::for_pin(PinId::new(n).unwrap()).unwrap()
    }

    #[test]
    fn test_channel_for_pin() {
        assert_eq!(ch_for(6).index(), 0);
        assert_eq!(ch_for(5).index(), 1);
        assert_eq!(ch_for(9).index(), 2);
        assert_eq!(ch_for(3).index(), 3);
        assert_eq!(
            PwmId::for_pin(PinId::new(4).unwrap()),
            Err(Error::NoPwmOnPin)
        );
    }

    #[test]
    fn test_init_without_duty_holds() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(6);
        bank.init(&mut os, id, Some(1000), None).unwrap();

        assert!(bank.state(id).active);
        assert!(!bank.state(id).running);
        assert!(os.ioctl_names().is_empty());
    }

    #[test]
    fn test_start_once_both_set() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(6);
        bank.init(&mut os, id, Some(1000), None).unwrap();
        bank.set_duty(&mut os, id, 0x8000).unwrap();
        bank.set_frequency(&mut os, id, 2000).unwrap();

        assert_eq!(
            os.ioctl_names(),
            vec![
                "PWMIOC_SETCHARACTERISTICS",
                "PWMIOC_START",
                "PWMIOC_SETCHARACTERISTICS",
            ]
        );
        let pwm = os.pwm("/dev/pwm0").unwrap();
        assert_eq!(pwm.info, Some(PwmInfo { frequency: 2000, duty: 0x8000 }));
        assert_eq!(pwm.starts, 1);
    }

    #[test]
    fn test_reinit_reuses_fd() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(3);
        bank.init(&mut os, id, Some(50), Some(100)).unwrap();
        bank.init(&mut os, id, None, None).unwrap();
        assert_eq!(os.opens_of("/dev/pwm3"), 1);
    }

    #[test]
    fn test_deinit_stops_and_closes() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(9);
        bank.init(&mut os, id, Some(500), Some(0x4000)).unwrap();
        bank.deinit(&mut os, id).unwrap();

        assert_eq!(bank.state(id), PwmState::default());
        assert!(!os.pwm("/dev/pwm2").unwrap().running);
        assert_eq!(os.open_count(), 0);
        assert_eq!(
            bank.set_duty(&mut os, id, 1),
            Err(Error::Deinitialized("PWM"))
        );
    }

    #[test]
    fn test_deinit_closes_after_failed_stop() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(6);
        bank.init(&mut os, id, Some(1000), Some(0x8000)).unwrap();
        os.fail_ioctl("PWMIOC_STOP", Errno::EIO);

        let err = bank.deinit(&mut os, id).unwrap_err();
        assert_eq!(err, Error::os("Failed to stop PWM", Errno::EIO));
        assert_eq!(bank.state(id).fd, None);
        assert_eq!(os.open_count(), 0);
    }

    #[test]
    fn test_reset_closes_after_failed_stop() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        bank.init(&mut os, ch_for(6), Some(1000), Some(10)).unwrap();
        bank.init(&mut os, ch_for(3), Some(2000), Some(20)).unwrap();
        os.fail_ioctl("PWMIOC_STOP", Errno::EIO);

        bank.deinit_all(&mut os);
        assert_eq!(os.open_count(), 0);
    }

    #[test]
    fn test_open_failure() {
        let mut os = SimOs::spresense();
        os.fail_open("/dev/pwm1", Errno::EBUSY);
        let err = PwmBank::new()
            .init(&mut os, ch_for(5), None, None)
            .unwrap_err();
        assert_eq!(err, Error::os("Failed to open pwm device", Errno::EBUSY));
    }

    #[test]
    fn test_pwm_output_view() {
        let mut os = SimOs::spresense();
        let mut bank = PwmBank::new();
        let id = ch_for(5);
        bank.init(&mut os, id, None, None).unwrap();

        let mut pwm = bank.channel(&mut os, id);
        pwm.set_frequency(440).unwrap();
        pwm.set_duty(PwmConfig::DUTY_MAX).unwrap();
        assert_eq!(pwm.frequency(), 440);
        assert_eq!(pwm.duty(), PwmConfig::DUTY_MAX);
        pwm.disable().unwrap();
        assert!(!bank.state(id).active);
    }
}

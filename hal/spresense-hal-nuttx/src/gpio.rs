//! GPIO pin bank
//!
//! Pins are configured through `board_gpio_config` and driven with
//! `board_gpio_write`. The bank remembers each pin's direction and pull so
//! a reconfiguration that leaves one of them out keeps the old setting.
//!
//! Every pin uses high drive. Before a pin is reconfigured its output
//! driver is turned off, so switching direction never glitches the line.

use spresense_hal::gpio::{DigitalInput, DigitalOutput, PinMode, Pull};

use crate::error::{Context, Error};
use crate::os::{GpioConfig, Os, PadPull};
use crate::pins::{PinId, PIN_COUNT};

/// Remembered configuration of one pin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinState {
    pub mode: PinMode,
    pub pull: Pull,
}

/// Pull argument of [`PinBank::configure`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullArg {
    /// Keep whatever pull the pin has
    #[default]
    Unchanged,
    /// Replace the pull
    Set(Pull),
}

/// Direction and pull of every pin in the board table
#[derive(Debug)]
pub struct PinBank {
    states: [PinState; PIN_COUNT],
    driven: [bool; PIN_COUNT],
}

impl Default for PinBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PinBank {
    /// All pins floating inputs
    pub const fn new() -> Self {
        Self {
            states: [PinState {
                mode: PinMode::Input,
                pull: Pull::None,
            }; PIN_COUNT],
            driven: [false; PIN_COUNT],
        }
    }

    /// Remembered state of a pin
    pub fn state(&self, id: PinId) -> PinState {
        self.states[id.index() as usize]
    }

    /// Last level written to a pin
    pub fn driven(&self, id: PinId) -> bool {
        self.driven[id.index() as usize]
    }

    fn apply<O: Os>(&mut self, os: &mut O, id: PinId, input: bool, pull: PadPull) -> Result<(), Error> {
        let pad = id.pad();
        os.gpio_write(pad, None);
        os.gpio_config(pad, GpioConfig::gpio(input, pull))
            .context("Failed to configure pin")
    }

    /// Floating input
    pub fn input<O: Os>(&mut self, os: &mut O, id: PinId) -> Result<(), Error> {
        self.apply(os, id, true, PadPull::Float)?;
        self.states[id.index() as usize] = PinState {
            mode: PinMode::Input,
            pull: Pull::None,
        };
        Ok(())
    }

    /// Push-pull output, driver off until the first write
    pub fn output<O: Os>(&mut self, os: &mut O, id: PinId) -> Result<(), Error> {
        self.apply(os, id, false, PadPull::Float)?;
        self.states[id.index() as usize] = PinState {
            mode: PinMode::Output,
            pull: Pull::None,
        };
        Ok(())
    }

    /// Open-drain output, starts driving low
    pub fn open_drain<O: Os>(&mut self, os: &mut O, id: PinId) -> Result<(), Error> {
        self.states[id.index() as usize].mode = PinMode::OpenDrain;
        self.od_low(os, id)
    }

    /// Open drain: pull the line low
    pub fn od_low<O: Os>(&mut self, os: &mut O, id: PinId) -> Result<(), Error> {
        let pad = id.pad();
        os.gpio_config(pad, GpioConfig::gpio(false, PadPull::Float))
            .context("Failed to configure pin")?;
        os.gpio_write(pad, Some(false));
        self.driven[id.index() as usize] = false;
        Ok(())
    }

    /// Open drain: release the line to the pull-up
    pub fn od_high<O: Os>(&mut self, os: &mut O, id: PinId) -> Result<(), Error> {
        let pad = id.pad();
        os.gpio_write(pad, None);
        self.driven[id.index() as usize] = true;
        os.gpio_config(pad, GpioConfig::gpio(true, PadPull::PullUp))
            .context("Failed to configure pin")
    }

    /// Sample the pin
    pub fn read<O: Os>(&self, os: &O, id: PinId) -> bool {
        os.gpio_read(id.pad())
    }

    /// Drive the pin; open-drain pins release the line for `true`
    pub fn write<O: Os>(&mut self, os: &mut O, id: PinId, high: bool) -> Result<(), Error> {
        match self.state(id).mode {
            PinMode::OpenDrain if high => self.od_high(os, id),
            PinMode::OpenDrain => self.od_low(os, id),
            _ => {
                os.gpio_write(id.pad(), Some(high));
                self.driven[id.index() as usize] = high;
                Ok(())
            }
        }
    }

    /// Reconfigure a pin
    ///
    /// `mode: None` keeps the current direction and [`PullArg::Unchanged`]
    /// keeps the current pull. `value`, when given, is written once the pin
    /// is configured.
    pub fn configure<O: Os>(
        &mut self,
        os: &mut O,
        id: PinId,
        mode: Option<PinMode>,
        pull: PullArg,
        value: Option<bool>,
    ) -> Result<(), Error> {
        let current = self.state(id);
        let mode = mode.unwrap_or(current.mode);
        let pull = match pull {
            PullArg::Unchanged => current.pull,
            PullArg::Set(pull) => pull,
        };
        debug!("pin {=u8} configure", id.index());

        match mode {
            PinMode::OpenDrain => {
                self.states[id.index() as usize] = PinState { mode, pull };
                match value {
                    Some(true) => self.od_high(os, id),
                    _ => self.od_low(os, id),
                }
            }
            PinMode::Input | PinMode::Output => {
                self.apply(os, id, mode == PinMode::Input, pull.into())?;
                self.states[id.index() as usize] = PinState { mode, pull };
                match value {
                    Some(high) => self.write(os, id, high),
                    None => Ok(()),
                }
            }
        }
    }

    /// Return every pin to a floating input
    pub fn reset<O: Os>(&mut self, os: &mut O) -> Result<(), Error> {
        for id in PinId::all() {
            self.input(os, id)?;
        }
        Ok(())
    }

    /// Borrow one pin together with the OS
    pub fn pin<'a, O: Os>(&'a mut self, os: &'a mut O, id: PinId) -> Pin<'a, O> {
        Pin { os, bank: self, id }
    }
}

/// A pin bound to the OS, usable through the HAL traits
pub struct Pin<'a, O: Os> {
    os: &'a mut O,
    bank: &'a mut PinBank,
    id: PinId,
}

impl<O: Os> Pin<'_, O> {
    /// Which pin this is
    pub fn id(&self) -> PinId {
        self.id
    }

    fn set(&mut self, high: bool) -> Result<(), Error> {
        self.bank.write(self.os, self.id, high)
    }

    fn sample(&self) -> bool {
        self.bank.read(&*self.os, self.id)
    }
}

impl<O: Os> DigitalOutput for Pin<'_, O> {
    type Error = Error;

    fn drive(&mut self, high: bool) -> Result<(), Error> {
        self.set(high)
    }

    fn driven(&self) -> bool {
        self.bank.driven(self.id)
    }
}

impl<O: Os> DigitalInput for Pin<'_, O> {
    fn level(&self) -> bool {
        self.sample()
    }
}

impl<O: Os> embedded_hal::digital::ErrorType for Pin<'_, O> {
    type Error = Error;
}

impl<O: Os> embedded_hal::digital::OutputPin for Pin<'_, O> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}

impl<O: Os> embedded_hal::digital::StatefulOutputPin for Pin<'_, O> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sample())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sample())
    }
}

impl<O: Os> embedded_hal::digital::InputPin for Pin<'_, O> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sample())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sample())
    }
}

//! Digital pins
//!
//! Pads sit behind the OS GPIO driver, so driving one can fail. Reading
//! the last driven level never touches the hardware.

/// Pin driven by this side of the wire
pub trait DigitalOutput {
    type Error;

    /// Drive the pad high or low
    fn drive(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Level last passed to [`DigitalOutput::drive`]
    fn driven(&self) -> bool;

    fn toggle(&mut self) -> Result<(), Self::Error> {
        let next = !self.driven();
        self.drive(next)
    }
}

/// Pin sampled from the wire
pub trait DigitalInput {
    /// Level currently on the pad
    fn level(&self) -> bool;
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// High-impedance input
    #[default]
    Input,
    /// Push-pull output
    Output,
    /// Output that only ever drives low
    OpenDrain,
}

/// Internal pull resistor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Floating
    #[default]
    None,
    Up,
    Down,
}

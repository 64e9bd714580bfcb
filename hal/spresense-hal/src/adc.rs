//! Analog input abstractions

/// A single ADC channel
pub trait AnalogInput {
    /// Error type for sampling
    type Error;

    /// Largest value [`AnalogInput::read`] can return
    const MAX: u16;

    /// Take one sample, scaled to `0..=Self::MAX`
    fn read(&mut self) -> Result<u16, Self::Error>;
}

//! PWM output abstractions

/// PWM output channel
///
/// Setters only reach the hardware once both frequency and duty are
/// non-zero; until then the values are held.
pub trait PwmOutput {
    /// Error type for PWM operations
    type Error;

    /// Current frequency in Hz (0 = unset)
    fn frequency(&self) -> u32;

    /// Current duty as an unsigned 16.16 fraction (0 = unset)
    fn duty(&self) -> u32;

    /// Set the output frequency in Hz
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Set the duty cycle (0..=65535 maps to 0..100%)
    fn set_duty(&mut self, duty: u32) -> Result<(), Self::Error>;

    /// Stop the output
    fn disable(&mut self) -> Result<(), Self::Error>;
}

/// PWM configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Duty as an unsigned 16.16 fraction
    pub duty: u32,
}

impl PwmConfig {
    /// Full-scale duty value (100%)
    pub const DUTY_MAX: u32 = 0xFFFF;

    /// Whether the configuration is complete enough to start the output
    pub const fn is_runnable(&self) -> bool {
        self.frequency > 0 && self.duty > 0
    }
}

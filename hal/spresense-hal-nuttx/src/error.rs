//! Error types
//!
//! [`Errno`] is the raw status the OS hands back; [`Error`] is what the
//! peripheral banks report. Validation failures (bad id, unsupported
//! setting) are kept apart from device failures so the scripting layer can
//! raise `ValueError` for the former and `OSError` for the latter.

use core::fmt;

/// OS error number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Errno(pub i32);

impl Errno {
    pub const EPERM: Errno = Errno(1);
    pub const ENOENT: Errno = Errno(2);
    pub const EINTR: Errno = Errno(4);
    pub const EIO: Errno = Errno(5);
    pub const ENXIO: Errno = Errno(6);
    pub const EBADF: Errno = Errno(9);
    pub const EAGAIN: Errno = Errno(11);
    pub const ENOMEM: Errno = Errno(12);
    pub const EBUSY: Errno = Errno(16);
    pub const EEXIST: Errno = Errno(17);
    pub const ENODEV: Errno = Errno(19);
    pub const ENOTDIR: Errno = Errno(20);
    pub const EISDIR: Errno = Errno(21);
    pub const EINVAL: Errno = Errno(22);
    pub const ENOTTY: Errno = Errno(25);
    pub const ETIMEDOUT: Errno = Errno(110);

    /// Short symbolic name, if known
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "EPERM",
            2 => "ENOENT",
            4 => "EINTR",
            5 => "EIO",
            6 => "ENXIO",
            9 => "EBADF",
            11 => "EAGAIN",
            12 => "ENOMEM",
            16 => "EBUSY",
            17 => "EEXIST",
            19 => "ENODEV",
            20 => "ENOTDIR",
            21 => "EISDIR",
            22 => "EINVAL",
            25 => "ENOTTY",
            110 => "ETIMEDOUT",
            _ => return None,
        })
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "[Errno {}] {}", self.0, name),
            None => write!(f, "[Errno {}]", self.0),
        }
    }
}

impl std::error::Error for Errno {}

/// Peripheral bank error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Pin number outside the board table
    #[error("invalid pin")]
    InvalidPin,
    /// ADC channel that does not exist
    #[error("Analog{0} does not exist")]
    NoSuchAdc(i64),
    /// Pin without a PWM channel
    #[error("PWM is not available on this pin")]
    NoPwmOnPin,
    /// I2C port other than 0
    #[error("only I2C0 is available")]
    I2cPortUnavailable,
    /// I2C frequency other than standard/fast mode
    #[error("only 100kHz and 400kHz are supported")]
    I2cFrequency,
    /// SPI port that does not exist
    #[error("SPI({0}) does not exist")]
    NoSuchSpi(i64),
    /// SPI word size the driver cannot do
    #[error("only 8 or 16 bit words are supported")]
    SpiBits,
    /// UART id that does not exist
    #[error("UART({0}) does not exist")]
    NoSuchUart(i64),
    /// UART reserved for the console
    #[error("UART({0}) is disabled (dedicated to REPL)")]
    UartReserved(i64),
    /// A setting the board does not support
    #[error("{0}")]
    Unsupported(&'static str),
    /// Operation on a channel that was never initialized or was deinitialized
    #[error("transfer on deinitialized {0}")]
    Deinitialized(&'static str),
    /// Device driver failure
    #[error("{context}")]
    Os {
        /// What the driver was asked to do
        context: &'static str,
        /// Status returned by the OS
        errno: Errno,
    },
}

impl Error {
    /// Build a device failure
    pub const fn os(context: &'static str, errno: Errno) -> Self {
        Error::Os { context, errno }
    }

    /// OS status, for device failures
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Os { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Whether this error came from the device driver rather than argument checks
    pub fn is_os(&self) -> bool {
        matches!(self, Error::Os { .. } | Error::Deinitialized(_))
    }
}

/// Extension for attaching a context message to an OS status
pub(crate) trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, Error>;
}

impl<T> Context<T> for Result<T, Errno> {
    fn context(self, context: &'static str) -> Result<T, Error> {
        self.map_err(|errno| Error::os(context, errno))
    }
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self.errno() {
            Some(Errno::ENXIO) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            _ => ErrorKind::Other,
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.errno() {
            Some(Errno::EAGAIN) => embedded_io::ErrorKind::Interrupted,
            Some(Errno::ETIMEDOUT) => embedded_io::ErrorKind::TimedOut,
            Some(Errno::EINVAL) => embedded_io::ErrorKind::InvalidInput,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_display() {
        assert_eq!(Errno::EIO.to_string(), "[Errno 5] EIO");
        assert_eq!(Errno(999).to_string(), "[Errno 999]");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::NoSuchAdc(7).to_string(), "Analog7 does not exist");
        assert_eq!(
            Error::UartReserved(0).to_string(),
            "UART(0) is disabled (dedicated to REPL)"
        );
        assert_eq!(
            Error::os("Failed to start ADC", Errno::EIO).to_string(),
            "Failed to start ADC"
        );
    }

    #[test]
    fn test_context_attaches_errno() {
        let res: Result<(), Errno> = Err(Errno::ENODEV);
        let err = res.context("Failed to open pwm device").unwrap_err();
        assert!(err.is_os());
        assert_eq!(err.errno(), Some(Errno::ENODEV));
        assert!(!Error::InvalidPin.is_os());
    }
}

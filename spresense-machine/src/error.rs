//! Exceptions raised to scripts

use core::fmt;

use spresense_hal_nuttx::{Errno, Error as HalError};

/// Exception class a [`MachineError`] is raised as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExceptionKind {
    ValueError,
    OSError,
    TypeError,
    AttributeError,
}

impl ExceptionKind {
    pub const fn name(self) -> &'static str {
        match self {
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::OSError => "OSError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::AttributeError => "AttributeError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned by every `machine` and `uos` operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    /// Bad argument value
    #[error("{0}")]
    Value(String),
    /// Device or filesystem failure
    #[error("{msg}")]
    Os { errno: Option<Errno>, msg: String },
    /// Wrong argument type or count
    #[error("{0}")]
    Type(String),
    /// Unknown method or class attribute
    #[error("object has no attribute '{0}'")]
    Attribute(String),
}

impl MachineError {
    pub fn value(msg: impl Into<String>) -> Self {
        MachineError::Value(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        MachineError::Type(msg.into())
    }

    pub fn os(errno: Option<Errno>, msg: impl Into<String>) -> Self {
        MachineError::Os {
            errno,
            msg: msg.into(),
        }
    }

    /// Exception class
    pub fn kind(&self) -> ExceptionKind {
        match self {
            MachineError::Value(_) => ExceptionKind::ValueError,
            MachineError::Os { .. } => ExceptionKind::OSError,
            MachineError::Type(_) => ExceptionKind::TypeError,
            MachineError::Attribute(_) => ExceptionKind::AttributeError,
        }
    }

    /// OS error number, for OSError
    pub fn errno(&self) -> Option<Errno> {
        match self {
            MachineError::Os { errno, .. } => *errno,
            _ => None,
        }
    }

    /// `Kind: message`, the way an uncaught exception is printed
    pub fn render(&self) -> String {
        match self {
            MachineError::Os {
                errno: Some(errno),
                msg,
            } => format!("{}: {} {}", self.kind(), msg, errno),
            _ => format!("{}: {}", self.kind(), self),
        }
    }
}

impl From<HalError> for MachineError {
    fn from(err: HalError) -> Self {
        if err.is_os() {
            MachineError::os(err.errno(), err.to_string())
        } else {
            MachineError::Value(err.to_string())
        }
    }
}

/// Result type for `machine` and `uos`
pub type MachineResult<T> = Result<T, MachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_becomes_value_error() {
        let err = MachineError::from(HalError::NoSuchAdc(9));
        assert_eq!(err.kind(), ExceptionKind::ValueError);
        assert_eq!(err.to_string(), "Analog9 does not exist");
    }

    #[test]
    fn test_device_failure_becomes_os_error() {
        let err = MachineError::from(HalError::os("Failed to start ADC", Errno::EIO));
        assert_eq!(err.kind(), ExceptionKind::OSError);
        assert_eq!(err.errno(), Some(Errno::EIO));
        assert_eq!(err.render(), "OSError: Failed to start ADC [Errno 5] EIO");
    }

    #[test]
    fn test_deinitialized_is_os_error() {
        let err = MachineError::from(HalError::Deinitialized("SPI"));
        assert_eq!(err.kind(), ExceptionKind::OSError);
        assert_eq!(err.render(), "OSError: transfer on deinitialized SPI");
    }

    #[test]
    fn test_attribute_error() {
        let err = MachineError::Attribute("frobnicate".into());
        assert_eq!(
            err.render(),
            "AttributeError: object has no attribute 'frobnicate'"
        );
    }
}

//! Values passed between scripts and the machine classes

use core::fmt;

use crate::error::{MachineError, MachineResult};

/// `machine` class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Class {
    Pin,
    Adc,
    Pwm,
    I2c,
    Spi,
    Uart,
}

impl Class {
    pub const ALL: [Class; 6] = [
        Class::Pin,
        Class::Adc,
        Class::Pwm,
        Class::I2c,
        Class::Spi,
        Class::Uart,
    ];

    /// Name scripts use
    pub const fn name(self) -> &'static str {
        match self {
            Class::Pin => "Pin",
            Class::Adc => "ADC",
            Class::Pwm => "PWM",
            Class::I2c => "I2C",
            Class::Spi => "SPI",
            Class::Uart => "UART",
        }
    }

    /// Look a class up by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Reference to a `machine` object
///
/// For the table-backed classes `index` is the channel, so constructing
/// the same channel twice yields equal handles. UART handles index the
/// open-instance list instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle {
    pub class: Class,
    pub index: u16,
}

impl Handle {
    pub const fn new(class: Class, index: u16) -> Self {
        Self { class, index }
    }
}

/// Script value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Object(Handle),
}

impl Value {
    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Object(h) => h.class.name(),
        }
    }

    /// Truthiness
    pub fn is_true(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn as_int(&self) -> MachineResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Bool(b) => Ok(*b as i64),
            other => Err(MachineError::type_error(format!(
                "can't convert {} to int",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> MachineResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(MachineError::type_error(format!(
                "can't convert '{}' object to str implicitly",
                other.type_name()
            ))),
        }
    }

    /// Buffer-protocol view (`bytes`, or a list of small ints)
    pub fn as_bytes(&self) -> MachineResult<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            Value::List(items) | Value::Tuple(items) => items
                .iter()
                .map(|v| {
                    let n = v.as_int()?;
                    u8::try_from(n).map_err(|_| MachineError::value("bytes must be in range(0, 256)"))
                })
                .collect(),
            other => Err(MachineError::type_error(format!(
                "object with buffer protocol required, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value], open: &str, close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    if close == ")" && items.len() == 1 {
        f.write_str(",")?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => {
                f.write_str("b'")?;
                for &byte in b {
                    match byte {
                        b'\\' => f.write_str("\\\\")?,
                        b'\'' => f.write_str("\\'")?,
                        b'\n' => f.write_str("\\n")?,
                        b'\r' => f.write_str("\\r")?,
                        0x20..=0x7e => write!(f, "{}", byte as char)?,
                        _ => write!(f, "\\x{:02x}", byte)?,
                    }
                }
                f.write_str("'")
            }
            Value::List(items) => write_seq(f, items, "[", "]"),
            Value::Tuple(items) => write_seq(f, items, "(", ")"),
            Value::Object(h) => write!(f, "<{} {}>", h.class.name(), h.index),
        }
    }
}

//! Bindings of the `machine` classes
//!
//! Each submodule adds one class's constructor, methods and repr to
//! [`Machine`](crate::machine::Machine).

mod adc;
mod i2c;
mod pin;
mod pwm;
mod spi;
mod uart;

use spresense_hal_nuttx::PinId;

use crate::error::{MachineError, MachineResult};
use crate::value::{Class, Handle, Value};

/// Pin number from an int or a `Pin` object
pub(crate) fn pin_arg(value: &Value) -> MachineResult<PinId> {
    let n = match value {
        Value::Int(n) => *n,
        Value::Object(Handle {
            class: Class::Pin,
            index,
        }) => *index as i64,
        _ => return Err(MachineError::value("expecting a pin")),
    };
    Ok(PinId::new(n)?)
}

/// Non-negative int that fits the driver's 32-bit field
pub(crate) fn u32_arg(n: i64, what: &str) -> MachineResult<u32> {
    u32::try_from(n).map_err(|_| MachineError::value(format!("{} out of range", what)))
}

/// Handle index as a table channel, for handles built outside the crate
pub(crate) fn channel(obj: Handle) -> i64 {
    obj.index as i64
}

//! The `machine` module
//!
//! [`Machine`] owns the [`Board`] and every open UART instance. Scripts
//! reach it through four entry points: construct an object, call one of
//! its methods, call the object itself, and print it. Objects are plain
//! [`Handle`]s; all state lives in the board's channel tables.

use spresense_hal_nuttx::uart::Uart;
use spresense_hal_nuttx::{Board, Os};

use crate::args::Args;
use crate::error::{MachineError, MachineResult};
use crate::value::{Class, Handle, Value};

/// `machine` module state
#[derive(Debug)]
pub struct Machine<O: Os> {
    pub board: Board<O>,
    pub(crate) uarts: Vec<Option<Uart>>,
}

impl<O: Os> Machine<O> {
    pub fn new(os: O) -> Self {
        Self::with_board(Board::new(os))
    }

    pub fn with_board(board: Board<O>) -> Self {
        Self {
            board,
            uarts: Vec::new(),
        }
    }

    /// Construct an object of `class`
    pub fn new_object(&mut self, class: Class, args: &Args) -> MachineResult<Value> {
        let handle = match class {
            Class::Pin => self.pin_new(args)?,
            Class::Adc => self.adc_new(args)?,
            Class::Pwm => self.pwm_new(args)?,
            Class::I2c => self.i2c_new(args)?,
            Class::Spi => self.spi_new(args)?,
            Class::Uart => self.uart_new(args)?,
        };
        Ok(Value::Object(handle))
    }

    /// Call method `name` on `obj`
    ///
    /// `*_into` methods write the filled buffer back into `args`.
    pub fn call_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        trace!("call {} method", obj.class.name());
        match obj.class {
            Class::Pin => self.pin_method(obj, name, args),
            Class::Adc => self.adc_method(obj, name, args),
            Class::Pwm => self.pwm_method(obj, name, args),
            Class::I2c => self.i2c_method(obj, name, args),
            Class::Spi => self.spi_method(obj, name, args),
            Class::Uart => self.uart_method(obj, name, args),
        }
    }

    /// Call `obj` directly, as in `pin()` or `pin(1)`
    pub fn call(&mut self, obj: Handle, args: &Args) -> MachineResult<Value> {
        match obj.class {
            Class::Pin => self.pin_call(obj, args),
            other => Err(MachineError::type_error(format!(
                "'{}' object isn't callable",
                other.name()
            ))),
        }
    }

    /// Printed form of `obj`
    pub fn repr(&self, obj: Handle) -> MachineResult<String> {
        match obj.class {
            Class::Pin => self.pin_repr(obj),
            Class::Adc => self.adc_repr(obj),
            Class::Pwm => self.pwm_repr(obj),
            Class::I2c => self.i2c_repr(obj),
            Class::Spi => self.spi_repr(obj),
            Class::Uart => self.uart_repr(obj),
        }
    }

    /// Class-level constant such as `Pin.OUT`
    pub fn class_attr(class: Class, name: &str) -> MachineResult<Value> {
        let value = match (class, name) {
            (Class::Pin, "IN") => 0,
            (Class::Pin, "OUT") => 1,
            (Class::Pin, "OPEN_DRAIN") => 2,
            (Class::Pin, "PULL_UP") => 1,
            (Class::Pin, "PULL_DOWN") => 2,
            (Class::Spi, "MSB") => 0,
            (Class::Spi, "LSB") => 1,
            _ => return Err(MachineError::Attribute(name.into())),
        };
        Ok(Value::Int(value))
    }

    /// Release every peripheral; run between REPL sessions
    pub fn reset(&mut self) {
        self.board.reset();
        for uart in self.uarts.iter_mut().flatten() {
            if uart.deinit(&mut self.board.os).is_err() {
                warn!("uart: deinit failed");
            }
        }
        self.uarts.clear();
    }

    pub fn os(&self) -> &O {
        &self.board.os
    }

    pub fn os_mut(&mut self) -> &mut O {
        &mut self.board.os
    }

    pub fn into_board(self) -> Board<O> {
        self.board
    }
}

pub(crate) fn no_method(name: &str) -> MachineError {
    MachineError::Attribute(name.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use spresense_hal_nuttx::sim::SimOs;

    #[test]
    fn test_class_constants() {
        assert_eq!(Machine::<SimOs>::class_attr(Class::Pin, "OUT"), Ok(Value::Int(1)));
        assert_eq!(Machine::<SimOs>::class_attr(Class::Spi, "LSB"), Ok(Value::Int(1)));
        let err = Machine::<SimOs>::class_attr(Class::Adc, "IN").unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::AttributeError);
    }

    #[test]
    fn test_unknown_method() {
        let mut m = Machine::new(SimOs::spresense());
        let adc = m
            .new_object(Class::Adc, &Args::new().arg(0))
            .unwrap()
            .as_handle()
            .unwrap();
        let err = m.call_method(adc, "write", &mut Args::new()).unwrap_err();
        assert_eq!(err.render(), "AttributeError: object has no attribute 'write'");
    }

    #[test]
    fn test_only_pins_are_callable() {
        let mut m = Machine::new(SimOs::spresense());
        let adc = m
            .new_object(Class::Adc, &Args::new().arg(1))
            .unwrap()
            .as_handle()
            .unwrap();
        let err = m.call(adc, &Args::new()).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::TypeError);
    }

    #[test]
    fn test_reset_closes_everything() {
        let mut m = Machine::new(SimOs::spresense());
        m.new_object(Class::Adc, &Args::new().arg(0)).unwrap();
        m.new_object(Class::Pwm, &Args::new().arg(6).arg(1000).arg(0x8000))
            .unwrap();
        m.new_object(Class::I2c, &Args::new().arg(0)).unwrap();
        m.new_object(Class::Spi, &Args::new().arg(4)).unwrap();
        m.new_object(Class::Uart, &Args::new().arg(2)).unwrap();
        m.new_object(Class::Uart, &Args::new().arg(2)).unwrap();
        assert_eq!(m.os().open_count(), 6);

        m.reset();

        assert_eq!(m.os().open_count(), 0);
        assert!(m.uarts.is_empty());
    }
}

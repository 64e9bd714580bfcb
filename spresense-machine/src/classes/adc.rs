//! `machine.ADC`

use spresense_hal_nuttx::adc::AdcId;
use spresense_hal_nuttx::Os;

use super::channel;
use crate::args::{check_arg_count, Args};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

impl<O: Os> Machine<O> {
    pub(crate) fn adc_new(&mut self, args: &Args) -> MachineResult<Handle> {
        check_arg_count(args, 1, 1, false)?;
        let id = args
            .positional
            .first()
            .ok_or_else(|| MachineError::type_error("'id' argument required"))?
            .as_int()?;
        let id = AdcId::new(id)?;
        self.board.adc.open(&mut self.board.os, id)?;
        Ok(Handle::new(Class::Adc, id.index() as u16))
    }

    pub(crate) fn adc_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        let id = AdcId::new(channel(obj))?;
        match name {
            "read" => {
                check_arg_count(args, 0, 0, false)?;
                let level = self.board.adc.read(&mut self.board.os, id)?;
                Ok(Value::Int(level as i64))
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn adc_repr(&self, obj: Handle) -> MachineResult<String> {
        let id = AdcId::new(channel(obj))?;
        Ok(format!("ADC Pin {}", id.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spresense_hal_nuttx::Errno;
    use spresense_hal_nuttx::sim::SimOs;

    #[test]
    fn test_read_scales_sample() {
        let mut m = Machine::new(SimOs::spresense());
        m.os_mut().adc_mut("/dev/lpadc2").samples.extend([i16::MAX, i16::MIN]);
        let adc = m
            .new_object(Class::Adc, &Args::new().arg(2))
            .unwrap()
            .as_handle()
            .unwrap();
        assert_eq!(m.repr(adc).unwrap(), "ADC Pin 2");
        assert_eq!(m.call_method(adc, "read", &mut Args::new()), Ok(Value::Int(1023)));
        assert_eq!(m.call_method(adc, "read", &mut Args::new()), Ok(Value::Int(0)));
    }

    #[test]
    fn test_second_construction_reuses_descriptor() {
        let mut m = Machine::new(SimOs::spresense());
        let a = m.new_object(Class::Adc, &Args::new().arg(4)).unwrap();
        let b = m.new_object(Class::Adc, &Args::new().arg(4)).unwrap();
        assert_eq!(a, b);
        assert_eq!(m.os().opens_of("/dev/hpadc0"), 1);
    }

    #[test]
    fn test_errors() {
        let mut m = Machine::new(SimOs::spresense());
        let err = m.new_object(Class::Adc, &Args::new().arg(6)).unwrap_err();
        assert_eq!(err.render(), "ValueError: Analog6 does not exist");

        m.os_mut().fail_ioctl("ANIOC_CXD56_START", Errno::EIO);
        let err = m.new_object(Class::Adc, &Args::new().arg(0)).unwrap_err();
        assert_eq!(err.render(), "OSError: Failed to start ADC [Errno 5] EIO");
        assert_eq!(m.os().open_count(), 0);
    }
}

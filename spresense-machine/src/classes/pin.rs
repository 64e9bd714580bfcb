//! `machine.Pin`

use spresense_hal::gpio::{PinMode, Pull};
use spresense_hal_nuttx::gpio::PullArg;
use spresense_hal_nuttx::{Os, PinId};

use super::{channel, pin_arg};
use crate::args::{check_arg_count, parse_args, ArgDefault, ArgSpec, Args};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

const INIT_ARGS: [ArgSpec; 3] = [
    ArgSpec::positional("mode", ArgDefault::None),
    ArgSpec::positional("pull", ArgDefault::Int(-1)),
    ArgSpec::keyword("value", ArgDefault::Absent),
];

fn mode_arg(value: Option<&Value>) -> MachineResult<Option<PinMode>> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(v) => match v.as_int()? {
            0 => Ok(Some(PinMode::Input)),
            1 => Ok(Some(PinMode::Output)),
            2 => Ok(Some(PinMode::OpenDrain)),
            n => Err(MachineError::value(format!("invalid pin mode: {}", n))),
        },
    }
}

fn pull_arg(value: Option<&Value>) -> MachineResult<PullArg> {
    match value {
        None => Ok(PullArg::Unchanged),
        Some(Value::None) => Ok(PullArg::Set(Pull::None)),
        Some(v) => match v.as_int()? {
            -1 => Ok(PullArg::Unchanged),
            1 => Ok(PullArg::Set(Pull::Up)),
            2 => Ok(PullArg::Set(Pull::Down)),
            n => Err(MachineError::value(format!("invalid pin pull: {}", n))),
        },
    }
}

impl<O: Os> Machine<O> {
    pub(crate) fn pin_new(&mut self, args: &Args) -> MachineResult<Handle> {
        let (id_arg, rest) = args
            .positional
            .split_first()
            .ok_or_else(|| MachineError::type_error("'id' argument required"))?;
        let id = pin_arg(id_arg)?;
        let rest = Args {
            positional: rest.to_vec(),
            keywords: args.keywords.clone(),
        };
        if !rest.is_empty() {
            self.pin_init(id, &rest)?;
        }
        Ok(Handle::new(Class::Pin, id.index() as u16))
    }

    fn pin_init(&mut self, id: PinId, args: &Args) -> MachineResult<()> {
        let parsed = parse_args(&INIT_ARGS, args)?;
        let mode = mode_arg(parsed.get(0))?;
        let pull = pull_arg(parsed.get(1))?;
        let value = parsed.get(2).map(Value::is_true);
        self.board
            .pins
            .configure(&mut self.board.os, id, mode, pull, value)?;
        Ok(())
    }

    fn pin_value(&mut self, id: PinId, args: &Args) -> MachineResult<Value> {
        check_arg_count(args, 0, 1, false)?;
        match args.positional.first() {
            None => {
                let high = self.board.pins.read(&self.board.os, id);
                Ok(Value::Int(high as i64))
            }
            Some(v) => {
                self.board
                    .pins
                    .write(&mut self.board.os, id, v.is_true())?;
                Ok(Value::None)
            }
        }
    }

    pub(crate) fn pin_call(&mut self, obj: Handle, args: &Args) -> MachineResult<Value> {
        let id = PinId::new(channel(obj))?;
        self.pin_value(id, args)
    }

    pub(crate) fn pin_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        let id = PinId::new(channel(obj))?;
        match name {
            "init" => self.pin_init(id, args).map(|_| Value::None),
            "value" => self.pin_value(id, args),
            "on" | "off" => {
                check_arg_count(args, 0, 0, false)?;
                self.board
                    .pins
                    .write(&mut self.board.os, id, name == "on")?;
                Ok(Value::None)
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn pin_repr(&self, obj: Handle) -> MachineResult<String> {
        let id = PinId::new(channel(obj))?;
        Ok(format!("Pin({})", id.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use spresense_hal_nuttx::sim::SimOs;

    fn led0(m: &mut Machine<SimOs>, args: Args) -> Handle {
        m.new_object(Class::Pin, &args).unwrap().as_handle().unwrap()
    }

    #[test]
    fn test_bare_constructor_leaves_pin_alone() {
        let mut m = Machine::new(SimOs::spresense());
        let pin = led0(&mut m, Args::new().arg(29));
        assert_eq!(pin, Handle::new(Class::Pin, 29));
        assert!(m.os().calls.is_empty());
        assert_eq!(m.repr(pin).unwrap(), "Pin(29)");
    }

    #[test]
    fn test_output_with_initial_value() {
        let mut m = Machine::new(SimOs::spresense());
        let args = Args::new().arg(29).arg(1).kw("value", 1);
        let pin = led0(&mut m, args);
        let pad = PinId::LED0.pad();
        assert_eq!(m.os().gpio_level(pad), Some(true));

        m.call_method(pin, "off", &mut Args::new()).unwrap();
        assert_eq!(m.os().gpio_level(pad), Some(false));
        assert_eq!(
            m.board.pins.state(PinId::LED0).mode,
            PinMode::Output
        );
    }

    #[test]
    fn test_call_reads_and_writes() {
        let mut m = Machine::new(SimOs::spresense());
        let pin = led0(&mut m, Args::new().arg(2).arg(0).arg(1));
        let pad = PinId::new(2).unwrap().pad();
        m.os_mut().set_gpio_input(pad, true);
        assert_eq!(m.call(pin, &Args::new()).unwrap(), Value::Int(1));
        assert_eq!(
            m.board.pins.state(PinId::new(2).unwrap()).pull,
            Pull::Up
        );

        m.call_method(pin, "init", &mut Args::new().arg(1)).unwrap();
        m.call(pin, &Args::new().arg(0)).unwrap();
        assert_eq!(m.os().gpio_level(pad), Some(false));
    }

    #[test]
    fn test_pin_object_accepted_as_id() {
        let mut m = Machine::new(SimOs::spresense());
        let pin = led0(&mut m, Args::new().arg(6));
        let again = led0(&mut m, Args::new().arg(Value::Object(pin)));
        assert_eq!(pin, again);
    }

    #[test]
    fn test_bad_arguments() {
        let mut m = Machine::new(SimOs::spresense());
        let err = m.new_object(Class::Pin, &Args::new().arg(33)).unwrap_err();
        assert_eq!(err.render(), "ValueError: invalid pin");

        let err = m.new_object(Class::Pin, &Args::new().arg("D6")).unwrap_err();
        assert_eq!(err.render(), "ValueError: expecting a pin");

        let err = m
            .new_object(Class::Pin, &Args::new().arg(0).arg(7))
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::ValueError);
    }
}

//! `machine.PWM`

use spresense_hal_nuttx::pwm::PwmId;
use spresense_hal_nuttx::Os;

use super::{pin_arg, u32_arg};
use crate::args::{check_arg_count, parse_args, ArgDefault, ArgSpec, Args};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

const INIT_ARGS: [ArgSpec; 2] = [
    ArgSpec::positional("freq", ArgDefault::Int(-1)),
    ArgSpec::positional("duty", ArgDefault::Int(-1)),
];

/// `-1` means "leave as is"
fn setting(n: i64, what: &str) -> MachineResult<Option<u32>> {
    match n {
        -1 => Ok(None),
        n => u32_arg(n, what).map(Some),
    }
}

fn pwm_id(obj: Handle) -> MachineResult<PwmId> {
    PwmId::from_index(obj.index as usize)
        .ok_or_else(|| MachineError::value("PWM is not available on this pin"))
}

impl<O: Os> Machine<O> {
    pub(crate) fn pwm_new(&mut self, args: &Args) -> MachineResult<Handle> {
        let (pin, rest) = args
            .positional
            .split_first()
            .ok_or_else(|| MachineError::type_error("'pin' argument required"))?;
        let id = PwmId::for_pin(pin_arg(pin)?)?;
        let rest = Args {
            positional: rest.to_vec(),
            keywords: args.keywords.clone(),
        };
        self.pwm_init(id, &rest)?;
        Ok(Handle::new(Class::Pwm, id.index() as u16))
    }

    fn pwm_init(&mut self, id: PwmId, args: &Args) -> MachineResult<()> {
        let parsed = parse_args(&INIT_ARGS, args)?;
        let freq = setting(parsed.int_or(0, -1)?, "freq")?;
        let duty = setting(parsed.int_or(1, -1)?, "duty")?;
        self.board.pwm.init(&mut self.board.os, id, freq, duty)?;
        Ok(())
    }

    pub(crate) fn pwm_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        let id = pwm_id(obj)?;
        match name {
            "init" => self.pwm_init(id, args).map(|_| Value::None),
            "deinit" => {
                check_arg_count(args, 0, 0, false)?;
                self.board.pwm.deinit(&mut self.board.os, id)?;
                Ok(Value::None)
            }
            "freq" | "duty" => {
                check_arg_count(args, 0, 1, false)?;
                let config = self.board.pwm.state(id).config;
                let Some(v) = args.positional.first() else {
                    let current = if name == "freq" { config.frequency } else { config.duty };
                    return Ok(Value::Int(current as i64));
                };
                let v = u32_arg(v.as_int()?, name)?;
                let os = &mut self.board.os;
                if name == "freq" {
                    self.board.pwm.set_frequency(os, id, v)?;
                } else {
                    self.board.pwm.set_duty(os, id, v)?;
                }
                Ok(Value::None)
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn pwm_repr(&self, obj: Handle) -> MachineResult<String> {
        let id = pwm_id(obj)?;
        let state = self.board.pwm.state(id);
        Ok(if state.active {
            format!(
                "PWM({}, freq={}, duty={})",
                id.index(),
                state.config.frequency,
                state.config.duty
            )
        } else {
            format!("PWM({})", id.index())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use spresense_hal_nuttx::sim::SimOs;

    fn pwm(m: &mut Machine<SimOs>, args: Args) -> Handle {
        m.new_object(Class::Pwm, &args).unwrap().as_handle().unwrap()
    }

    #[test]
    fn test_constructor_starts_when_both_set() {
        let mut m = Machine::new(SimOs::spresense());
        let p = pwm(&mut m, Args::new().arg(6).arg(1000).arg(0x8000));
        assert_eq!(p, Handle::new(Class::Pwm, 0));
        assert_eq!(m.repr(p).unwrap(), "PWM(0, freq=1000, duty=32768)");
        let sim = m.os().pwm("/dev/pwm0").unwrap();
        assert!(sim.running);
        assert_eq!(sim.starts, 1);
    }

    #[test]
    fn test_waits_for_duty() {
        let mut m = Machine::new(SimOs::spresense());
        let p = pwm(&mut m, Args::new().arg(3).kw("freq", 500));
        assert_eq!(p.index, 3);
        assert!(!m.os().pwm("/dev/pwm3").unwrap().running);
        assert_eq!(m.call_method(p, "duty", &mut Args::new()), Ok(Value::Int(0)));

        m.call_method(p, "duty", &mut Args::new().arg(100)).unwrap();
        m.call_method(p, "freq", &mut Args::new().arg(2000)).unwrap();
        let sim = m.os().pwm("/dev/pwm3").unwrap();
        assert!(sim.running);
        assert_eq!(sim.starts, 1);
        assert_eq!(sim.info.unwrap().frequency, 2000);
        assert_eq!(m.call_method(p, "freq", &mut Args::new()), Ok(Value::Int(2000)));
    }

    #[test]
    fn test_deinit_then_repr() {
        let mut m = Machine::new(SimOs::spresense());
        let p = pwm(&mut m, Args::new().arg(5).arg(1000).arg(10));
        m.call_method(p, "deinit", &mut Args::new()).unwrap();
        assert_eq!(m.repr(p).unwrap(), "PWM(1)");
        assert!(!m.os().is_open("/dev/pwm1"));

        let err = m.call_method(p, "freq", &mut Args::new().arg(10)).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::OSError);
    }

    #[test]
    fn test_pin_without_pwm() {
        let mut m = Machine::new(SimOs::spresense());
        let err = m.new_object(Class::Pwm, &Args::new().arg(7)).unwrap_err();
        assert_eq!(err.render(), "ValueError: PWM is not available on this pin");
    }
}

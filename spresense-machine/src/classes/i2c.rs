//! `machine.I2C`

use spresense_hal_nuttx::i2c::{check_frequency, check_port};
use spresense_hal_nuttx::Os;

use super::u32_arg;
use crate::args::{check_arg_count, parse_args, ArgDefault, ArgSpec, Args, Parsed};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

const I2C_ID: u16 = 0;

const NEW_ARGS: [ArgSpec; 5] = [
    ArgSpec::required("port"),
    ArgSpec::keyword("scl", ArgDefault::Absent),
    ArgSpec::keyword("sda", ArgDefault::Absent),
    ArgSpec::keyword("freq", ArgDefault::Int(400_000)),
    ArgSpec::keyword("timeout", ArgDefault::Int(-1)),
];

// `freq` left out of `init()` keeps the bus at its current rate
const INIT_ARGS: [ArgSpec; 4] = [
    ArgSpec::keyword("scl", ArgDefault::Absent),
    ArgSpec::keyword("sda", ArgDefault::Absent),
    ArgSpec::keyword("freq", ArgDefault::Absent),
    ArgSpec::keyword("timeout", ArgDefault::Int(-1)),
];

const READFROM_ARGS: [ArgSpec; 3] = [
    ArgSpec::required("addr"),
    ArgSpec::required("nbytes"),
    ArgSpec::positional("stop", ArgDefault::Int(1)),
];

const READFROM_INTO_ARGS: [ArgSpec; 3] = [
    ArgSpec::required("addr"),
    ArgSpec::required("buf"),
    ArgSpec::positional("stop", ArgDefault::Int(1)),
];

const WRITETO_ARGS: [ArgSpec; 3] = [
    ArgSpec::required("addr"),
    ArgSpec::required("buf"),
    ArgSpec::positional("stop", ArgDefault::Int(1)),
];

const WRITEVTO_ARGS: [ArgSpec; 3] = [
    ArgSpec::required("addr"),
    ArgSpec::required("vector"),
    ArgSpec::positional("stop", ArgDefault::Int(1)),
];

const READFROM_MEM_ARGS: [ArgSpec; 4] = [
    ArgSpec::required("addr"),
    ArgSpec::required("memaddr"),
    ArgSpec::required("nbytes"),
    ArgSpec::keyword("addrsize", ArgDefault::Int(8)),
];

const MEM_BUF_ARGS: [ArgSpec; 4] = [
    ArgSpec::required("addr"),
    ArgSpec::required("memaddr"),
    ArgSpec::required("buf"),
    ArgSpec::keyword("addrsize", ArgDefault::Int(8)),
];

fn addr_arg(parsed: &Parsed, i: usize) -> MachineResult<u16> {
    let n = parsed.int_or(i, 0)?;
    u16::try_from(n).map_err(|_| MachineError::value("address out of range"))
}

fn stop_arg(parsed: &Parsed, i: usize) -> bool {
    parsed.get(i).map_or(true, Value::is_true)
}

fn buf_arg(parsed: &Parsed, i: usize) -> MachineResult<Vec<u8>> {
    parsed.get(i).unwrap_or(&Value::None).as_bytes()
}

fn len_arg(parsed: &Parsed, i: usize) -> MachineResult<usize> {
    let n = parsed.int_or(i, 0)?;
    usize::try_from(n).map_err(|_| MachineError::value("negative length"))
}

impl<O: Os> Machine<O> {
    pub(crate) fn i2c_new(&mut self, args: &Args) -> MachineResult<Handle> {
        let parsed = parse_args(&NEW_ARGS, args)?;
        check_port(parsed.int_or(0, -1)?)?;
        self.i2c_setup(&parsed, 1)?;
        Ok(Handle::new(Class::I2c, I2C_ID))
    }

    /// Shared tail of the constructor and `init`; `first` is the `scl` slot
    fn i2c_setup(&mut self, parsed: &Parsed, first: usize) -> MachineResult<()> {
        let current = self.board.i2c.frequency() as i64;
        let freq = check_frequency(parsed.int_or(first + 2, current)?)?;
        if parsed.get(first).is_some() || parsed.get(first + 1).is_some() {
            return Err(MachineError::value("explicit choice of scl/sda is not supported"));
        }
        self.board.i2c.init(&mut self.board.os, freq)?;
        Ok(())
    }

    pub(crate) fn i2c_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        check_port(obj.index as i64)?;
        let bank = &self.board.i2c;
        let os = &mut self.board.os;
        match name {
            "init" => {
                let parsed = parse_args(&INIT_ARGS, args)?;
                self.i2c_setup(&parsed, 0)?;
                Ok(Value::None)
            }
            "deinit" => {
                check_arg_count(args, 0, 0, false)?;
                self.board.i2c.deinit(&mut self.board.os)?;
                Ok(Value::None)
            }
            "scan" => {
                check_arg_count(args, 0, 0, false)?;
                let found = bank.scan(os)?;
                Ok(Value::List(
                    found.into_iter().map(|a| Value::Int(a as i64)).collect(),
                ))
            }
            "readfrom" => {
                let p = parse_args(&READFROM_ARGS, args)?;
                let data = bank.readfrom(os, addr_arg(&p, 0)?, len_arg(&p, 1)?, stop_arg(&p, 2))?;
                Ok(Value::Bytes(data))
            }
            "readfrom_into" => {
                let p = parse_args(&READFROM_INTO_ARGS, args)?;
                let mut buf = buf_arg(&p, 1)?;
                bank.readfrom_into(os, addr_arg(&p, 0)?, &mut buf, stop_arg(&p, 2))?;
                args.replace(1, "buf", Value::Bytes(buf));
                Ok(Value::None)
            }
            "writeto" => {
                let p = parse_args(&WRITETO_ARGS, args)?;
                let buf = buf_arg(&p, 1)?;
                let n = bank.writeto(os, addr_arg(&p, 0)?, &buf, stop_arg(&p, 2))?;
                Ok(Value::Int(n as i64))
            }
            "writevto" => {
                let p = parse_args(&WRITEVTO_ARGS, args)?;
                let parts = match p.get(1) {
                    Some(Value::List(items)) | Some(Value::Tuple(items)) => items
                        .iter()
                        .map(Value::as_bytes)
                        .collect::<MachineResult<Vec<_>>>()?,
                    _ => return Err(MachineError::type_error("vector must be a list or tuple")),
                };
                let slices: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
                let n = bank.writevto(os, addr_arg(&p, 0)?, &slices, stop_arg(&p, 2))?;
                Ok(Value::Int(n as i64))
            }
            "readfrom_mem" => {
                let p = parse_args(&READFROM_MEM_ARGS, args)?;
                let memaddr = u32_arg(p.int_or(1, 0)?, "memaddr")?;
                let addrsize = u32_arg(p.int_or(3, 8)?, "addrsize")?;
                let data = bank.readfrom_mem(os, addr_arg(&p, 0)?, memaddr, addrsize, len_arg(&p, 2)?)?;
                Ok(Value::Bytes(data))
            }
            "readfrom_mem_into" => {
                let p = parse_args(&MEM_BUF_ARGS, args)?;
                let memaddr = u32_arg(p.int_or(1, 0)?, "memaddr")?;
                let addrsize = u32_arg(p.int_or(3, 8)?, "addrsize")?;
                let mut buf = buf_arg(&p, 2)?;
                bank.readfrom_mem_into(os, addr_arg(&p, 0)?, memaddr, addrsize, &mut buf)?;
                args.replace(2, "buf", Value::Bytes(buf));
                Ok(Value::None)
            }
            "writeto_mem" => {
                let p = parse_args(&MEM_BUF_ARGS, args)?;
                let memaddr = u32_arg(p.int_or(1, 0)?, "memaddr")?;
                let addrsize = u32_arg(p.int_or(3, 8)?, "addrsize")?;
                let buf = buf_arg(&p, 2)?;
                bank.writeto_mem(os, addr_arg(&p, 0)?, memaddr, addrsize, &buf)?;
                Ok(Value::None)
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn i2c_repr(&self, obj: Handle) -> MachineResult<String> {
        check_port(obj.index as i64)?;
        Ok(format!("I2C({}, freq={})", obj.index, self.board.i2c.frequency()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use spresense_hal_nuttx::sim::SimOs;

    fn i2c(m: &mut Machine<SimOs>) -> Handle {
        m.new_object(Class::I2c, &Args::new().arg(0))
            .unwrap()
            .as_handle()
            .unwrap()
    }

    #[test]
    fn test_constructor_checks() {
        let mut m = Machine::new(SimOs::spresense());
        let err = m.new_object(Class::I2c, &Args::new().arg(1)).unwrap_err();
        assert_eq!(err.render(), "ValueError: only I2C0 is available");

        let err = m
            .new_object(Class::I2c, &Args::new().arg(0).kw("freq", 1_000_000))
            .unwrap_err();
        assert_eq!(err.render(), "ValueError: only 100kHz and 400kHz are supported");

        let err = m
            .new_object(Class::I2c, &Args::new().arg(0).kw("scl", 15))
            .unwrap_err();
        assert_eq!(
            err.render(),
            "ValueError: explicit choice of scl/sda is not supported"
        );

        let bus = m
            .new_object(Class::I2c, &Args::new().arg(0).kw("freq", 100_000).kw("timeout", 50))
            .unwrap()
            .as_handle()
            .unwrap();
        assert_eq!(m.repr(bus).unwrap(), "I2C(0, freq=100000)");
    }

    #[test]
    fn test_init_keeps_frequency() {
        let mut m = Machine::new(SimOs::spresense());
        let bus = m
            .new_object(Class::I2c, &Args::new().arg(0).kw("freq", 100_000))
            .unwrap()
            .as_handle()
            .unwrap();
        m.call_method(bus, "init", &mut Args::new()).unwrap();
        assert_eq!(m.repr(bus).unwrap(), "I2C(0, freq=100000)");

        m.call_method(bus, "init", &mut Args::new().kw("freq", 400_000)).unwrap();
        assert_eq!(m.repr(bus).unwrap(), "I2C(0, freq=400000)");

        // a new constructor still starts from 400 kHz
        m.call_method(bus, "init", &mut Args::new().kw("freq", 100_000)).unwrap();
        let bus = i2c(&mut m);
        assert_eq!(m.repr(bus).unwrap(), "I2C(0, freq=400000)");
    }

    #[test]
    fn test_scan_and_registers() {
        let mut m = Machine::new(SimOs::spresense());
        m.os_mut().add_i2c_target(0x50, vec![0x10, 0x20, 0x30, 0x40]);
        m.os_mut().add_i2c_target(0x1d, vec![0; 4]);
        let bus = i2c(&mut m);

        let found = m.call_method(bus, "scan", &mut Args::new()).unwrap();
        assert_eq!(found, Value::List(vec![Value::Int(0x1d), Value::Int(0x50)]));

        let data = m
            .call_method(bus, "readfrom_mem", &mut Args::new().arg(0x50).arg(1).arg(2))
            .unwrap();
        assert_eq!(data, Value::Bytes(vec![0x20, 0x30]));

        m.call_method(
            bus,
            "writeto_mem",
            &mut Args::new().arg(0x1d).arg(2).arg(vec![0xaa, 0xbb]),
        )
        .unwrap();
        assert_eq!(m.os().i2c_memory(0x1d), Some(&[0, 0, 0xaa, 0xbb][..]));
    }

    #[test]
    fn test_into_methods_fill_argument() {
        let mut m = Machine::new(SimOs::spresense());
        m.os_mut().add_i2c_target(0x50, vec![1, 2, 3]);
        let bus = i2c(&mut m);

        let mut args = Args::new().arg(0x50).arg(0).arg(vec![0u8; 3]);
        m.call_method(bus, "readfrom_mem_into", &mut args).unwrap();
        assert_eq!(args.positional[2], Value::Bytes(vec![1, 2, 3]));

        let mut args = Args::new().arg(0x50).kw("buf", vec![0u8; 1]);
        m.call_method(bus, "readfrom_into", &mut args).unwrap();
        assert_eq!(args.keywords[0].1.as_bytes().unwrap().len(), 1);
    }

    #[test]
    fn test_write_counts_bytes() {
        let mut m = Machine::new(SimOs::spresense());
        m.os_mut().add_i2c_target(0x3c, vec![0; 8]);
        let bus = i2c(&mut m);
        let n = m
            .call_method(bus, "writeto", &mut Args::new().arg(0x3c).arg(vec![0u8, 1, 2]))
            .unwrap();
        assert_eq!(n, Value::Int(3));

        let vector = Value::List(vec![Value::Bytes(vec![4]), Value::Bytes(vec![5, 6])]);
        let n = m
            .call_method(bus, "writevto", &mut Args::new().arg(0x3c).arg(vector))
            .unwrap();
        assert_eq!(n, Value::Int(3));
        assert_eq!(m.os().i2c_memory(0x3c).unwrap()[4..6], [5, 6]);
    }

    #[test]
    fn test_missing_target_is_os_error() {
        let mut m = Machine::new(SimOs::spresense());
        let bus = i2c(&mut m);
        let err = m
            .call_method(bus, "readfrom", &mut Args::new().arg(0x77).arg(1))
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::OSError);

        m.call_method(bus, "deinit", &mut Args::new()).unwrap();
        let err = m
            .call_method(bus, "writeto", &mut Args::new().arg(0x77).arg(vec![1u8]))
            .unwrap_err();
        assert_eq!(err.render(), "OSError: transfer on deinitialized I2C");
    }
}

//! `machine.SPI`

use spresense_hal::spi::{BitOrder, Phase, Polarity};
use spresense_hal_nuttx::spi::{SpiId, SpiParams};
use spresense_hal_nuttx::Os;

use super::{channel, u32_arg};
use crate::args::{check_arg_count, parse_args, ArgDefault, ArgSpec, Args, Parsed};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

const NEW_ARGS: [ArgSpec; 9] = [
    ArgSpec::required("id"),
    ArgSpec::positional("baudrate", ArgDefault::Int(500_000)),
    ArgSpec::keyword("polarity", ArgDefault::Int(0)),
    ArgSpec::keyword("phase", ArgDefault::Int(0)),
    ArgSpec::keyword("bits", ArgDefault::Int(8)),
    ArgSpec::keyword("firstbit", ArgDefault::Int(0)),
    ArgSpec::keyword("sck", ArgDefault::Absent),
    ArgSpec::keyword("mosi", ArgDefault::Absent),
    ArgSpec::keyword("miso", ArgDefault::Absent),
];

const INIT_ARGS: [ArgSpec; 8] = [
    ArgSpec::positional("baudrate", ArgDefault::Int(-1)),
    ArgSpec::keyword("polarity", ArgDefault::Int(-1)),
    ArgSpec::keyword("phase", ArgDefault::Int(-1)),
    ArgSpec::keyword("bits", ArgDefault::Int(-1)),
    ArgSpec::keyword("firstbit", ArgDefault::Int(-1)),
    ArgSpec::keyword("sck", ArgDefault::Absent),
    ArgSpec::keyword("mosi", ArgDefault::Absent),
    ArgSpec::keyword("miso", ArgDefault::Absent),
];

const READ_ARGS: [ArgSpec; 2] = [
    ArgSpec::required("nbytes"),
    ArgSpec::positional("write", ArgDefault::Int(0)),
];

const READINTO_ARGS: [ArgSpec; 2] = [
    ArgSpec::required("buf"),
    ArgSpec::positional("write", ArgDefault::Int(0)),
];

const WRITE_READINTO_ARGS: [ArgSpec; 2] = [
    ArgSpec::required("write_buf"),
    ArgSpec::required("read_buf"),
];

/// Settings in slots `first..`, in `INIT_ARGS` order; `-1` leaves a setting alone
fn params(parsed: &Parsed, first: usize) -> MachineResult<SpiParams> {
    let given = |i: usize| -> MachineResult<Option<i64>> {
        Ok(parsed.int(first + i)?.filter(|&n| n != -1))
    };
    if (5..8).any(|i| parsed.get(first + i).is_some()) {
        return Err(MachineError::value(
            "explicit choice of sck/mosi/miso is not implemented",
        ));
    }
    Ok(SpiParams {
        frequency: given(0)?.map(|n| u32_arg(n, "baudrate")).transpose()?,
        polarity: given(1)?.map(|n| {
            if n == 0 {
                Polarity::IdleLow
            } else {
                Polarity::IdleHigh
            }
        }),
        phase: given(2)?.map(|n| {
            if n == 0 {
                Phase::CaptureOnFirstTransition
            } else {
                Phase::CaptureOnSecondTransition
            }
        }),
        // out-of-range widths become 0 so the bank rejects them
        bits: given(3)?.map(|n| u8::try_from(n).unwrap_or(0)),
        bit_order: given(4)?.map(|n| {
            if n == 0 {
                BitOrder::MsbFirst
            } else {
                BitOrder::LsbFirst
            }
        }),
    })
}

fn fill_arg(parsed: &Parsed, i: usize) -> MachineResult<u8> {
    let n = parsed.int_or(i, 0)?;
    u8::try_from(n).map_err(|_| MachineError::value("write byte out of range"))
}

impl<O: Os> Machine<O> {
    pub(crate) fn spi_new(&mut self, args: &Args) -> MachineResult<Handle> {
        let parsed = parse_args(&NEW_ARGS, args)?;
        let id = SpiId::new(parsed.int_or(0, -1)?)?;
        let params = params(&parsed, 1)?;
        self.board.spi.init(&mut self.board.os, id, params)?;
        Ok(Handle::new(Class::Spi, id.port() as u16))
    }

    pub(crate) fn spi_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        let id = SpiId::new(channel(obj))?;
        let bank = &self.board.spi;
        let os = &mut self.board.os;
        match name {
            "init" => {
                let parsed = parse_args(&INIT_ARGS, args)?;
                let params = params(&parsed, 0)?;
                self.board.spi.init(&mut self.board.os, id, params)?;
                Ok(Value::None)
            }
            "deinit" => {
                check_arg_count(args, 0, 0, false)?;
                self.board.spi.deinit(&mut self.board.os, id)?;
                Ok(Value::None)
            }
            "read" => {
                let p = parse_args(&READ_ARGS, args)?;
                let n = usize::try_from(p.int_or(0, 0)?)
                    .map_err(|_| MachineError::value("negative length"))?;
                let mut buf = vec![0; n];
                bank.read_into(os, id, &mut buf, fill_arg(&p, 1)?)?;
                Ok(Value::Bytes(buf))
            }
            "readinto" => {
                let p = parse_args(&READINTO_ARGS, args)?;
                let mut buf = p.get(0).unwrap_or(&Value::None).as_bytes()?;
                bank.read_into(os, id, &mut buf, fill_arg(&p, 1)?)?;
                args.replace(0, "buf", Value::Bytes(buf));
                Ok(Value::None)
            }
            "write" => {
                check_arg_count(args, 1, 1, false)?;
                let data = args.positional[0].as_bytes()?;
                bank.write(os, id, &data)?;
                Ok(Value::None)
            }
            "write_readinto" => {
                let p = parse_args(&WRITE_READINTO_ARGS, args)?;
                let tx = p.get(0).unwrap_or(&Value::None).as_bytes()?;
                let mut rx = p.get(1).unwrap_or(&Value::None).as_bytes()?;
                bank.transfer(os, id, &tx, &mut rx)?;
                args.replace(1, "read_buf", Value::Bytes(rx));
                Ok(Value::None)
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn spi_repr(&self, obj: Handle) -> MachineResult<String> {
        let id = SpiId::new(channel(obj))?;
        let config = self.board.spi.config(id);
        Ok(format!(
            "SPI(port={}, baudrate={}, polarity={}, phase={}, bits={}, firstbit={})",
            id.port(),
            config.frequency,
            (config.polarity == Polarity::IdleHigh) as u8,
            (config.phase == Phase::CaptureOnSecondTransition) as u8,
            config.bits,
            (config.bit_order == BitOrder::LsbFirst) as u8,
        ))
    }
}

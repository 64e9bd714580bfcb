//! `machine.UART`

use spresense_hal::uart::{DataBits, Parity, StopBits, UartConfig};
use spresense_hal_nuttx::uart::{check_id, Uart, UART_ID};
use spresense_hal_nuttx::Os;

use crate::args::{check_arg_count, parse_args, ArgDefault, ArgSpec, Args, Parsed};
use crate::error::{MachineError, MachineResult};
use crate::machine::{no_method, Machine};
use crate::value::{Class, Handle, Value};

const INIT_ARGS: [ArgSpec; 11] = [
    ArgSpec::positional("baudrate", ArgDefault::Int(115_200)),
    ArgSpec::positional("bits", ArgDefault::Int(8)),
    ArgSpec::positional("parity", ArgDefault::None),
    ArgSpec::positional("stop", ArgDefault::Int(1)),
    ArgSpec::keyword("tx", ArgDefault::Absent),
    ArgSpec::keyword("rx", ArgDefault::Absent),
    ArgSpec::keyword("rts", ArgDefault::Absent),
    ArgSpec::keyword("cts", ArgDefault::Absent),
    ArgSpec::keyword("txbuf", ArgDefault::Int(-1)),
    ArgSpec::keyword("rxbuf", ArgDefault::Int(-1)),
    ArgSpec::keyword("timeout", ArgDefault::Int(0)),
];

const READINTO_ARGS: [ArgSpec; 2] = [
    ArgSpec::required("buf"),
    ArgSpec::positional("nbytes", ArgDefault::None),
];

/// Chunk size for `read()` without a length
const READ_CHUNK: usize = 64;

fn config(parsed: &Parsed) -> MachineResult<UartConfig> {
    let data_bits = match parsed.int_or(1, 8)? {
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        9 => DataBits::Nine,
        _ => return Err(MachineError::value("only 8bit data is supported")),
    };
    let parity = match parsed.int(2)? {
        None => Parity::None,
        Some(0) => Parity::Even,
        Some(1) => Parity::Odd,
        Some(_) => return Err(MachineError::value("only none parity is supported")),
    };
    let stop_bits = match parsed.int_or(3, 1)? {
        1 => StopBits::One,
        2 => StopBits::Two,
        _ => return Err(MachineError::value("only 1 stop bit is supported")),
    };
    if (4..8).any(|i| parsed.get(i).is_some()) {
        return Err(MachineError::value("choice of tx/rx/rts/cts is not supported"));
    }
    if parsed.int_or(8, -1)? >= 0 || parsed.int_or(9, -1)? >= 0 {
        return Err(MachineError::value(
            "choice of RX and TX buffer length is not supported",
        ));
    }
    let timeout_ms = u16::try_from(parsed.int_or(10, 0)?)
        .map_err(|_| MachineError::value("timeout out of range"))?;
    // a negative baud rate leaves the line speed alone, like zero
    let baudrate = u32::try_from(parsed.int_or(0, 0)?).unwrap_or(0);

    Ok(UartConfig {
        baudrate,
        data_bits,
        parity,
        stop_bits,
        timeout_ms,
    })
}

fn parity_name(parity: Parity) -> &'static str {
    match parity {
        Parity::None => "None",
        Parity::Even => "0",
        Parity::Odd => "1",
    }
}

impl<O: Os> Machine<O> {
    pub(crate) fn uart_new(&mut self, args: &Args) -> MachineResult<Handle> {
        let (id, rest) = args
            .positional
            .split_first()
            .ok_or_else(|| MachineError::type_error("'id' argument required"))?;
        let id = id.as_int()?;
        check_id(id)?;
        let parsed = parse_args(
            &INIT_ARGS,
            &Args {
                positional: rest.to_vec(),
                keywords: args.keywords.clone(),
            },
        )?;
        let config = config(&parsed)?;

        let os = &mut self.board.os;
        let mut uart = Uart::open(os, id)?;
        if let Err(e) = uart.init(os, config) {
            if uart.deinit(os).is_err() {
                warn!("uart: close after failed init");
            }
            return Err(e.into());
        }

        // a deinitialized object can never reopen, so its slot is free
        let slot = self
            .uarts
            .iter()
            .position(|u| !u.as_ref().is_some_and(Uart::is_open))
            .unwrap_or(self.uarts.len());
        let index = u16::try_from(slot).map_err(|_| MachineError::os(None, "too many UART objects"))?;
        match self.uarts.get_mut(slot) {
            Some(entry) => *entry = Some(uart),
            None => self.uarts.push(Some(uart)),
        }
        Ok(Handle::new(Class::Uart, index))
    }

    pub(crate) fn uart_method(&mut self, obj: Handle, name: &str, args: &mut Args) -> MachineResult<Value> {
        let Machine { board, uarts } = self;
        let os = &mut board.os;
        let uart = uarts
            .get_mut(obj.index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| MachineError::value("UART object is no longer valid"))?;
        match name {
            "init" => {
                let parsed = parse_args(&INIT_ARGS, args)?;
                uart.init(os, config(&parsed)?)?;
                Ok(Value::None)
            }
            "deinit" => {
                check_arg_count(args, 0, 0, false)?;
                uart.deinit(os)?;
                Ok(Value::None)
            }
            "any" => {
                check_arg_count(args, 0, 0, false)?;
                Ok(Value::Int(uart.any(os)? as i64))
            }
            "read" => {
                check_arg_count(args, 0, 1, false)?;
                let data = match args.positional.first() {
                    None | Some(Value::None) => {
                        let mut data = Vec::new();
                        let mut chunk = [0u8; READ_CHUNK];
                        loop {
                            let n = uart.read(os, &mut chunk)?;
                            if n == 0 {
                                break;
                            }
                            data.extend_from_slice(&chunk[..n]);
                        }
                        data
                    }
                    Some(v) => {
                        let size = usize::try_from(v.as_int()?)
                            .map_err(|_| MachineError::value("negative length"))?;
                        let mut buf = vec![0; size];
                        let n = uart.read(os, &mut buf)?;
                        buf.truncate(n);
                        buf
                    }
                };
                Ok(Value::Bytes(data))
            }
            "readline" => {
                check_arg_count(args, 0, 0, false)?;
                Ok(Value::Bytes(uart.readline(os)?))
            }
            "readinto" => {
                let p = parse_args(&READINTO_ARGS, args)?;
                let mut buf = p.get(0).unwrap_or(&Value::None).as_bytes()?;
                let limit = match p.int(1)? {
                    Some(n) => usize::try_from(n).unwrap_or(0).min(buf.len()),
                    None => buf.len(),
                };
                let n = uart.read(os, &mut buf[..limit])?;
                args.replace(0, "buf", Value::Bytes(buf));
                Ok(Value::Int(n as i64))
            }
            "write" => {
                check_arg_count(args, 1, 1, false)?;
                let data = args.positional[0].as_bytes()?;
                Ok(Value::Int(uart.write(os, &data)? as i64))
            }
            "sendbreak" => {
                check_arg_count(args, 0, 0, false)?;
                uart.send_break(os)?;
                Ok(Value::None)
            }
            "poll" => {
                check_arg_count(args, 1, 1, false)?;
                let flags = u32::try_from(args.positional[0].as_int()?)
                    .map_err(|_| MachineError::value("invalid poll flags"))?;
                Ok(Value::Int(uart.poll(os, flags)? as i64))
            }
            _ => Err(no_method(name)),
        }
    }

    pub(crate) fn uart_repr(&self, obj: Handle) -> MachineResult<String> {
        let uart = self
            .uarts
            .get(obj.index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| MachineError::value("UART object is no longer valid"))?;
        let config = uart.config();
        Ok(format!(
            "UART({}, baudrate={}, bits={}, parity={}, stop={}, timeout={})",
            UART_ID,
            config.baudrate,
            config.data_bits.count(),
            parity_name(config.parity),
            match config.stop_bits {
                StopBits::One => 1,
                StopBits::Two => 2,
            },
            config.timeout_ms
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use spresense_hal::uart::poll;
    use spresense_hal_nuttx::sim::SimOs;
    use spresense_hal_nuttx::uart::UART_DEVPATH;
    use spresense_hal_nuttx::Errno;

    fn uart(m: &mut Machine<SimOs>, args: Args) -> Handle {
        m.new_object(Class::Uart, &args).unwrap().as_handle().unwrap()
    }

    #[test]
    fn test_constructor_sets_speed() {
        let mut m = Machine::new(SimOs::spresense());
        let u = uart(&mut m, Args::new().arg(2).arg(9600).kw("timeout", 20));
        assert_eq!(
            m.repr(u).unwrap(),
            "UART(2, baudrate=9600, bits=8, parity=None, stop=1, timeout=20)"
        );
        let serial = m.os_mut().serial_mut(UART_DEVPATH);
        assert_eq!(serial.termios.c_speed, 9600);
        assert_eq!(serial.flushes, 1);
    }

    #[test]
    fn test_every_construction_opens_again() {
        let mut m = Machine::new(SimOs::spresense());
        let a = uart(&mut m, Args::new().arg(2));
        let b = uart(&mut m, Args::new().arg(2));
        assert_ne!(a, b);
        assert_eq!(m.os().opens_of(UART_DEVPATH), 2);
    }

    #[test]
    fn test_closed_slot_is_reused() {
        let mut m = Machine::new(SimOs::spresense());
        let a = uart(&mut m, Args::new().arg(2));
        let b = uart(&mut m, Args::new().arg(2));
        m.call_method(a, "deinit", &mut Args::new()).unwrap();

        let c = uart(&mut m, Args::new().arg(2).arg(9600));
        assert_eq!(c, a);
        assert_eq!(m.uarts.len(), 2);
        assert!(m.repr(c).unwrap().contains("baudrate=9600"));

        for _ in 0..3 {
            m.call_method(b, "deinit", &mut Args::new()).unwrap();
            assert_eq!(uart(&mut m, Args::new().arg(2)), b);
        }
        assert_eq!(m.uarts.len(), 2);
        assert_eq!(m.os().open_count(), 2);
    }

    #[test]
    fn test_id_and_frame_checks() {
        let mut m = Machine::new(SimOs::spresense());
        let err = m.new_object(Class::Uart, &Args::new().arg(0)).unwrap_err();
        assert_eq!(
            err.render(),
            "ValueError: UART(0) is disabled (dedicated to REPL)"
        );
        let err = m.new_object(Class::Uart, &Args::new().arg(3)).unwrap_err();
        assert_eq!(err.render(), "ValueError: UART(3) does not exist");

        let cases = [
            (Args::new().arg(2).arg(9600).arg(7), "only 8bit data is supported"),
            (Args::new().arg(2).kw("parity", 0), "only none parity is supported"),
            (Args::new().arg(2).kw("stop", 2), "only 1 stop bit is supported"),
            (Args::new().arg(2).kw("tx", 1), "choice of tx/rx/rts/cts is not supported"),
            (
                Args::new().arg(2).kw("rxbuf", 256),
                "choice of RX and TX buffer length is not supported",
            ),
        ];
        for (args, msg) in cases {
            let err = m.new_object(Class::Uart, &args).unwrap_err();
            assert_eq!(err.kind(), ExceptionKind::ValueError);
            assert_eq!(err.to_string(), msg);
        }
        assert_eq!(m.os().open_count(), 0);
    }

    #[test]
    fn test_read_write() {
        let mut m = Machine::new(SimOs::spresense());
        let u = uart(&mut m, Args::new().arg(2));
        m.os_mut().serial_mut(UART_DEVPATH).rx.extend(b"ab\ncd");

        assert_eq!(m.call_method(u, "any", &mut Args::new()), Ok(Value::Int(5)));
        let line = m.call_method(u, "readline", &mut Args::new()).unwrap();
        assert_eq!(line, Value::Bytes(b"ab\n".to_vec()));
        let rest = m.call_method(u, "read", &mut Args::new()).unwrap();
        assert_eq!(rest, Value::Bytes(b"cd".to_vec()));
        let nothing = m.call_method(u, "read", &mut Args::new().arg(4)).unwrap();
        assert_eq!(nothing, Value::Bytes(vec![]));

        let n = m
            .call_method(u, "write", &mut Args::new().arg("hello"))
            .unwrap();
        assert_eq!(n, Value::Int(5));
        assert_eq!(m.os_mut().serial_mut(UART_DEVPATH).tx, b"hello");
    }

    #[test]
    fn test_readinto_and_poll() {
        let mut m = Machine::new(SimOs::spresense());
        let u = uart(&mut m, Args::new().arg(2));
        m.os_mut().serial_mut(UART_DEVPATH).rx.extend(b"xyz");

        let ready = m
            .call_method(u, "poll", &mut Args::new().arg((poll::RD | poll::WR) as i64))
            .unwrap();
        assert_eq!(ready, Value::Int((poll::RD | poll::WR) as i64));

        let mut args = Args::new().arg(vec![0u8; 4]).arg(2);
        let n = m.call_method(u, "readinto", &mut args).unwrap();
        assert_eq!(n, Value::Int(2));
        assert_eq!(args.positional[0], Value::Bytes(vec![b'x', b'y', 0, 0]));
    }

    #[test]
    fn test_failures() {
        let mut m = Machine::new(SimOs::spresense());
        let u = uart(&mut m, Args::new().arg(2));

        m.os_mut().fail_io("write", Errno::EIO);
        let err = m
            .call_method(u, "write", &mut Args::new().arg(vec![1u8]))
            .unwrap_err();
        assert_eq!(err.errno(), Some(Errno::EAGAIN));

        m.os_mut().fail_io("wait", Errno::EINTR);
        let err = m
            .call_method(u, "read", &mut Args::new().arg(1))
            .unwrap_err();
        assert_eq!(err.to_string(), "select() error");
        m.os_mut().clear_failures();

        m.os_mut().fail_ioctl("TCGETS", Errno::ENOTTY);
        let err = m
            .call_method(u, "init", &mut Args::new().arg(57600))
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::OSError);
        assert_eq!(err.to_string(), "cannot get termios fields");
    }
}

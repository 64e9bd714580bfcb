//! Command console
//!
//! Line-oriented stand-in for the language runtime. Each line is one
//! call into the `machine` or `uos` dispatch:
//!
//! ```text
//! Pin 29 new 1          # Pin(29, Pin.OUT)
//! Pin 29 on
//! I2C 0 scan
//! SPI 4 write b:9f00
//! os listdir
//! ```

use spresense_hal_nuttx::Os;
use spresense_machine::{Args, Class, Handle, Machine, MachineError, Value};

use crate::repl::{ExecMode, Interpreter, Outcome, Runtime};

const HELP: &str = "\
Commands:
  <Class> <id> [new [args..]]     construct (Pin, ADC, PWM, I2C, SPI, UART)
  <Class> <id> <method> [args..]  call a method; `call` calls the object
  <Class> <NAME>                  class constant, e.g. Pin OUT
  os <function> [args..]          uos function
Arguments: 12 0x1f None True False \"text\" b:01ff name=value";

/// Interpreter over the `machine` and `uos` dispatch
#[derive(Debug, Default)]
pub struct CommandConsole {
    /// Objects constructed this session, by class and id
    objects: Vec<(Class, i64, Handle)>,
}

impl CommandConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn run_line<O: Os>(&mut self, rt: &mut Runtime<O>, line: &str) -> Result<Option<String>, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (&head, rest) = tokens.split_first().ok_or_else(|| "SyntaxError: empty line".to_string())?;
        if head == "help" {
            return Ok(Some(HELP.into()));
        }
        if head == "os" {
            let (&name, rest) = rest
                .split_first()
                .ok_or_else(|| "SyntaxError: expected os <function>".to_string())?;
            let args = parse_call_args(rest)?;
            let value = rt.uos.call(name, &args).map_err(|e| e.render())?;
            return Ok(shown(&rt.machine, &value));
        }

        let class = Class::from_name(head).ok_or_else(|| format!("NameError: name '{}' isn't defined", head))?;
        let (&target, rest) = rest
            .split_first()
            .ok_or_else(|| format!("SyntaxError: expected {} <id> or {} <NAME>", head, head))?;
        let id = match parse_value(target)? {
            Value::Int(id) => id,
            _ => {
                let value = Machine::<O>::class_attr(class, target).map_err(|e| e.render())?;
                return Ok(Some(value.to_string()));
            }
        };

        let (method, rest) = match rest.split_first() {
            Some((&method, rest)) => (method, rest),
            None => ("new", rest),
        };
        let mut args = parse_call_args(rest)?;
        if method == "new" {
            let mut ctor = Args::new().arg(id);
            ctor.positional.append(&mut args.positional);
            ctor.keywords = args.keywords;
            let handle = self.construct(rt, class, id, &ctor).map_err(|e| e.render())?;
            return rt.machine.repr(handle).map(Some).map_err(|e| e.render());
        }

        let handle = self.handle(rt, class, id).map_err(|e| e.render())?;
        let before = args.positional.clone();
        let result = match method {
            "repr" => rt.machine.repr(handle).map(Value::Str),
            "call" => rt.machine.call(handle, &args),
            _ => rt.machine.call_method(handle, method, &mut args),
        }
        .map_err(|e| e.render())?;

        let mut lines: Vec<String> = shown(&rt.machine, &result).into_iter().collect();
        // filled `*_into` buffers
        for (old, new) in before.iter().zip(&args.positional) {
            if old != new {
                lines.push(new.to_string());
            }
        }
        Ok((!lines.is_empty()).then(|| lines.join("\n")))
    }

    fn construct<O: Os>(
        &mut self,
        rt: &mut Runtime<O>,
        class: Class,
        id: i64,
        args: &Args,
    ) -> Result<Handle, MachineError> {
        // UART objects own a descriptor each; close the one being replaced
        if let Some(old) = self.known(class, id).filter(|_| class == Class::Uart) {
            if rt.machine.call_method(old, "deinit", &mut Args::new()).is_err() {
                warn!("console: closing the replaced UART failed");
            }
        }
        let handle = rt
            .machine
            .new_object(class, args)?
            .as_handle()
            .ok_or_else(|| MachineError::type_error("constructor returned a non-object"))?;
        self.objects.retain(|&(c, i, _)| !(c == class && i == id));
        self.objects.push((class, id, handle));
        Ok(handle)
    }

    fn known(&self, class: Class, id: i64) -> Option<Handle> {
        self.objects
            .iter()
            .find(|&&(c, i, _)| c == class && i == id)
            .map(|&(_, _, handle)| handle)
    }

    /// Object for `class id`, constructed with defaults on first use
    fn handle<O: Os>(&mut self, rt: &mut Runtime<O>, class: Class, id: i64) -> Result<Handle, MachineError> {
        match self.known(class, id) {
            Some(handle) => Ok(handle),
            None => self.construct(rt, class, id, &Args::new().arg(id)),
        }
    }
}

impl<O: Os> Interpreter<O> for CommandConsole {
    fn init(&mut self, _rt: &mut Runtime<O>) {
        self.objects.clear();
    }

    fn deinit(&mut self, _rt: &mut Runtime<O>) {
        self.objects.clear();
    }

    fn exec(&mut self, rt: &mut Runtime<O>, source: &str, mode: ExecMode) -> Outcome {
        let lines: Vec<&str> = match mode {
            ExecMode::Single => vec![source],
            ExecMode::File => source.lines().collect(),
        };
        let mut outcome = Outcome::default();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.run_line(rt, line) {
                Ok(Some(text)) => {
                    outcome.output.push_str(&text);
                    outcome.output.push('\n');
                }
                Ok(None) => {}
                Err(err) => {
                    outcome.error = Some(err);
                    break;
                }
            }
        }
        outcome
    }
}

/// Text printed for a call result; `None` prints nothing
fn shown<O: Os>(machine: &Machine<O>, value: &Value) -> Option<String> {
    match value {
        Value::None => None,
        Value::Object(handle) => Some(machine.repr(*handle).unwrap_or_else(|_| value.to_string())),
        Value::Str(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_call_args(tokens: &[&str]) -> Result<Args, String> {
    let mut args = Args::new();
    for token in tokens {
        match token.split_once('=') {
            Some((name, value)) if is_identifier(name) => args = args.kw(name, parse_value(value)?),
            _ => args = args.arg(parse_value(token)?),
        }
    }
    Ok(args)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(token: &str) -> Result<Value, String> {
    let value = match token {
        "None" => Value::None,
        "True" => Value::Bool(true),
        "False" => Value::Bool(false),
        _ => {
            if let Some(hex) = token.strip_prefix("0x") {
                i64::from_str_radix(hex, 16)
                    .map(Value::Int)
                    .map_err(|_| format!("SyntaxError: invalid hex literal '{}'", token))?
            } else if let Ok(n) = token.parse::<i64>() {
                Value::Int(n)
            } else if let Some(hex) = token.strip_prefix("b:") {
                Value::Bytes(parse_hex_bytes(hex).ok_or_else(|| format!("SyntaxError: invalid bytes '{}'", token))?)
            } else if let Some(s) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
                Value::from(s)
            } else {
                Value::from(token)
            }
        }
    };
    Ok(value)
}

fn parse_hex_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortConfig;
    use spresense_hal_nuttx::sim::SimOs;

    fn runtime() -> Runtime<SimOs> {
        Runtime::new(Machine::new(SimOs::spresense()), &PortConfig::default())
    }

    fn run(console: &mut CommandConsole, rt: &mut Runtime<SimOs>, source: &str) -> Outcome {
        console.exec(rt, source, ExecMode::File)
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("12"), Ok(Value::Int(12)));
        assert_eq!(parse_value("-3"), Ok(Value::Int(-3)));
        assert_eq!(parse_value("0x1f"), Ok(Value::Int(31)));
        assert_eq!(parse_value("None"), Ok(Value::None));
        assert_eq!(parse_value("b:01ff"), Ok(Value::Bytes(vec![0x01, 0xff])));
        assert_eq!(parse_value("\"main.py\""), Ok(Value::from("main.py")));
        assert!(parse_value("b:0").is_err());
    }

    #[test]
    fn test_pin_session() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        let out = run(&mut console, &mut rt, "Pin 29 new 1\nPin 29 on\nPin 29 value\nPin OUT");
        assert_eq!(out.error, None);
        assert_eq!(out.output, "Pin(29)\n1\n1\n");
    }

    #[test]
    fn test_spi_readinto_shows_buffer() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        let out = run(&mut console, &mut rt, "SPI 4 readinto b:0000 0xff");
        assert_eq!(out.error, None);
        assert_eq!(out.output, "b'\\xff\\xff'\n");
    }

    #[test]
    fn test_errors_stop_the_program() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        let out = run(&mut console, &mut rt, "ADC 9\nPin 1 on");
        assert_eq!(out.error.as_deref(), Some("ValueError: Analog9 does not exist"));
        assert_eq!(out.output, "");

        let out = run(&mut console, &mut rt, "Pin 3 fly");
        assert_eq!(out.error.as_deref(), Some("AttributeError: object has no attribute 'fly'"));

        let out = run(&mut console, &mut rt, "CAN 0");
        assert_eq!(out.error.as_deref(), Some("NameError: name 'CAN' isn't defined"));
    }

    #[test]
    fn test_os_calls() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        let out = console.exec(&mut rt, "os getcwd", ExecMode::Single);
        assert_eq!(out.output, "/mnt/spif\n");
        let out = console.exec(&mut rt, "os uname", ExecMode::Single);
        assert!(out.output.starts_with("('nuttx', 'nuttx', "));
    }

    #[test]
    fn test_uart_reconstruction_closes_previous() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        let out = run(&mut console, &mut rt, "UART 2 new\nUART 2 new 9600\nUART 2 new 19200");
        assert_eq!(out.error, None);
        let os = rt.machine.os();
        assert_eq!(os.opens_of("/dev/ttyS2"), 3);
        assert_eq!(os.open_count(), 1);
        assert_eq!(console.objects.len(), 1);
    }

    #[test]
    fn test_session_forgets_objects() {
        let mut console = CommandConsole::new();
        let mut rt = runtime();
        run(&mut console, &mut rt, "UART 2 write b:41");
        assert_eq!(console.objects.len(), 1);
        Interpreter::<SimOs>::deinit(&mut console, &mut rt);
        assert!(console.objects.is_empty());
    }
}

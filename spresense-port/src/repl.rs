//! Boot sequence and REPL
//!
//! [`run_port`] brings the board up and runs REPL sessions until the
//! console closes. Each session ends in a soft reboot that releases every
//! peripheral and restores the working directory.

use embedded_io::{Read, Write};
use spresense_hal_nuttx::{Error as HalError, Os};
use spresense_machine::{Machine, Uos};

use crate::config::PortConfig;
use crate::mphal::Hal;

const CTRL_A: u8 = 0x01;
const CTRL_B: u8 = 0x02;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;

const PROMPT: &str = ">>> ";
const RAW_BANNER: &str = "raw REPL; CTRL-B to exit\r\n>";

/// How a source string is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// One interactive statement
    Single,
    /// A whole program
    File,
}

/// Result of running source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub output: String,
    /// Uncaught exception, rendered
    pub error: Option<String>,
}

/// Everything a script can reach
#[derive(Debug)]
pub struct Runtime<O: Os> {
    pub machine: Machine<O>,
    pub uos: Uos,
}

impl<O: Os> Runtime<O> {
    pub fn new(machine: Machine<O>, config: &PortConfig) -> Self {
        Self {
            machine,
            uos: uos_for(config),
        }
    }
}

fn uos_for(config: &PortConfig) -> Uos {
    Uos::new(&config.fs.cwd).with_machine(&config.board.name, &config.board.mcu)
}

/// The scripting runtime
pub trait Interpreter<O: Os> {
    /// Start of a session
    fn init(&mut self, rt: &mut Runtime<O>);

    /// End of a session, before the board is reset
    fn deinit(&mut self, rt: &mut Runtime<O>);

    fn exec(&mut self, rt: &mut Runtime<O>, source: &str, mode: ExecMode) -> Outcome;
}

/// REPL input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Friendly,
    Raw,
}

/// Why a REPL session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    SoftReboot,
    /// Console closed
    Eof,
}

/// Line editor and raw-mode protocol
#[derive(Debug)]
pub struct Repl {
    mode: ReplMode,
    banner: String,
    line: Vec<u8>,
}

impl Repl {
    pub fn new(banner: &str) -> Self {
        Self {
            mode: ReplMode::Friendly,
            banner: banner.into(),
            line: Vec::new(),
        }
    }

    pub fn mode(&self) -> ReplMode {
        self.mode
    }

    fn enter_friendly<C: Read + Write>(&mut self, hal: &mut Hal<C>) {
        self.mode = ReplMode::Friendly;
        self.line.clear();
        hal.stdout_tx_str(&self.banner);
        hal.stdout_tx_str("\r\nType \"help\" for more information.\r\n");
        hal.stdout_tx_str(PROMPT);
    }

    fn enter_raw<C: Read + Write>(&mut self, hal: &mut Hal<C>) {
        self.mode = ReplMode::Raw;
        self.line.clear();
        hal.stdout_tx_str(RAW_BANNER);
    }

    /// Run one session
    pub fn run<O, C, I>(&mut self, hal: &mut Hal<C>, interp: &mut I, rt: &mut Runtime<O>) -> Exit
    where
        O: Os,
        C: Read + Write,
        I: Interpreter<O>,
    {
        match self.mode {
            ReplMode::Friendly => self.enter_friendly(hal),
            ReplMode::Raw => self.enter_raw(hal),
        }
        loop {
            let Some(byte) = hal.read_byte() else {
                return Exit::Eof;
            };
            let exit = match self.mode {
                ReplMode::Friendly => self.friendly_byte(byte, hal, interp, rt),
                ReplMode::Raw => self.raw_byte(byte, hal, interp, rt),
            };
            if let Some(exit) = exit {
                return exit;
            }
        }
    }

    fn friendly_byte<O, C, I>(
        &mut self,
        byte: u8,
        hal: &mut Hal<C>,
        interp: &mut I,
        rt: &mut Runtime<O>,
    ) -> Option<Exit>
    where
        O: Os,
        C: Read + Write,
        I: Interpreter<O>,
    {
        match byte {
            CTRL_A => {
                hal.stdout_tx_str("\r\n");
                self.enter_raw(hal);
            }
            CTRL_C => {
                self.line.clear();
                hal.stdout_tx_str("\r\n");
                hal.stdout_tx_str(PROMPT);
            }
            CTRL_D if self.line.is_empty() => {
                hal.stdout_tx_str("\r\n");
                return Some(Exit::SoftReboot);
            }
            b'\r' | b'\n' => {
                hal.stdout_tx_str("\r\n");
                let line = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                if !line.trim().is_empty() {
                    let outcome = interp.exec(rt, &line, ExecMode::Single);
                    write_crlf(hal, &outcome.output);
                    if let Some(err) = outcome.error {
                        write_crlf(hal, &err);
                    }
                }
                hal.stdout_tx_str(PROMPT);
            }
            BACKSPACE | DEL => {
                if self.line.pop().is_some() {
                    hal.stdout_tx_str("\x08 \x08");
                }
            }
            b if b >= 0x20 => {
                self.line.push(b);
                hal.stdout_tx_strn(&[b]);
            }
            _ => {}
        }
        None
    }

    fn raw_byte<O, C, I>(
        &mut self,
        byte: u8,
        hal: &mut Hal<C>,
        interp: &mut I,
        rt: &mut Runtime<O>,
    ) -> Option<Exit>
    where
        O: Os,
        C: Read + Write,
        I: Interpreter<O>,
    {
        match byte {
            CTRL_A => self.line.clear(),
            CTRL_B => {
                hal.stdout_tx_str("\r\n");
                self.enter_friendly(hal);
            }
            CTRL_C => self.line.clear(),
            CTRL_D if self.line.is_empty() => {
                hal.stdout_tx_str("\r\n");
                return Some(Exit::SoftReboot);
            }
            CTRL_D => {
                let source = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                hal.stdout_tx_str("OK");
                let outcome = interp.exec(rt, &source, ExecMode::File);
                hal.stdout_tx_str(&outcome.output);
                hal.stdout_tx_strn(&[CTRL_D]);
                if let Some(err) = outcome.error {
                    hal.stdout_tx_str(&err);
                    hal.stdout_tx_str("\n");
                }
                hal.stdout_tx_strn(&[CTRL_D]);
                hal.stdout_tx_str(">");
            }
            b => self.line.push(b),
        }
        None
    }
}

/// Write text with bare `\n` turned into `\r\n`
fn write_crlf<C: Read + Write>(hal: &mut Hal<C>, text: &str) {
    for line in text.lines() {
        hal.stdout_tx_str(line);
        hal.stdout_tx_str("\r\n");
    }
}

/// Run `source` as a program, printing any uncaught exception
pub fn do_str<O, C, I>(hal: &mut Hal<C>, interp: &mut I, rt: &mut Runtime<O>, source: &str)
where
    O: Os,
    C: Read + Write,
    I: Interpreter<O>,
{
    let outcome = interp.exec(rt, source, ExecMode::File);
    write_crlf(hal, &outcome.output);
    if let Some(err) = outcome.error {
        write_crlf(hal, &err);
    }
}

/// Boot the port and run REPL sessions until the console closes
pub fn run_port<O, C, I>(
    config: &PortConfig,
    hal: &mut Hal<C>,
    interp: &mut I,
    rt: &mut Runtime<O>,
) -> Result<(), HalError>
where
    O: Os,
    C: Read + Write,
    I: Interpreter<O>,
{
    hal.init(&mut rt.machine.board)?;
    hal.set_interrupt_char(CTRL_C.into());
    info!("port started");

    let mut repl = Repl::new(&config.repl.banner);
    loop {
        rt.uos = uos_for(config);
        interp.init(rt);
        let exit = repl.run(hal, interp, rt);
        if exit == Exit::SoftReboot {
            hal.stdout_tx_str("MPY: soft reboot\r\n");
        }
        interp.deinit(rt);
        rt.machine.reset();
        if exit == Exit::Eof {
            info!("console closed");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mphal::mock::MockConsole;
    use spresense_hal_nuttx::sim::SimOs;

    /// Echoes its input and fails on "raise"
    #[derive(Default)]
    struct Echo {
        inits: usize,
        deinits: usize,
        runs: Vec<(String, ExecMode)>,
    }

    impl<O: Os> Interpreter<O> for Echo {
        fn init(&mut self, _rt: &mut Runtime<O>) {
            self.inits += 1;
        }

        fn deinit(&mut self, _rt: &mut Runtime<O>) {
            self.deinits += 1;
        }

        fn exec(&mut self, _rt: &mut Runtime<O>, source: &str, mode: ExecMode) -> Outcome {
            self.runs.push((source.to_string(), mode));
            if source == "raise" {
                Outcome {
                    output: String::new(),
                    error: Some("ValueError: boom".into()),
                }
            } else {
                Outcome {
                    output: source.to_uppercase(),
                    error: None,
                }
            }
        }
    }

    fn setup(input: &[u8]) -> (PortConfig, Hal<MockConsole>, Runtime<SimOs>) {
        let config = PortConfig::default();
        let hal = Hal::new(MockConsole::with_input(input), 50);
        let rt = Runtime::new(Machine::new(SimOs::spresense()), &config);
        (config, hal, rt)
    }

    #[test]
    fn test_friendly_line() {
        let (config, mut hal, mut rt) = setup(b"ab\x08c\r");
        let mut repl = Repl::new(&config.repl.banner);
        let mut echo = Echo::default();
        assert_eq!(repl.run(&mut hal, &mut echo, &mut rt), Exit::Eof);
        assert_eq!(echo.runs, vec![("ac".to_string(), ExecMode::Single)]);
        let out = hal.console().output_str();
        assert!(out.starts_with("Spresense port; SPRESENSE with cxd56\r\n"));
        assert!(out.ends_with("ab\x08 \x08c\r\nAC\r\n>>> "));
    }

    #[test]
    fn test_friendly_ctrl_c_and_ctrl_d() {
        let (config, mut hal, mut rt) = setup(b"junk\x03\x04");
        let mut repl = Repl::new(&config.repl.banner);
        let mut echo = Echo::default();
        assert_eq!(repl.run(&mut hal, &mut echo, &mut rt), Exit::SoftReboot);
        assert!(echo.runs.is_empty());
    }

    #[test]
    fn test_raw_mode_protocol() {
        let (config, mut hal, mut rt) = setup(b"\x01x=1\x04raise\x04\x02");
        let mut repl = Repl::new(&config.repl.banner);
        let mut echo = Echo::default();
        assert_eq!(repl.run(&mut hal, &mut echo, &mut rt), Exit::Eof);
        assert_eq!(repl.mode(), ReplMode::Friendly);
        assert_eq!(
            echo.runs,
            vec![
                ("x=1".to_string(), ExecMode::File),
                ("raise".to_string(), ExecMode::File)
            ]
        );
        let out = hal.console().output_str();
        assert!(out.contains("raw REPL; CTRL-B to exit\r\n>OKX=1\x04\x04>OK\x04ValueError: boom\n\x04>"));
        assert!(out.ends_with(">>> "));
    }

    #[test]
    fn test_raw_mode_survives_soft_reboot() {
        let (config, mut hal, mut rt) = setup(b"\x01\x04");
        let mut echo = Echo::default();
        run_port(&config, &mut hal, &mut echo, &mut rt).unwrap();
        let out = hal.console().output_str();
        assert!(out.contains("MPY: soft reboot\r\nraw REPL; CTRL-B to exit\r\n>"));
        assert_eq!(echo.inits, 2);
        assert_eq!(echo.deinits, 2);
    }

    #[test]
    fn test_soft_reboot_releases_peripherals_and_cwd() {
        let (config, mut hal, mut rt) = setup(b"\x04");
        let mut echo = Echo::default();
        rt.machine
            .new_object(spresense_machine::Class::Adc, &spresense_machine::Args::new().arg(0))
            .unwrap();
        rt.uos = Uos::new("/tmp");
        run_port(&config, &mut hal, &mut echo, &mut rt).unwrap();
        assert_eq!(rt.machine.os().open_count(), 0);
        assert_eq!(rt.uos.getcwd(), "/mnt/spif");
        assert!(hal.console().output_str().contains("MPY: soft reboot\r\n"));
    }

    #[test]
    fn test_do_str_prints_exception() {
        let (_config, mut hal, mut rt) = setup(b"");
        let mut echo = Echo::default();
        do_str(&mut hal, &mut echo, &mut rt, "raise");
        assert_eq!(hal.console().output_str(), "ValueError: boom\r\n");
        assert_eq!(echo.runs[0].1, ExecMode::File);
    }
}

//! Port HAL glue
//!
//! Ticks, delays and console I/O for the runtime. The console is any
//! `embedded-io` byte stream; on the board and on the host that is the
//! process stdio ([`Stdio`]).

use std::io::{Read as _, Write as _};
use std::thread;
use std::time::{Duration, Instant};

use embedded_io::{ErrorKind, ErrorType, Read, Write};
use spresense_hal_nuttx::{Board, Error as HalError, Os};

/// Process stdin/stdout as a console
#[derive(Debug, Default)]
pub struct Stdio;

impl ErrorType for Stdio {
    type Error = ErrorKind;
}

impl Read for Stdio {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::stdin().read(buf).map_err(|_| ErrorKind::Other)
    }
}

impl Write for Stdio {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::stdout().write(buf).map_err(|_| ErrorKind::Other)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::stdout().flush().map_err(|_| ErrorKind::Other)
    }
}

/// Lengths of the sleeps making up a `ms` delay
pub fn delay_slices(ms: u32, slice_ms: u32) -> impl Iterator<Item = u32> {
    let slice_ms = slice_ms.max(1);
    (0..ms.div_ceil(slice_ms)).map(move |i| (ms - i * slice_ms).min(slice_ms))
}

/// Runtime services on top of a console
#[derive(Debug)]
pub struct Hal<C> {
    console: C,
    start: Instant,
    delay_slice_ms: u32,
}

impl<C: Read + Write> Hal<C> {
    pub fn new(console: C, delay_slice_ms: u32) -> Self {
        Self {
            console,
            start: Instant::now(),
            delay_slice_ms,
        }
    }

    /// Board late initialization
    pub fn init<O: Os>(&mut self, board: &mut Board<O>) -> Result<(), HalError> {
        self.start = Instant::now();
        board.init()
    }

    /// Milliseconds since [`Hal::init`]
    pub fn ticks_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn ticks_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn delay_ms(&self, ms: u32) {
        for slice in delay_slices(ms, self.delay_slice_ms) {
            thread::sleep(Duration::from_millis(slice.into()));
        }
    }

    pub fn delay_us(&self, us: u32) {
        thread::sleep(Duration::from_micros(us.into()));
    }

    /// One console byte, `None` once the console is closed
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.console.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(_) => {
                warn!("console read failed");
                None
            }
        }
    }

    /// One console byte, 0 on end of input
    pub fn stdin_rx_chr(&mut self) -> u8 {
        self.read_byte().unwrap_or(0)
    }

    pub fn stdout_tx_strn(&mut self, data: &[u8]) {
        if self.console.write_all(data).and_then(|_| self.console.flush()).is_err() {
            warn!("console write failed");
        }
    }

    pub fn stdout_tx_str(&mut self, s: &str) {
        self.stdout_tx_strn(s.as_bytes());
    }

    /// Keyboard interrupts are not delivered on this port
    pub fn set_interrupt_char(&mut self, _c: i32) {}

    pub fn console(&self) -> &C {
        &self.console
    }
}

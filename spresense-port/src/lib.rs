//! Spresense scripting port
//!
//! Boot/REPL glue between the console, the scripting runtime and the
//! `machine`/`uos` bindings:
//!
//! - [`config`] - `port.toml`, embedded at build time
//! - [`mphal`] - ticks, delays and console I/O
//! - [`repl`] - friendly and raw REPL, soft reboot loop
//! - [`console`] - command interpreter shipped with the binary

#![deny(unsafe_code)]

#[macro_use]
extern crate spresense_hal_nuttx;

pub mod config;
pub mod console;
pub mod mphal;
pub mod repl;

#[cfg(test)]
#[path = "../build/report.rs"]
mod build_report;

pub use config::{load_config, PortConfig, EMBEDDED_CONFIG};
pub use console::CommandConsole;
pub use mphal::{Hal, Stdio};
pub use repl::{do_str, run_port, Interpreter, Runtime};

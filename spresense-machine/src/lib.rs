//! `machine` and `uos` modules for the Spresense scripting port
//!
//! The interpreter hands this crate already-converted [`Value`]s and
//! [`Args`]; the crate validates them, drives the peripheral tables in
//! `spresense-hal-nuttx` and reports failures as [`MachineError`]s tagged
//! with the exception kind the script should see.
//!
//! ```ignore
//! use spresense_machine::{Args, Class, Machine};
//! use spresense_hal_nuttx::sim::SimOs;
//!
//! let mut machine = Machine::new(SimOs::spresense());
//! let led = machine.new_object(Class::Pin, &Args::new().arg(29).arg(1))?;
//! let led = led.as_handle().unwrap();
//! machine.call_method(led, "on", &mut Args::new())?;
//! ```

#![deny(unsafe_code)]

#[macro_use]
extern crate spresense_hal_nuttx;

pub mod args;
mod classes;
pub mod error;
pub mod machine;
pub mod uos;
pub mod value;

pub use args::Args;
pub use error::{ExceptionKind, MachineError, MachineResult};
pub use machine::Machine;
pub use uos::Uos;
pub use value::{Class, Handle, Value};

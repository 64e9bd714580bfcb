//! Spresense HAL on top of NuttX device nodes
//!
//! Every peripheral is reached through a character device (`/dev/lpadc0`,
//! `/dev/pwm0`, `/dev/i2c0`, `/dev/spi4`, `/dev/ttyS2`) or the board GPIO
//! entry points. This crate keeps one table per peripheral class recording
//! which channels are open, and wraps the raw calls in the traits from
//! `spresense-hal`.
//!
//! # Backends
//!
//! - `NuttxOs` - libc calls on the board (`target_os = "nuttx"`)
//! - [`sim::SimOs`] - in-memory board for the host (`sim` feature)
//!
//! # Example
//!
//! ```ignore
//! use spresense_hal_nuttx::{adc::AdcId, sim::SimOs, Board};
//!
//! let mut board = Board::new(SimOs::spresense());
//! let a0 = AdcId::new(0)?;
//! board.adc.open(&mut board.os, a0)?;
//! let level = board.adc.read(&mut board.os, a0)?;
//! ```

#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod adc;
pub mod board;
pub mod error;
pub mod gpio;
pub mod i2c;
pub mod os;
pub mod pins;
pub mod pwm;
pub mod spi;
pub mod uart;

#[cfg(target_os = "nuttx")]
#[allow(unsafe_code)]
pub mod nuttx;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use board::Board;
pub use error::{Errno, Error};
pub use os::Os;
pub use pins::PinId;

#[cfg(target_os = "nuttx")]
pub use nuttx::NuttxOs;

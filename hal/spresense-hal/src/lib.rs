//! Spresense Hardware Abstraction Layer
//!
//! This crate defines the peripheral traits the scripting bindings are
//! written against. The NuttX implementation lives in
//! `spresense-hal-nuttx`; a host simulator implements the same traits so
//! the bindings can be tested off-target.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  spresense-machine (scripting objects)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spresense-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spresense-hal-nuttx (NuttX / SimOs)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::DigitalOutput`], [`gpio::DigitalInput`] - Digital I/O
//! - [`adc::AnalogInput`] - Analog sampling
//! - [`pwm::PwmOutput`] - Pulse-width modulation
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`uart::UartTx`], [`uart::UartRx`], [`uart::UartStatus`] - Serial communication

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod gpio;
pub mod i2c;
pub mod pwm;
pub mod spi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use adc::AnalogInput;
pub use gpio::{DigitalInput, DigitalOutput};
pub use i2c::I2cBus;
pub use pwm::PwmOutput;
pub use spi::SpiBus;
pub use uart::{UartRx, UartStatus, UartTx};

//! Spresense port binary
//!
//! On the board this runs as a NuttX application against the real device
//! nodes; anywhere else it drives the simulated board so the REPL can be
//! tried on a workstation.

use std::process::ExitCode;

#[cfg(feature = "defmt")]
use defmt_rtt as _;

use spresense_machine::Machine;
use spresense_port::{load_config, run_port, CommandConsole, Hal, Runtime, Stdio, EMBEDDED_CONFIG};

#[cfg(target_os = "nuttx")]
fn board_os() -> spresense_hal_nuttx::NuttxOs {
    spresense_hal_nuttx::NuttxOs
}

#[cfg(not(target_os = "nuttx"))]
fn board_os() -> spresense_hal_nuttx::sim::SimOs {
    spresense_hal_nuttx::sim::SimOs::spresense()
}

fn main() -> ExitCode {
    let config = load_config(EMBEDDED_CONFIG);
    let mut hal = Hal::new(Stdio, config.hal.delay_slice_ms);
    let mut rt = Runtime::new(Machine::new(board_os()), &config);
    let mut console = CommandConsole::new();

    match run_port(&config, &mut hal, &mut console, &mut rt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("spresense-port: {}", e);
            ExitCode::FAILURE
        }
    }
}

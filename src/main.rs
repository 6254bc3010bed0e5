//! # odm-transformer CLI
//!
//! Command-line interface for the OpenDroneMap transformer.
//!
//! ## Usage
//! ```bash
//! odm-transformer --metadata md.json --working_space /work /data/flight1
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}

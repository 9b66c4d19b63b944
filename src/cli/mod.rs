//! Command-line interface
//!
//! Operational commands over a local store: initialise, verify,
//! checkpoint, export, import, vacuum, and stats. The CLI never calls
//! subsystems directly; everything goes through the engine.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::run_command;
pub use errors::{CliError, CliResult};

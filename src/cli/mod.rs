//! CLI module for faultline
//!
//! Provides one command per scenario; see `args` for the list.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{BenchArgs, Cli, Command, PoolArgs};
pub use commands::{load_config, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};

//! CLI module for bluespace
//!
//! Provides command-line interface for:
//! - mine: Run search batches against a storage directory
//! - status: Report cursor and record counts
//! - lookup: Show the stored result for a coordinate
//! - verify: Validate every stored record
//! - compact: Drop superseded records

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{compact, lookup, mine, run, run_command, status, verify, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

//! bluespace CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. On failure prints a JSON
//! error response and exits non-zero (2 for fatal errors such as
//! corruption, 1 otherwise).

use bluespace::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(e.exit_code());
    }
}

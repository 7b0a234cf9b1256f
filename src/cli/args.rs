//! CLI argument definitions using clap
//!
//! Commands:
//! - bluespace mine --config <path> [--batches N]
//! - bluespace status --config <path>
//! - bluespace lookup --config <path> --x <x> --y <y>
//! - bluespace verify --config <path>
//! - bluespace compact --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bluespace - resumable keyed-hash lattice search
#[derive(Parser, Debug)]
#[command(name = "bluespace")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mine batches, resuming from the persisted cursor
    Mine {
        /// Path to configuration file
        #[arg(long, default_value = "./bluespace.json")]
        config: PathBuf,

        /// Number of batches to mine; runs until stopped when omitted
        #[arg(long)]
        batches: Option<u64>,
    },

    /// Report the cursor and record counts
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./bluespace.json")]
        config: PathBuf,
    },

    /// Print the stored result for one coordinate
    Lookup {
        /// Path to configuration file
        #[arg(long, default_value = "./bluespace.json")]
        config: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        x: i64,

        #[arg(long, allow_hyphen_values = true)]
        y: i64,
    },

    /// Re-read and validate every stored record
    Verify {
        /// Path to configuration file
        #[arg(long, default_value = "./bluespace.json")]
        config: PathBuf,
    },

    /// Drop superseded records from the result log
    Compact {
        /// Path to configuration file
        #[arg(long, default_value = "./bluespace.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

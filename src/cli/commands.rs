//! CLI command implementations
//!
//! Each command loads the configuration, opens the storage directory it
//! names (running recovery), does its work and prints one JSON response.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SearchConfig;
use crate::driver::Driver;
use crate::explorer::SpiralExplorer;
use crate::miner::Coordinate;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::storage::{FileStorage, Storage};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage directory (required)
    pub data_dir: PathBuf,

    /// Minimum log severity (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(flatten)]
    pub search: SearchConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        self.log_severity()?;
        self.search.validate()?;
        Ok(())
    }

    pub fn log_severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: String| CliError::config_error(e))
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }
}

/// Loads the config, applies its log level and logs the load.
fn load_config(path: &Path) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::set_min_severity(config.log_severity()?);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("config", &path.display().to_string()),
            ("data_dir", &config.data_dir.display().to_string()),
            ("backend", config.search.backend.as_str()),
        ],
    );
    Ok(config)
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Mine { config, batches } => mine(&config, batches),
        Command::Status { config } => status(&config),
        Command::Lookup { config, x, y } => lookup(&config, Coordinate::new(x, y)),
        Command::Verify { config } => verify(&config),
        Command::Compact { config } => compact(&config),
    }
}

/// Mine `batches` batches, or forever when `None`.
pub fn mine(config_path: &Path, batches: Option<u64>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = FileStorage::open(config.data_path())?;
    let mut driver = Driver::new(config.search, storage)?;

    match batches {
        Some(batches) => {
            let report = driver.run(batches)?;
            write_response(serde_json::to_value(&report)?)
        }
        None => loop {
            driver.run_batch()?;
        },
    }
}

/// Report the cursor and counts without mining.
pub fn status(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = FileStorage::open(config.data_path())?;
    let explorer = SpiralExplorer::open(&storage, config.search.origin)?;
    let cursor = explorer.cursor();

    write_response(json!({
        "data_dir": storage.path().display().to_string(),
        "origin": cursor.origin,
        "ring_index": cursor.ring_index,
        "step_index_within_ring": cursor.step_index_within_ring,
        "emitted": explorer.emitted().to_string(),
        "next": explorer.peek(),
        "coordinates": storage.record_count(),
        "log_records": storage.log_records(),
    }))
}

/// Print the stored result for one coordinate.
pub fn lookup(config_path: &Path, coordinate: Coordinate) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut storage = FileStorage::open(config.data_path())?;

    let data = match storage.load(coordinate)? {
        Some(item) => json!({
            "coordinate": coordinate,
            "found": true,
            "is_rare": item.is_rare(),
            "digest": item.digest().map(|d| d.to_hex()),
        }),
        None => json!({
            "coordinate": coordinate,
            "found": false,
        }),
    };
    write_response(data)
}

/// Full scan of the result log and cursor.
pub fn verify(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = FileStorage::open(config.data_path())?;
    let report = storage.verify()?;
    write_response(serde_json::to_value(&report)?)
}

/// Rewrite the result log without superseded records.
pub fn compact(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut storage = FileStorage::open(config.data_path())?;
    let stats = storage.compact()?;
    write_response(serde_json::to_value(stats)?)
}

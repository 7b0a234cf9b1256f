//! Batch mining subsystem
//!
//! A miner computes the keyed digest and rarity flag for every item of a
//! batch, in place. Backends are interchangeable trait objects and must be
//! observably equivalent: for a fixed `(coordinate, key, rarity)` every
//! backend, run and batch size yields the same digest and flag.
//!
//! # Backends
//!
//! - `cpu`: rayon data-parallel hashing over contiguous chunks
//! - `accelerator`: word-level kernel launched over a device grid

pub mod accelerator;
mod cpu;
mod errors;
pub mod hash;
mod work_item;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use accelerator::AcceleratorMiner;
pub use cpu::CpuMiner;
pub use errors::{MinerError, MinerResult};
pub use work_item::{Coordinate, Digest, WorkItem, DIGEST_LEN};

/// Capability implemented by every compute backend.
pub trait Miner: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &'static str;

    /// Fills `digest` and `is_rare` for every item of `batch`.
    ///
    /// Items are never reordered or dropped. The call blocks until the
    /// whole batch is done; on error no item is left half-classified.
    ///
    /// # Errors
    ///
    /// `ZeroRarity` if `rarity == 0`, backend errors otherwise.
    fn mine_batch(&self, batch: &mut [WorkItem], rarity: u64, key: u64) -> MinerResult<()>;
}

/// Compute backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Cpu,
    Accelerator,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = MinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Backend::Cpu),
            "accelerator" => Ok(Backend::Accelerator),
            other => Err(MinerError::InvalidConfiguration(format!(
                "unknown backend '{}', expected 'cpu' or 'accelerator'",
                other
            ))),
        }
    }
}

/// Backend construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MinerConfig {
    pub backend: Backend,
    /// CPU worker threads; `None` uses the global rayon pool
    pub threads: Option<usize>,
    /// Accelerator device ordinal
    pub device_ordinal: usize,
}

impl MinerConfig {
    pub fn cpu() -> Self {
        Self::default()
    }

    pub fn accelerator(device_ordinal: usize) -> Self {
        Self {
            backend: Backend::Accelerator,
            threads: None,
            device_ordinal,
        }
    }

    /// Same parameters with a different backend
    pub fn with_backend(&self, backend: Backend) -> Self {
        Self {
            backend,
            ..self.clone()
        }
    }
}

/// Builds the backend selected by `config`.
///
/// Falling back to the CPU backend is a caller policy; this function
/// reports `BackendUnavailable` and leaves the decision to the caller.
pub fn create_miner(config: &MinerConfig) -> MinerResult<Box<dyn Miner>> {
    match config.backend {
        Backend::Cpu => {
            let miner = match config.threads {
                Some(threads) => CpuMiner::with_threads(threads)?,
                None => CpuMiner::new(),
            };
            Ok(Box::new(miner))
        }
        Backend::Accelerator => Ok(Box::new(AcceleratorMiner::open(config.device_ordinal)?)),
    }
}

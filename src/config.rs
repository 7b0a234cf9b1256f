//! Search configuration
//!
//! All search parameters travel in one value; nothing is a global
//! constant. Validation happens before any storage is opened or any item
//! is mined.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ErrorKind;
use crate::miner::{Backend, Coordinate, MinerConfig};

/// Default rarity divisor
pub const DEFAULT_RARITY: u64 = 16384;

/// Default hash key
pub const DEFAULT_KEY: u64 = 420;

/// Default batch size (256 * 256 * 4)
pub const DEFAULT_BATCH_SIZE: usize = 256 * 256 * 4;

/// Largest accepted batch size. A batch is allocated up front, so an
/// unbounded value would abort on allocation instead of failing validation.
pub const MAX_BATCH_SIZE: usize = 1 << 24;

/// Errors raised when validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("rarity must be greater than zero")]
    ZeroRarity,

    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("batch_size {batch_size} exceeds maximum {max}")]
    BatchSizeTooLarge { batch_size: usize, max: usize },

    #[error("threads must be greater than zero when set")]
    ZeroThreads,

    #[error("fallback_to_cpu has no effect with the cpu backend")]
    FallbackWithoutAccelerator,
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidConfiguration
    }
}

/// Parameters of one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Spiral center
    pub origin: Coordinate,
    /// A digest is rare when its low 64 bits are divisible by this
    pub rarity: u64,
    /// Key mixed into every digest
    pub key: u64,
    /// Coordinates mined per batch
    pub batch_size: usize,
    pub backend: Backend,
    /// CPU worker threads; unset uses every core
    pub threads: Option<usize>,
    pub device_ordinal: usize,
    /// Use the CPU backend when the accelerator cannot initialize or fails
    pub fallback_to_cpu: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            origin: Coordinate::new(0, 0),
            rarity: DEFAULT_RARITY,
            key: DEFAULT_KEY,
            batch_size: DEFAULT_BATCH_SIZE,
            backend: Backend::Cpu,
            threads: None,
            device_ordinal: 0,
            fallback_to_cpu: false,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rarity == 0 {
            return Err(ConfigError::ZeroRarity);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::BatchSizeTooLarge {
                batch_size: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }
        if self.fallback_to_cpu && self.backend == Backend::Cpu {
            return Err(ConfigError::FallbackWithoutAccelerator);
        }
        Ok(())
    }

    /// Construction parameters for the configured backend
    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            backend: self.backend,
            threads: self.threads,
            device_ordinal: self.device_ordinal,
        }
    }

    /// Construction parameters for the fallback backend, if fallback is on
    pub fn fallback_miner_config(&self) -> Option<MinerConfig> {
        if self.fallback_to_cpu && self.backend != Backend::Cpu {
            Some(self.miner_config().with_backend(Backend::Cpu))
        } else {
            None
        }
    }
}

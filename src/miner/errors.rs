//! Miner error types

use thiserror::Error;

use crate::errors::{ErrorKind, Severity};

/// Result type for mining operations
pub type MinerResult<T> = Result<T, MinerError>;

/// Errors raised by miner backends
#[derive(Debug, Clone, Error)]
pub enum MinerError {
    #[error("rarity must be non-zero")]
    ZeroRarity,

    #[error("invalid miner configuration: {0}")]
    InvalidConfiguration(String),

    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("device '{device}' failed during kernel launch at item offset {offset}: {reason}")]
    LaunchFailed {
        device: String,
        offset: usize,
        reason: String,
    },
}

impl MinerError {
    pub fn backend_unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Classifies this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MinerError::ZeroRarity | MinerError::InvalidConfiguration(_) => {
                ErrorKind::InvalidConfiguration
            }
            MinerError::BackendUnavailable { .. } | MinerError::LaunchFailed { .. } => {
                ErrorKind::BackendUnavailable
            }
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// Whether switching to the CPU backend may resolve this error
    pub fn allows_fallback(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }
}

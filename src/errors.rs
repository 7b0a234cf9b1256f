//! Shared error classification for bluespace
//!
//! Every subsystem defines its own error type, but all of them classify
//! into one of the four kinds below so a driver can decide on a retry,
//! fallback, or abort policy without matching on subsystem internals.

use std::fmt;

/// Severity levels shared by all subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the run may continue or retry
    Error,
    /// Persistent state can no longer be trusted; the run must stop
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// The error kinds a driver needs to distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Storage medium unreachable, full or permission denied
    StorageUnavailable,
    /// A stored record failed validation on read
    CorruptRecord,
    /// The requested compute backend cannot initialize
    BackendUnavailable,
    /// Configuration rejected before any work began
    InvalidConfiguration,
}

impl ErrorKind {
    /// Stable string code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::StorageUnavailable => "BLUESPACE_STORAGE_UNAVAILABLE",
            ErrorKind::CorruptRecord => "BLUESPACE_CORRUPT_RECORD",
            ErrorKind::BackendUnavailable => "BLUESPACE_BACKEND_UNAVAILABLE",
            ErrorKind::InvalidConfiguration => "BLUESPACE_INVALID_CONFIGURATION",
        }
    }

    /// Severity of this kind
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::CorruptRecord => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether a driver may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::StorageUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

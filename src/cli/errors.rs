//! CLI-specific error types
//!
//! Every failure reaching the CLI carries a stable code: CLI-level codes for
//! configuration and terminal I/O problems, and the shared search error
//! kinds for everything raised by the library.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::driver::DriverError;
use crate::errors::{ErrorKind, Severity};
use crate::explorer::ExplorerError;
use crate::storage::StorageError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing or malformed
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Error raised by the search itself
    Search(ErrorKind),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "BLUESPACE_CLI_CONFIG_ERROR",
            Self::IoError => "BLUESPACE_CLI_IO_ERROR",
            Self::Search(kind) => kind.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    severity: Severity,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    fn search(kind: ErrorKind, severity: Severity, message: String) -> Self {
        Self {
            code: CliErrorCode::Search(kind),
            severity,
            message,
        }
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self.severity {
            Severity::Fatal => 2,
            Severity::Error => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::search(e.kind(), e.kind().severity(), e.to_string())
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::search(e.kind(), e.severity(), e.to_string())
    }
}

impl From<ExplorerError> for CliError {
    fn from(e: ExplorerError) -> Self {
        Self::search(e.kind(), e.severity(), e.to_string())
    }
}

impl From<DriverError> for CliError {
    fn from(e: DriverError) -> Self {
        Self::search(e.kind(), e.severity(), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_exits_fatal() {
        let err = CliError::from(StorageError::corruption_at_offset(58, "Checksum mismatch"));
        assert_eq!(err.code_str(), "BLUESPACE_CORRUPT_RECORD");
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("byte_offset: 58"));
    }

    #[test]
    fn test_config_error_code() {
        let err = CliError::from(ConfigError::ZeroRarity);
        assert_eq!(err.code_str(), "BLUESPACE_INVALID_CONFIGURATION");
        assert_eq!(err.exit_code(), 1);

        let err = CliError::config_error("missing data_dir");
        assert_eq!(err.code(), CliErrorCode::ConfigError);
        assert_eq!(err.to_string(), "BLUESPACE_CLI_CONFIG_ERROR: missing data_dir");
    }
}

//! Storage error types
//!
//! Error codes:
//! - BLUESPACE_STORAGE_UNAVAILABLE (ERROR) - medium unreachable, write/fsync/rename failed
//! - BLUESPACE_CORRUPT_RECORD (FATAL) - checksum or structural failure on read
//! - BLUESPACE_STORAGE_TORN_TAIL (ERROR) - incomplete trailing record from an interrupted append
//! - BLUESPACE_STORAGE_INCOMPLETE_ITEM (ERROR) - attempt to store an unmined work item

use std::fmt;
use std::io;

use crate::errors::{ErrorKind, Severity};

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure, permission denied, medium missing
    StorageUnavailable,
    /// Record failed checksum or structural validation
    CorruptRecord,
    /// Trailing bytes shorter than one record
    TornTail,
    /// Work item has no digest
    IncompleteItem,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::StorageUnavailable => "BLUESPACE_STORAGE_UNAVAILABLE",
            StorageErrorCode::CorruptRecord => "BLUESPACE_CORRUPT_RECORD",
            StorageErrorCode::TornTail => "BLUESPACE_STORAGE_TORN_TAIL",
            StorageErrorCode::IncompleteItem => "BLUESPACE_STORAGE_INCOMPLETE_ITEM",
        }
    }

    /// Returns the shared error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageErrorCode::StorageUnavailable => ErrorKind::StorageUnavailable,
            StorageErrorCode::CorruptRecord | StorageErrorCode::TornTail => {
                ErrorKind::CorruptRecord
            }
            StorageErrorCode::IncompleteItem => ErrorKind::InvalidConfiguration,
        }
    }

    /// Returns the severity level for this error.
    ///
    /// A torn tail is recoverable (it is trimmed on open), so it is not fatal
    /// even though it classifies as corruption.
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::CorruptRecord => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with full context
#[derive(Debug)]
pub struct StorageError {
    /// Error code
    code: StorageErrorCode,
    /// Human-readable message
    message: String,
    /// Context: coordinate, byte offset or cursor state
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl StorageError {
    /// Create a storage unavailable error from an I/O failure
    pub fn unavailable(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::StorageUnavailable,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a storage unavailable error without IO source
    pub fn unavailable_no_source(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::StorageUnavailable,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a corrupt record error (FATAL)
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::CorruptRecord,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a corrupt record error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::CorruptRecord,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Create a torn tail error
    pub fn torn_tail(offset: u64, bytes: u64) -> Self {
        Self {
            code: StorageErrorCode::TornTail,
            message: format!("{} trailing bytes do not form a complete record", bytes),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Create an incomplete item error
    pub fn incomplete_item(coordinate: impl fmt::Display) -> Self {
        Self {
            code: StorageErrorCode::IncompleteItem,
            message: "work item has not been mined".to_string(),
            details: Some(format!("coordinate: {}", coordinate)),
            source: None,
        }
    }

    /// Attaches context to this error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the shared error kind
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

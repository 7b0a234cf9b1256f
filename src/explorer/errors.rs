//! Explorer error types

use thiserror::Error;

use super::cursor::ExplorerCursor;
use crate::errors::{ErrorKind, Severity};
use crate::miner::Coordinate;
use crate::storage::StorageError;

/// Result type for explorer operations
pub type ExplorerResult<T> = Result<T, ExplorerError>;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("failed to load persisted cursor: {0}")]
    CursorLoad(#[source] StorageError),

    #[error("failed to persist cursor ({cursor}): {source}")]
    CursorPersist {
        cursor: ExplorerCursor,
        #[source]
        source: StorageError,
    },

    #[error("persisted cursor origin {persisted} does not match configured origin {requested}")]
    OriginMismatch {
        persisted: Coordinate,
        requested: Coordinate,
    },
}

impl ExplorerError {
    /// Classifies this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExplorerError::CursorLoad(source) => source.kind(),
            ExplorerError::CursorPersist { source, .. } => source.kind(),
            ExplorerError::OriginMismatch { .. } => ErrorKind::InvalidConfiguration,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExplorerError::CursorLoad(source) | ExplorerError::CursorPersist { source, .. } => {
                source.severity()
            }
            ExplorerError::OriginMismatch { .. } => self.kind().severity(),
        }
    }

    /// The cursor a failed persist was trying to write
    pub fn cursor(&self) -> Option<&ExplorerCursor> {
        match self {
            ExplorerError::CursorPersist { cursor, .. } => Some(cursor),
            _ => None,
        }
    }
}

//! Result storage subsystem
//!
//! Durable key-value persistence for mined work items, keyed by
//! coordinate, plus one explorer cursor under a reserved key.
//!
//! # Design Principles
//!
//! - Append-only result log, no in-place updates
//! - Checksum-verified on every read
//! - Latest record wins for the same coordinate
//! - A mutation becomes visible only once it is complete and fsynced
//! - Halt on corruption; only an unacknowledged torn tail is repaired

mod checksum;
mod cursor;
mod errors;
mod file;
mod memory;
mod reader;
mod record;
mod writer;

pub use cursor::{CursorFile, CURSOR_FILE_NAME};
pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use file::{CompactionStats, FileStorage, VerifyReport, LOG_FILE_NAME};
pub use memory::MemoryStorage;
pub use reader::RecordReader;
pub use record::{ResultRecord, RECORD_LEN};
pub use writer::RecordWriter;

use crate::explorer::ExplorerCursor;
use crate::miner::{Coordinate, WorkItem};

/// Persistence contract shared by every storage implementation.
///
/// Mutations take `&mut self`: storage is single-writer. A driver with
/// several writers wraps it in a mutex.
pub trait Storage {
    /// Idempotent upsert of a mined item.
    ///
    /// Returns only once the record is durable. On failure the prior
    /// record for the coordinate, if any, is untouched.
    fn store(&mut self, item: &WorkItem) -> StorageResult<()>;

    /// Stores every item of `items`.
    ///
    /// All items are validated before anything is written. The default
    /// stores them one by one; `FileStorage` overrides it with a single
    /// group commit.
    fn store_batch(&mut self, items: &[WorkItem]) -> StorageResult<()> {
        if let Some(item) = items.iter().find(|item| !item.is_mined()) {
            return Err(StorageError::incomplete_item(item.coordinate()));
        }
        for item in items {
            self.store(item)?;
        }
        Ok(())
    }

    fn contains(&self, coordinate: Coordinate) -> bool;

    fn load(&mut self, coordinate: Coordinate) -> StorageResult<Option<WorkItem>>;

    /// Atomically replaces the persisted cursor.
    fn save_cursor(&mut self, cursor: &ExplorerCursor) -> StorageResult<()>;

    fn load_cursor(&self) -> StorageResult<Option<ExplorerCursor>>;

    /// Distinct coordinates stored
    fn record_count(&self) -> u64;
}

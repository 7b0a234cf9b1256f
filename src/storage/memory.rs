//! In-process storage for tests and dry runs
//!
//! Same contract as `FileStorage` without durability. Write failures can
//! be injected to exercise the error paths of callers.

use std::collections::HashMap;

use super::errors::{StorageError, StorageResult};
use super::record::ResultRecord;
use super::Storage;
use crate::explorer::ExplorerCursor;
use crate::miner::{Coordinate, WorkItem};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: HashMap<Coordinate, WorkItem>,
    cursor: Option<ExplorerCursor>,
    fail_writes: bool,
    cursor_writes: u64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `store` and `save_cursor` fail with
    /// `StorageUnavailable` until reset.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful `save_cursor` calls
    pub fn cursor_writes(&self) -> u64 {
        self.cursor_writes
    }

    /// Stored items in no particular order
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    fn check_writable(&self, what: &str) -> StorageResult<()> {
        if self.fail_writes {
            return Err(StorageError::unavailable_no_source(format!(
                "injected write failure: {}",
                what
            )));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn store(&mut self, item: &WorkItem) -> StorageResult<()> {
        // same validation as the on-disk path
        let record = ResultRecord::from_item(item)?;
        self.check_writable("store")
            .map_err(|e| e.with_details(format!("coordinate: {}", record.coordinate)))?;
        self.items.insert(record.coordinate, record.into_item());
        Ok(())
    }

    fn store_batch(&mut self, items: &[WorkItem]) -> StorageResult<()> {
        let records = items
            .iter()
            .map(ResultRecord::from_item)
            .collect::<StorageResult<Vec<_>>>()?;
        self.check_writable("store_batch")?;
        for record in records {
            self.items.insert(record.coordinate, record.into_item());
        }
        Ok(())
    }

    fn contains(&self, coordinate: Coordinate) -> bool {
        self.items.contains_key(&coordinate)
    }

    fn load(&mut self, coordinate: Coordinate) -> StorageResult<Option<WorkItem>> {
        Ok(self.items.get(&coordinate).cloned())
    }

    fn save_cursor(&mut self, cursor: &ExplorerCursor) -> StorageResult<()> {
        self.check_writable("save_cursor")
            .map_err(|e| e.with_details(format!("cursor: {}", cursor)))?;
        self.cursor = Some(*cursor);
        self.cursor_writes += 1;
        Ok(())
    }

    fn load_cursor(&self) -> StorageResult<Option<ExplorerCursor>> {
        Ok(self.cursor)
    }

    fn record_count(&self) -> u64 {
        self.items.len() as u64
    }
}

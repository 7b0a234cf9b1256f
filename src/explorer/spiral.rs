//! Resumable square-spiral explorer

use super::cursor::ExplorerCursor;
use super::errors::{ExplorerError, ExplorerResult};
use crate::miner::Coordinate;
use crate::observability::{log_event_with_fields, Event};
use crate::storage::{Storage, StorageError};

/// Lazy, infinite, restartable sequence of lattice coordinates.
///
/// Holds two cursors: the in-memory position of the next cell to emit and
/// the last position made durable. `next` keeps them equal; `next_batch`
/// lets the in-memory cursor run ahead until `flush`.
#[derive(Debug, Clone)]
pub struct SpiralExplorer {
    cursor: ExplorerCursor,
    persisted: ExplorerCursor,
}

impl SpiralExplorer {
    /// Resumes from the cursor persisted in `storage`, or starts at the
    /// origin when none was ever saved.
    ///
    /// # Errors
    ///
    /// - `OriginMismatch` if the persisted cursor belongs to another origin
    /// - `CursorLoad` if the cursor cannot be read or does not validate
    pub fn open<S: Storage + ?Sized>(storage: &S, origin: Coordinate) -> ExplorerResult<Self> {
        let persisted = match storage.load_cursor().map_err(ExplorerError::CursorLoad)? {
            Some(cursor) => {
                if !cursor.is_valid() {
                    return Err(ExplorerError::CursorLoad(StorageError::corrupt(format!(
                        "Cursor position out of range: {}",
                        cursor
                    ))));
                }
                if cursor.origin != origin {
                    return Err(ExplorerError::OriginMismatch {
                        persisted: cursor.origin,
                        requested: origin,
                    });
                }
                log_event_with_fields(
                    Event::CursorResumed,
                    &[
                        ("ring", &cursor.ring_index.to_string()),
                        ("step", &cursor.step_index_within_ring.to_string()),
                        ("emitted", &cursor.index().to_string()),
                    ],
                );
                cursor
            }
            None => {
                log_event_with_fields(Event::CursorFresh, &[("origin", &origin.to_string())]);
                ExplorerCursor::start(origin)
            }
        };

        Ok(Self {
            cursor: persisted,
            persisted,
        })
    }

    /// Returns the next coordinate, persisting the advanced cursor first.
    ///
    /// On failure the explorer does not advance; calling again retries the
    /// same coordinate.
    pub fn next<S: Storage + ?Sized>(&mut self, storage: &mut S) -> ExplorerResult<Coordinate> {
        let cell = self.cursor.coordinate();
        let advanced = self.cursor.advanced();
        storage
            .save_cursor(&advanced)
            .map_err(|source| ExplorerError::CursorPersist {
                cursor: advanced,
                source,
            })?;
        self.cursor = advanced;
        self.persisted = advanced;
        Ok(cell)
    }

    /// Emits `count` coordinates advancing only the in-memory cursor.
    ///
    /// Until `flush` succeeds a restart re-emits the same coordinates.
    pub fn next_batch(&mut self, count: usize) -> Vec<Coordinate> {
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            batch.push(self.cursor.coordinate());
            self.cursor = self.cursor.advanced();
        }
        batch
    }

    /// Makes the in-memory cursor durable. No-op when nothing is pending.
    pub fn flush<S: Storage + ?Sized>(&mut self, storage: &mut S) -> ExplorerResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        storage
            .save_cursor(&self.cursor)
            .map_err(|source| ExplorerError::CursorPersist {
                cursor: self.cursor,
                source,
            })?;
        self.persisted = self.cursor;
        log_event_with_fields(
            Event::CursorFlushed,
            &[("emitted", &self.cursor.index().to_string())],
        );
        Ok(())
    }

    /// Discards unflushed emissions.
    pub fn rewind(&mut self) {
        self.cursor = self.persisted;
    }

    /// The next coordinate `next` would return
    pub fn peek(&self) -> Coordinate {
        self.cursor.coordinate()
    }

    pub fn cursor(&self) -> ExplorerCursor {
        self.cursor
    }

    pub fn persisted_cursor(&self) -> ExplorerCursor {
        self.persisted
    }

    pub fn is_dirty(&self) -> bool {
        self.cursor != self.persisted
    }

    pub fn origin(&self) -> Coordinate {
        self.cursor.origin
    }

    /// Cells emitted so far over the explorer's whole lifetime
    pub fn emitted(&self) -> u128 {
        self.cursor.index()
    }
}

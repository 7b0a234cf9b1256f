//! Durable explorer cursor file
//!
//! Location: `<storage_dir>/cursor.json`, the reserved key of the store.
//!
//! Atomicity is achieved via:
//! 1. Write to `cursor.json.tmp`
//! 2. fsync temp file
//! 3. Rename temp to final (atomic on POSIX)
//! 4. fsync the directory so the rename is durable
//!
//! A crash at any point leaves either the previous cursor or the new one.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checksum::compute_checksum_parts;
use super::errors::{StorageError, StorageResult};
use super::writer::sync_dir;
use crate::crash_point::{maybe_crash, points};
use crate::explorer::ExplorerCursor;
use crate::miner::Coordinate;

/// Cursor file name
pub const CURSOR_FILE_NAME: &str = "cursor.json";

/// Cursor file format version
pub const CURSOR_FORMAT_VERSION: u8 = 1;

/// On-disk representation of the cursor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CursorMarker {
    format_version: u8,
    origin: Coordinate,
    ring_index: u64,
    step_index_within_ring: u64,
    /// Cells emitted before this cursor, informational
    emitted: String,
    /// Time of the write, not covered by the checksum
    saved_at: DateTime<Utc>,
    checksum: u32,
}

impl CursorMarker {
    fn checksum_of(format_version: u8, cursor: &ExplorerCursor) -> u32 {
        compute_checksum_parts(&[
            &[format_version],
            &cursor.origin.x.to_le_bytes(),
            &cursor.origin.y.to_le_bytes(),
            &cursor.ring_index.to_le_bytes(),
            &cursor.step_index_within_ring.to_le_bytes(),
        ])
    }

    fn new(cursor: &ExplorerCursor) -> Self {
        Self {
            format_version: CURSOR_FORMAT_VERSION,
            origin: cursor.origin,
            ring_index: cursor.ring_index,
            step_index_within_ring: cursor.step_index_within_ring,
            emitted: cursor.index().to_string(),
            saved_at: Utc::now(),
            checksum: Self::checksum_of(CURSOR_FORMAT_VERSION, cursor),
        }
    }

    fn cursor(&self) -> ExplorerCursor {
        ExplorerCursor {
            origin: self.origin,
            ring_index: self.ring_index,
            step_index_within_ring: self.step_index_within_ring,
        }
    }

    fn validate(&self, path: &Path) -> StorageResult<ExplorerCursor> {
        let context = format!("path: {}", path.display());
        if self.format_version != CURSOR_FORMAT_VERSION {
            return Err(StorageError::corrupt(format!(
                "Unsupported cursor format version: {}",
                self.format_version
            ))
            .with_details(context));
        }
        let cursor = self.cursor();
        let computed = Self::checksum_of(self.format_version, &cursor);
        if computed != self.checksum {
            return Err(StorageError::corrupt(format!(
                "Cursor checksum mismatch: computed {:08x}, stored {:08x}",
                computed, self.checksum
            ))
            .with_details(context));
        }
        if !cursor.is_valid() {
            return Err(StorageError::corrupt(format!(
                "Cursor position out of range: {}",
                cursor
            ))
            .with_details(context));
        }
        Ok(cursor)
    }
}

/// Atomic read/write of the cursor file.
pub struct CursorFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl CursorFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CURSOR_FILE_NAME),
            temp_path: dir.join(format!("{}.tmp", CURSOR_FILE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes a temp file left by a crash before the rename.
    ///
    /// Returns whether one was found.
    pub fn discard_stale_temp(&self) -> StorageResult<bool> {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::unavailable(
                format!("Failed to remove stale cursor temp file: {}", self.temp_path.display()),
                e,
            )),
        }
    }

    /// Writes the cursor atomically.
    pub fn write(&self, cursor: &ExplorerCursor) -> StorageResult<()> {
        let context = || format!("cursor: {}", cursor);
        let content = serde_json::to_string_pretty(&CursorMarker::new(cursor)).map_err(|e| {
            StorageError::unavailable_no_source(format!("Failed to serialize cursor: {}", e))
                .with_details(context())
        })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| {
                StorageError::unavailable(
                    format!("Failed to create temp cursor file: {}", self.temp_path.display()),
                    e,
                )
                .with_details(context())
            })?;

        file.write_all(content.as_bytes()).map_err(|e| {
            StorageError::unavailable("Failed to write temp cursor file", e).with_details(context())
        })?;

        file.sync_all().map_err(|e| {
            StorageError::unavailable("Failed to fsync temp cursor file", e).with_details(context())
        })?;
        drop(file);

        maybe_crash(points::CURSOR_BEFORE_RENAME);

        fs::rename(&self.temp_path, &self.path).map_err(|e| {
            StorageError::unavailable("Failed to atomically commit cursor file", e)
                .with_details(context())
        })?;

        maybe_crash(points::CURSOR_AFTER_RENAME);

        // fsync the directory so the rename survives a crash
        if let Some(parent) = self.path.parent() {
            sync_dir(parent).map_err(|e| e.with_details(context()))?;
        }

        Ok(())
    }

    /// Reads the cursor if present.
    ///
    /// - `Ok(None)` if no cursor was ever saved
    /// - `Err(CorruptRecord)` if the file does not validate
    pub fn read(&self) -> StorageResult<Option<ExplorerCursor>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == IoErrorKind::InvalidData => {
                return Err(StorageError::corrupt("Cursor file is not valid UTF-8")
                    .with_details(format!("path: {}", self.path.display())))
            }
            Err(e) => {
                return Err(StorageError::unavailable(
                    format!("Failed to read cursor file: {}", self.path.display()),
                    e,
                ))
            }
        };

        let marker: CursorMarker = serde_json::from_str(&content).map_err(|e| {
            StorageError::corrupt(format!("Failed to parse cursor file: {}", e))
                .with_details(format!("path: {}", self.path.display()))
        })?;

        marker.validate(&self.path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorCode;
    use tempfile::TempDir;

    fn cursor(ring: u64, step: u64) -> ExplorerCursor {
        ExplorerCursor {
            origin: Coordinate::new(3, -3),
            ring_index: ring,
            step_index_within_ring: step,
        }
    }

    #[test]
    fn test_missing_cursor_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        assert!(file.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        file.write(&cursor(4, 17)).unwrap();
        assert_eq!(file.read().unwrap(), Some(cursor(4, 17)));

        // overwrite
        file.write(&cursor(5, 0)).unwrap();
        assert_eq!(file.read().unwrap(), Some(cursor(5, 0)));
        assert!(!temp_dir.path().join("cursor.json.tmp").exists());
    }

    #[test]
    fn test_tampered_position_detected() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        file.write(&cursor(4, 17)).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&content).unwrap();
        value["ring_index"] = serde_json::json!(3);
        fs::write(file.path(), value.to_string()).unwrap();

        let err = file.read().unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::CorruptRecord);
        assert!(err.message().contains("checksum"));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        fs::write(file.path(), "{ not json").unwrap();
        let err = file.read().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stale_temp_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        fs::write(temp_dir.path().join("cursor.json.tmp"), "partial").unwrap();
        assert!(file.discard_stale_temp().unwrap());
        assert!(!file.discard_stale_temp().unwrap());
    }

    #[test]
    fn test_marker_records_emitted_count() {
        let temp_dir = TempDir::new().unwrap();
        let file = CursorFile::new(temp_dir.path());
        file.write(&cursor(1, 3)).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(value["emitted"], "4");
    }
}

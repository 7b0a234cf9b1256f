//! Result log writer with fsync enforcement
//!
//! Records are appended to `results.dat` and fsynced before the write is
//! acknowledged. A record only becomes visible through the coordinate
//! index once it is completely and durably written, so readers see the old
//! or the new value for a coordinate, never a mix.
//!
//! A failed append is rolled back by truncating the log to its length
//! before the write. If even the rollback fails the writer refuses further
//! appends; reopening the storage trims the torn tail.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{ResultRecord, RECORD_LEN};
use crate::crash_point::{maybe_crash, points};

/// Append-only writer for the result log.
pub struct RecordWriter {
    /// Path to the result log
    path: PathBuf,
    /// Underlying file handle (append mode)
    file: File,
    /// Length of the durable, well-formed log
    len: u64,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl RecordWriter {
    /// Opens or creates the result log.
    ///
    /// The caller is responsible for having trimmed any torn tail; the log
    /// length must be a multiple of `RECORD_LEN`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                StorageError::unavailable(
                    format!("Failed to open result log: {}", path.display()),
                    e,
                )
            })?;

        let len = file
            .metadata()
            .map_err(|e| StorageError::unavailable("Failed to read result log metadata", e))?
            .len();

        if len % RECORD_LEN as u64 != 0 {
            return Err(StorageError::torn_tail(
                len - len % RECORD_LEN as u64,
                len % RECORD_LEN as u64,
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the durable log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of records in the log, including superseded ones
    pub fn record_count(&self) -> u64 {
        self.len / RECORD_LEN as u64
    }

    /// Appends one record with fsync. Returns its byte offset.
    pub fn append(&mut self, record: &ResultRecord) -> StorageResult<u64> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Appends several records with a single fsync.
    ///
    /// Returns the byte offset of the first record; record `i` lives at
    /// `offset + i * RECORD_LEN`. Either all records are durable when this
    /// returns `Ok`, or none are visible.
    pub fn append_all(&mut self, records: &[ResultRecord]) -> StorageResult<u64> {
        if self.poisoned {
            return Err(StorageError::unavailable_no_source(
                "Result log is in an unknown state after a failed rollback; reopen storage",
            ));
        }

        let start = self.len;
        if records.is_empty() {
            return Ok(start);
        }

        let mut buf = Vec::with_capacity(records.len() * RECORD_LEN);
        for record in records {
            buf.extend_from_slice(&record.serialize());
        }

        maybe_crash(points::STORAGE_BEFORE_APPEND);

        if let Err(e) = self.file.write_all(&buf) {
            self.rollback(start);
            return Err(StorageError::unavailable(
                format!("Failed to append {} record(s)", records.len()),
                e,
            )
            .with_details(format!("byte_offset: {}", start)));
        }

        maybe_crash(points::STORAGE_AFTER_APPEND);

        // fsync - mandatory for durability
        if let Err(e) = self.file.sync_all() {
            self.rollback(start);
            return Err(StorageError::unavailable(
                format!("fsync failed after appending {} record(s)", records.len()),
                e,
            )
            .with_details(format!("byte_offset: {}", start)));
        }

        maybe_crash(points::STORAGE_AFTER_FSYNC);

        self.len += buf.len() as u64;
        Ok(start)
    }

    /// Truncates the log back to `len` after a failed append.
    fn rollback(&mut self, len: u64) {
        let restored = self
            .file
            .set_len(len)
            .and_then(|_| self.file.sync_all())
            .is_ok();
        if !restored {
            self.poisoned = true;
        }
    }
}

/// fsyncs a directory so renames and new files inside it are durable.
pub(super) fn sync_dir(dir: &Path) -> StorageResult<()> {
    let handle = File::open(dir).map_err(|e| {
        StorageError::unavailable(
            format!("Failed to open directory for fsync: {}", dir.display()),
            e,
        )
    })?;
    handle.sync_all().map_err(|e| {
        StorageError::unavailable(format!("Failed to fsync directory: {}", dir.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{hash, Coordinate};
    use crate::storage::reader::RecordReader;
    use crate::storage::StorageErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn record(x: i64) -> ResultRecord {
        let coordinate = Coordinate::new(x, 0);
        ResultRecord {
            coordinate,
            is_rare: false,
            digest: hash::keyed_digest(1, coordinate),
        }
    }

    #[test]
    fn test_append_offsets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        let mut writer = RecordWriter::open(&path).unwrap();

        assert!(writer.is_empty());
        assert_eq!(writer.append(&record(1)).unwrap(), 0);
        assert_eq!(writer.append(&record(2)).unwrap(), RECORD_LEN as u64);
        assert_eq!(writer.record_count(), 2);
    }

    #[test]
    fn test_append_all_single_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        let mut writer = RecordWriter::open(&path).unwrap();

        let records: Vec<_> = (0..10).map(record).collect();
        let start = writer.append_all(&records).unwrap();
        assert_eq!(start, 0);
        assert_eq!(writer.len(), 10 * RECORD_LEN as u64);

        let mut reader = RecordReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), records);
    }

    #[test]
    fn test_reopen_continues_at_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        {
            let mut writer = RecordWriter::open(&path).unwrap();
            writer.append(&record(1)).unwrap();
        }
        let mut writer = RecordWriter::open(&path).unwrap();
        assert_eq!(writer.append(&record(2)).unwrap(), RECORD_LEN as u64);
    }

    #[test]
    fn test_open_refuses_torn_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        fs::write(&path, [0u8; 7]).unwrap();
        let err = RecordWriter::open(&path).err().unwrap();
        assert_eq!(err.code(), StorageErrorCode::TornTail);
    }
}

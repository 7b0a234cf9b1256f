//! Result log reader with strict corruption detection
//!
//! Used for the startup scan that rebuilds the coordinate index, for
//! point lookups by offset, and for full verification. Every read
//! validates the record checksum; any failure is surfaced, never skipped.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{ResultRecord, RECORD_LEN};

/// Sequential and random-access reader over `results.dat`.
pub struct RecordReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Current byte offset
    current_offset: u64,
    /// File size captured at open (or last `refresh`)
    file_size: u64,
}

impl RecordReader {
    /// Opens the result log for reading.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path).map_err(|e| {
            StorageError::unavailable(format!("Failed to open result log: {}", path.display()), e)
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StorageError::unavailable("Failed to read result log metadata", e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Re-reads the file size after the log has grown or shrunk.
    pub fn refresh(&mut self) -> StorageResult<()> {
        self.file_size = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| StorageError::unavailable("Failed to read result log metadata", e))?
            .len();
        Ok(())
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if a record was read
    /// - `Ok(None)` at end of file
    /// - `Err(TornTail)` if fewer than `RECORD_LEN` bytes remain
    /// - `Err(CorruptRecord)` on any validation failure
    pub fn read_next(&mut self) -> StorageResult<Option<ResultRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < RECORD_LEN as u64 {
            return Err(StorageError::torn_tail(self.current_offset, remaining));
        }

        let mut buf = [0u8; RECORD_LEN];
        let offset = self.current_offset;
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| read_error(offset, e))?;

        let record = ResultRecord::deserialize(&buf, self.current_offset)?;
        self.current_offset += RECORD_LEN as u64;
        Ok(Some(record))
    }

    /// Seeks to a specific offset in the file.
    pub fn seek_to(&mut self, offset: u64) -> StorageResult<()> {
        self.reader.seek(SeekFrom::Start(offset)).map_err(|e| {
            StorageError::unavailable(format!("Failed to seek to offset {}", offset), e)
        })?;
        self.current_offset = offset;
        Ok(())
    }

    /// Reads the record at `offset`, validating its checksum.
    ///
    /// Does not rely on the cached file size, so records appended after
    /// this reader was opened are readable.
    pub fn read_at(&mut self, offset: u64) -> StorageResult<ResultRecord> {
        self.seek_to(offset)?;
        let mut buf = [0u8; RECORD_LEN];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| read_error(offset, e))?;
        let record = ResultRecord::deserialize(&buf, offset)?;
        self.current_offset = offset + RECORD_LEN as u64;
        Ok(record)
    }

    /// Resets reader to beginning of file.
    pub fn reset(&mut self) -> StorageResult<()> {
        self.seek_to(0)
    }

    /// Visits every record in file order with its byte offset.
    ///
    /// Stops at the first error.
    pub fn scan<F>(&mut self, mut visit: F) -> StorageResult<u64>
    where
        F: FnMut(u64, ResultRecord),
    {
        self.reset()?;
        let mut count = 0;
        loop {
            let offset = self.current_offset;
            match self.read_next()? {
                Some(record) => {
                    visit(offset, record);
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Reads all records from the log.
    pub fn read_all(&mut self) -> StorageResult<Vec<ResultRecord>> {
        let mut records = Vec::new();
        self.scan(|_, record| records.push(record))?;
        Ok(records)
    }
}

/// A record that ends early is corruption; any other read failure is the
/// device's, not the log's.
fn read_error(offset: u64, e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        StorageError::corruption_at_offset(offset, format!("Failed to read record: {}", e))
    } else {
        StorageError::unavailable(format!("Failed to read record at offset {}", offset), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{hash, Coordinate};
    use crate::storage::StorageErrorCode;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn record(x: i64) -> ResultRecord {
        let coordinate = Coordinate::new(x, x + 1);
        ResultRecord {
            coordinate,
            is_rare: x % 2 == 0,
            digest: hash::keyed_digest(420, coordinate),
        }
    }

    fn write_log(path: &Path, records: &[ResultRecord]) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for r in records {
            file.write_all(&r.serialize()).unwrap();
        }
    }

    #[test]
    fn test_read_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        fs::write(&path, b"").unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_scan_reports_offsets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1), record(2), record(3)]);

        let mut reader = RecordReader::open(&path).unwrap();
        let mut seen = Vec::new();
        let count = reader.scan(|offset, r| seen.push((offset, r))).unwrap();

        assert_eq!(count, 3);
        assert_eq!(seen[0].0, 0);
        assert_eq!(seen[2].0, 2 * RECORD_LEN as u64);
        assert_eq!(seen[2].1, record(3));
    }

    #[test]
    fn test_read_at_after_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1)]);

        let mut reader = RecordReader::open(&path).unwrap();
        write_log(&path, &[record(2)]);

        let r = reader.read_at(RECORD_LEN as u64).unwrap();
        assert_eq!(r, record(2));
    }

    #[test]
    fn test_torn_tail_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1)]);
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&record(2).serialize()[..17]).unwrap();
        }

        let mut reader = RecordReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        let err = reader.read_next().unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::TornTail);
        assert_eq!(err.details(), Some("byte_offset: 58"));
    }

    #[test]
    fn test_corruption_halts_scan() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1), record(2), record(3)]);

        let mut bytes = fs::read(&path).unwrap();
        bytes[RECORD_LEN + 10] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        let err = reader.read_all().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), StorageErrorCode::CorruptRecord);
    }

    #[test]
    fn test_refresh_sees_growth() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1)]);

        let mut reader = RecordReader::open(&path).unwrap();
        write_log(&path, &[record(2)]);
        assert_eq!(reader.file_size(), RECORD_LEN as u64);
        reader.refresh().unwrap();
        assert_eq!(reader.file_size(), 2 * RECORD_LEN as u64);
        assert_eq!(reader.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_read_at_past_end_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.dat");
        write_log(&path, &[record(1)]);

        let mut reader = RecordReader::open(&path).unwrap();
        let err = reader.read_at(RECORD_LEN as u64).unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::CorruptRecord);
    }

    #[test]
    fn test_read_error_classification() {
        let eof = read_error(116, io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        assert_eq!(eof.code(), StorageErrorCode::CorruptRecord);

        let eio = read_error(116, io::Error::new(io::ErrorKind::Other, "input/output error"));
        assert_eq!(eio.code(), StorageErrorCode::StorageUnavailable);
        assert!(!eio.is_fatal());
    }
}

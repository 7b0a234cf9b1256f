//! Directory-backed storage
//!
//! Layout of a storage directory:
//!
//! ```text
//! <dir>/results.dat      append-only result log (fixed-size records)
//! <dir>/cursor.json      explorer cursor, the reserved key
//! ```
//!
//! On open the log is scanned front to back to rebuild the coordinate
//! index. A trailing fragment shorter than one record can only come from an
//! append that was never acknowledged and is trimmed. Any record that fails
//! validation halts the open with `CorruptRecord`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::cursor::CursorFile;
use super::errors::{StorageError, StorageResult};
use super::reader::RecordReader;
use super::record::{ResultRecord, RECORD_LEN};
use super::writer::{sync_dir, RecordWriter};
use super::Storage;
use crate::crash_point::{maybe_crash, points};
use crate::explorer::ExplorerCursor;
use crate::miner::{Coordinate, WorkItem};
use crate::observability::{log_event_with_fields, Event, ObservationScope};

/// Result log file name
pub const LOG_FILE_NAME: &str = "results.dat";

const COMPACT_TEMP_NAME: &str = "results.dat.compact";

/// Outcome of a full verification scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Records in the log, superseded ones included
    pub log_records: u64,
    /// Distinct coordinates stored
    pub coordinates: u64,
    /// Distinct coordinates whose latest record is rare
    pub rare: u64,
    pub log_bytes: u64,
    pub cursor: Option<ExplorerCursor>,
}

/// Outcome of a compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    pub records_before: u64,
    pub records_after: u64,
    pub bytes_reclaimed: u64,
}

/// Storage backed by a directory on the local filesystem.
pub struct FileStorage {
    dir: PathBuf,
    writer: RecordWriter,
    reader: RecordReader,
    /// Coordinate -> byte offset of its latest record
    index: HashMap<Coordinate, u64>,
    cursor_file: CursorFile,
}

impl FileStorage {
    /// Opens (creating if needed) the storage directory and recovers it.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_durable_dir(&dir)?;

        let cursor_file = CursorFile::new(&dir);
        if cursor_file.discard_stale_temp()? {
            log_event_with_fields(
                Event::StaleCursorTempRemoved,
                &[("dir", &dir.display().to_string())],
            );
        }
        remove_if_exists(&dir.join(COMPACT_TEMP_NAME))?;

        let log_path = dir.join(LOG_FILE_NAME);
        trim_torn_tail(&log_path)?;

        let log_existed = log_path.exists();
        let writer = RecordWriter::open(&log_path)?;
        if !log_existed {
            sync_dir(&dir)?;
        }
        let mut reader = RecordReader::open(&log_path)?;
        let index = match build_index(&mut reader) {
            Ok(index) => index,
            Err(e) => {
                log_event_with_fields(
                    Event::StorageCorruption,
                    &[
                        ("path", &log_path.display().to_string()),
                        ("error", &e.to_string()),
                    ],
                );
                return Err(e);
            }
        };

        log_event_with_fields(
            Event::StorageOpened,
            &[
                ("dir", &dir.display().to_string()),
                ("coordinates", &index.len().to_string()),
                ("log_records", &writer.record_count().to_string()),
            ],
        );

        Ok(Self {
            dir,
            writer,
            reader,
            index,
            cursor_file,
        })
    }

    /// Storage directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Records in the log, including superseded ones
    pub fn log_records(&self) -> u64 {
        self.writer.record_count()
    }

    /// Re-reads the whole log from disk, validating every record, and the
    /// cursor file.
    pub fn verify(&self) -> StorageResult<VerifyReport> {
        let mut reader = RecordReader::open(self.writer.path())?;
        let mut latest: HashMap<Coordinate, bool> = HashMap::new();
        let log_records = reader.scan(|_, record| {
            latest.insert(record.coordinate, record.is_rare);
        })?;

        Ok(VerifyReport {
            log_records,
            coordinates: latest.len() as u64,
            rare: latest.values().filter(|rare| **rare).count() as u64,
            log_bytes: reader.file_size(),
            cursor: self.cursor_file.read()?,
        })
    }

    /// Rewrites the log keeping only the latest record per coordinate.
    ///
    /// The new log is written beside the live one, fsynced, then renamed
    /// over it. A crash at any point leaves either the old or the new log,
    /// both of which index to the same contents.
    pub fn compact(&mut self) -> StorageResult<CompactionStats> {
        let scope = ObservationScope::with_fields(
            "STORAGE_COMPACT",
            &[("dir", &self.dir.display().to_string())],
        );
        match self.compact_inner() {
            Ok(stats) => {
                scope.complete_with_fields(&[
                    ("records_before", &stats.records_before.to_string()),
                    ("records_after", &stats.records_after.to_string()),
                ]);
                log_event_with_fields(
                    Event::StorageCompacted,
                    &[("bytes_reclaimed", &stats.bytes_reclaimed.to_string())],
                );
                Ok(stats)
            }
            Err(e) => {
                if e.is_fatal() {
                    scope.fail_fatal(&e.to_string());
                } else {
                    scope.fail(&e.to_string());
                }
                Err(e)
            }
        }
    }

    fn compact_inner(&mut self) -> StorageResult<CompactionStats> {
        let records_before = self.writer.record_count();
        let bytes_before = self.writer.len();

        // keep log order so a compacted log reads like the original
        let mut live: Vec<(u64, Coordinate)> =
            self.index.iter().map(|(c, offset)| (*offset, *c)).collect();
        live.sort_unstable_by_key(|(offset, _)| *offset);

        let mut records = Vec::with_capacity(live.len());
        for (offset, coordinate) in &live {
            records.push(self.read_indexed(*coordinate, *offset)?);
        }

        let temp_path = self.dir.join(COMPACT_TEMP_NAME);
        remove_if_exists(&temp_path)?;
        {
            let mut temp = RecordWriter::open(&temp_path)?;
            temp.append_all(&records)?;
        }

        maybe_crash(points::COMPACT_BEFORE_RENAME);

        let log_path = self.writer.path().to_path_buf();
        fs::rename(&temp_path, &log_path).map_err(|e| {
            StorageError::unavailable("Failed to replace result log with compacted log", e)
                .with_details(format!("path: {}", log_path.display()))
        })?;
        sync_dir(&self.dir)?;

        self.writer = RecordWriter::open(&log_path)?;
        self.reader = RecordReader::open(&log_path)?;
        self.index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.coordinate, (i * RECORD_LEN) as u64))
            .collect();

        Ok(CompactionStats {
            records_before,
            records_after: self.writer.record_count(),
            bytes_reclaimed: bytes_before - self.writer.len(),
        })
    }

    fn read_indexed(&mut self, coordinate: Coordinate, offset: u64) -> StorageResult<ResultRecord> {
        let record = self.reader.read_at(offset)?;
        if record.coordinate != coordinate {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!(
                    "Index points at {} but record holds {}",
                    coordinate, record.coordinate
                ),
            ));
        }
        Ok(record)
    }

    /// Keeps the last record per coordinate and drops those identical to
    /// what is already stored.
    fn changed(&mut self, records: Vec<ResultRecord>) -> StorageResult<Vec<ResultRecord>> {
        let mut latest: Vec<ResultRecord> = Vec::with_capacity(records.len());
        let mut slots: HashMap<Coordinate, usize> = HashMap::with_capacity(records.len());
        for record in records {
            match slots.get(&record.coordinate) {
                Some(&slot) => latest[slot] = record,
                None => {
                    slots.insert(record.coordinate, latest.len());
                    latest.push(record);
                }
            }
        }

        let mut pending = Vec::with_capacity(latest.len());
        for record in latest {
            let unchanged = match self.index.get(&record.coordinate).copied() {
                Some(offset) => self.read_indexed(record.coordinate, offset)? == record,
                None => false,
            };
            if !unchanged {
                pending.push(record);
            }
        }
        Ok(pending)
    }

    fn append(&mut self, records: Vec<ResultRecord>) -> StorageResult<()> {
        let records = self.changed(records)?;
        if records.is_empty() {
            return Ok(());
        }
        let start = self.writer.append_all(&records)?;
        // publish only after the append is durable
        for (i, record) in records.iter().enumerate() {
            self.index
                .insert(record.coordinate, start + (i * RECORD_LEN) as u64);
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn store(&mut self, item: &WorkItem) -> StorageResult<()> {
        let record = ResultRecord::from_item(item)?;
        self.append(vec![record])
    }

    fn store_batch(&mut self, items: &[WorkItem]) -> StorageResult<()> {
        let records = items
            .iter()
            .map(ResultRecord::from_item)
            .collect::<StorageResult<Vec<_>>>()?;
        self.append(records)
    }

    fn contains(&self, coordinate: Coordinate) -> bool {
        self.index.contains_key(&coordinate)
    }

    fn load(&mut self, coordinate: Coordinate) -> StorageResult<Option<WorkItem>> {
        let Some(offset) = self.index.get(&coordinate).copied() else {
            return Ok(None);
        };
        self.read_indexed(coordinate, offset)
            .map(|record| Some(record.into_item()))
    }

    fn save_cursor(&mut self, cursor: &ExplorerCursor) -> StorageResult<()> {
        self.cursor_file.write(cursor)
    }

    fn load_cursor(&self) -> StorageResult<Option<ExplorerCursor>> {
        self.cursor_file.read()
    }

    fn record_count(&self) -> u64 {
        self.index.len() as u64
    }
}

fn build_index(reader: &mut RecordReader) -> StorageResult<HashMap<Coordinate, u64>> {
    let mut index = HashMap::new();
    reader.scan(|offset, record| {
        index.insert(record.coordinate, offset);
    })?;
    Ok(index)
}

/// Creates `dir` and any missing ancestors, syncing the parent of each
/// directory it creates so the new entries survive a crash.
fn create_durable_dir(dir: &Path) -> StorageResult<()> {
    let mut missing = Vec::new();
    let mut next = Some(dir);
    while let Some(path) = next {
        if path.as_os_str().is_empty() || path.is_dir() {
            break;
        }
        missing.push(path);
        next = path.parent();
    }
    if missing.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|e| {
        StorageError::unavailable(
            format!("Failed to create storage directory: {}", dir.display()),
            e,
        )
    })?;

    // deepest first, so each parent is synced after its child entry exists
    for path in missing {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        sync_dir(parent)?;
    }
    Ok(())
}

/// Truncates a trailing fragment shorter than one record.
fn trim_torn_tail(log_path: &Path) -> StorageResult<()> {
    let len = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(StorageError::unavailable(
                format!("Failed to read result log metadata: {}", log_path.display()),
                e,
            ))
        }
    };

    let torn = len % RECORD_LEN as u64;
    if torn == 0 {
        return Ok(());
    }
    let valid = len - torn;

    let file = OpenOptions::new().write(true).open(log_path).map_err(|e| {
        StorageError::unavailable("Failed to open result log for tail trim", e)
    })?;
    file.set_len(valid)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            StorageError::unavailable("Failed to trim torn tail", e)
                .with_details(format!("byte_offset: {}", valid))
        })?;

    log_event_with_fields(
        Event::TornTailTrimmed,
        &[
            ("path", &log_path.display().to_string()),
            ("byte_offset", &valid.to_string()),
            ("bytes", &torn.to_string()),
        ],
    );
    Ok(())
}

fn remove_if_exists(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::unavailable(
            format!("Failed to remove stale file: {}", path.display()),
            e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::hash;
    use crate::storage::StorageErrorCode;
    use std::io::Write;
    use tempfile::TempDir;

    fn mined(x: i64, y: i64, key: u64) -> WorkItem {
        let mut item = WorkItem::new(Coordinate::new(x, y));
        hash::mine_item(&mut item, 2, key);
        item
    }

    #[test]
    fn test_store_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();

        let item = mined(3, -4, 420);
        storage.store(&item).unwrap();

        assert!(storage.contains(Coordinate::new(3, -4)));
        assert!(!storage.contains(Coordinate::new(4, 3)));
        assert_eq!(storage.load(Coordinate::new(3, -4)).unwrap(), Some(item));
        assert_eq!(storage.load(Coordinate::new(9, 9)).unwrap(), None);
    }

    #[test]
    fn test_identical_store_does_not_grow_log() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();

        let item = mined(1, 1, 420);
        storage.store(&item).unwrap();
        storage.store(&item).unwrap();
        storage.store_batch(&[item.clone(), item]).unwrap();

        assert_eq!(storage.record_count(), 1);
        assert_eq!(storage.log_records(), 1);
    }

    #[test]
    fn test_duplicates_within_one_batch_collapse() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();

        let item = mined(6, 6, 420);
        storage.store_batch(&[item.clone(), item.clone()]).unwrap();
        assert_eq!(storage.record_count(), 1);
        assert_eq!(storage.log_records(), 1);

        // the last version in the batch wins
        let newer = mined(7, 7, 2);
        storage
            .store_batch(&[mined(7, 7, 1), mined(8, 8, 1), newer.clone()])
            .unwrap();
        assert_eq!(storage.log_records(), 3);
        drop(storage);

        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.record_count(), 3);
        assert_eq!(storage.load(Coordinate::new(7, 7)).unwrap(), Some(newer));
        assert_eq!(storage.load(Coordinate::new(6, 6)).unwrap(), Some(item));
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("runs").join("a").join("data");
        let item = mined(1, 2, 420);
        {
            let mut storage = FileStorage::open(&dir).unwrap();
            storage.store(&item).unwrap();
        }
        assert!(dir.join(LOG_FILE_NAME).is_file());

        let mut storage = FileStorage::open(&dir).unwrap();
        assert_eq!(storage.load(item.coordinate()).unwrap(), Some(item));
    }

    #[test]
    fn test_upsert_latest_wins_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let newer = mined(0, 0, 7);
        {
            let mut storage = FileStorage::open(temp_dir.path()).unwrap();
            storage.store(&mined(0, 0, 420)).unwrap();
            storage.store(&newer).unwrap();
            assert_eq!(storage.log_records(), 2);
        }

        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.record_count(), 1);
        assert_eq!(storage.load(Coordinate::new(0, 0)).unwrap(), Some(newer));
    }

    #[test]
    fn test_store_batch_group_commit() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();

        let batch: Vec<_> = (0..50).map(|i| mined(i, -i, 420)).collect();
        storage.store_batch(&batch).unwrap();

        assert_eq!(storage.record_count(), 50);
        for item in &batch {
            assert_eq!(storage.load(item.coordinate()).unwrap().as_ref(), Some(item));
        }
    }

    #[test]
    fn test_unmined_item_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();

        let batch = vec![mined(0, 0, 1), WorkItem::new(Coordinate::new(1, 0))];
        let err = storage.store_batch(&batch).unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::IncompleteItem);
        assert_eq!(storage.log_records(), 0);
    }

    #[test]
    fn test_cursor_persists() {
        let temp_dir = TempDir::new().unwrap();
        let cursor = ExplorerCursor::from_index(Coordinate::new(0, 0), 100);
        {
            let mut storage = FileStorage::open(temp_dir.path()).unwrap();
            assert!(storage.load_cursor().unwrap().is_none());
            storage.save_cursor(&cursor).unwrap();
        }
        let storage = FileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.load_cursor().unwrap(), Some(cursor));
    }

    #[test]
    fn test_torn_tail_trimmed_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let item = mined(2, 2, 420);
        {
            let mut storage = FileStorage::open(temp_dir.path()).unwrap();
            storage.store(&item).unwrap();
        }
        let log = temp_dir.path().join(LOG_FILE_NAME);
        {
            let mut file = OpenOptions::new().append(true).open(&log).unwrap();
            file.write_all(&[0xAB; 31]).unwrap();
        }

        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(fs::metadata(&log).unwrap().len(), RECORD_LEN as u64);
        assert_eq!(storage.load(item.coordinate()).unwrap(), Some(item));
    }

    #[test]
    fn test_mid_log_corruption_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = FileStorage::open(temp_dir.path()).unwrap();
            let batch: Vec<_> = (0..3).map(|i| mined(i, 0, 420)).collect();
            storage.store_batch(&batch).unwrap();
        }
        let log = temp_dir.path().join(LOG_FILE_NAME);
        let mut bytes = fs::read(&log).unwrap();
        bytes[RECORD_LEN + 25] ^= 0x01;
        fs::write(&log, bytes).unwrap();

        let err = FileStorage::open(temp_dir.path()).err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.details(), Some("byte_offset: 58"));
    }

    #[test]
    fn test_verify_report() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        storage.store(&mined(0, 0, 420)).unwrap();
        storage.store(&mined(0, 0, 421)).unwrap();
        storage.store(&mined(1, 0, 420)).unwrap();

        let report = storage.verify().unwrap();
        assert_eq!(report.log_records, 3);
        assert_eq!(report.coordinates, 2);
        assert_eq!(report.log_bytes, 3 * RECORD_LEN as u64);
        assert!(report.cursor.is_none());
    }

    #[test]
    fn test_compact_drops_superseded_records() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        for key in 0..5 {
            storage.store(&mined(0, 0, key)).unwrap();
        }
        storage.store(&mined(1, 0, 420)).unwrap();
        let latest = mined(0, 0, 4);

        let stats = storage.compact().unwrap();
        assert_eq!(stats.records_before, 6);
        assert_eq!(stats.records_after, 2);
        assert_eq!(stats.bytes_reclaimed, 4 * RECORD_LEN as u64);
        assert_eq!(storage.load(Coordinate::new(0, 0)).unwrap(), Some(latest.clone()));

        // appends after compaction land on the new log
        storage.store(&mined(2, 0, 420)).unwrap();
        drop(storage);

        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.log_records(), 3);
        assert_eq!(storage.load(Coordinate::new(0, 0)).unwrap(), Some(latest));
        assert!(!temp_dir.path().join(COMPACT_TEMP_NAME).exists());
    }

    #[test]
    fn test_compact_keeps_log_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp_dir.path()).unwrap();
        storage.store(&mined(5, 5, 1)).unwrap();
        storage.store(&mined(-3, 2, 1)).unwrap();
        storage.store(&mined(9, -1, 1)).unwrap();
        storage.store(&mined(5, 5, 2)).unwrap();

        storage.compact().unwrap();

        let mut reader = RecordReader::open(&temp_dir.path().join(LOG_FILE_NAME)).unwrap();
        let order: Vec<Coordinate> = reader
            .read_all()
            .unwrap()
            .into_iter()
            .map(|r| r.coordinate)
            .collect();
        assert_eq!(
            order,
            vec![
                Coordinate::new(-3, 2),
                Coordinate::new(9, -1),
                Coordinate::new(5, 5),
            ]
        );
    }

    #[test]
    fn test_stale_temp_files_removed_on_open() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cursor.json.tmp"), b"{").unwrap();
        fs::write(temp_dir.path().join(COMPACT_TEMP_NAME), b"xx").unwrap();

        let storage = FileStorage::open(temp_dir.path()).unwrap();
        assert!(storage.load_cursor().unwrap().is_none());
        assert!(!temp_dir.path().join("cursor.json.tmp").exists());
        assert!(!temp_dir.path().join(COMPACT_TEMP_NAME).exists());
    }
}

//! Result record format
//!
//! Every record has the same size:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, always RECORD_LEN)
//! +------------------+
//! | Format Version   | (u8)
//! +------------------+
//! | X                | (i64 LE)
//! +------------------+
//! | Y                | (i64 LE)
//! +------------------+
//! | Rare Flag        | (u8: 0 = common, 1 = rare)
//! +------------------+
//! | Digest           | (32 bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StorageError, StorageResult};
use crate::miner::{Coordinate, Digest, WorkItem, DIGEST_LEN};

/// Current record format version
pub const FORMAT_VERSION: u8 = 1;

/// Size of one serialized record in bytes
pub const RECORD_LEN: usize = 4 + 1 + 8 + 8 + 1 + DIGEST_LEN + 4;

const CHECKSUM_OFFSET: usize = RECORD_LEN - 4;

/// A mined work item as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub coordinate: Coordinate,
    pub is_rare: bool,
    pub digest: Digest,
}

impl ResultRecord {
    /// Builds a record from a mined work item.
    ///
    /// # Errors
    ///
    /// `IncompleteItem` if the item has no digest.
    pub fn from_item(item: &WorkItem) -> StorageResult<Self> {
        let digest = item
            .digest()
            .copied()
            .ok_or_else(|| StorageError::incomplete_item(item.coordinate()))?;
        Ok(Self {
            coordinate: item.coordinate(),
            is_rare: item.is_rare(),
            digest,
        })
    }

    pub fn into_item(self) -> WorkItem {
        WorkItem::mined(self.coordinate, self.digest, self.is_rare)
    }

    /// Serialize the complete record.
    pub fn serialize(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..4].copy_from_slice(&(RECORD_LEN as u32).to_le_bytes());
        buf[4] = FORMAT_VERSION;
        buf[5..13].copy_from_slice(&self.coordinate.x.to_le_bytes());
        buf[13..21].copy_from_slice(&self.coordinate.y.to_le_bytes());
        buf[21] = u8::from(self.is_rare);
        buf[22..22 + DIGEST_LEN].copy_from_slice(self.digest.as_bytes());

        let checksum = compute_checksum(&buf[..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Deserialize a record, verifying length, version, flag and checksum.
    ///
    /// `offset` is only used for error context.
    pub fn deserialize(data: &[u8], offset: u64) -> StorageResult<Self> {
        if data.len() < RECORD_LEN {
            return Err(StorageError::torn_tail(offset, data.len() as u64));
        }
        let data = &data[..RECORD_LEN];

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length != RECORD_LEN {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!("Invalid record length: {}", record_length),
            ));
        }

        let stored_checksum = u32::from_le_bytes([
            data[CHECKSUM_OFFSET],
            data[CHECKSUM_OFFSET + 1],
            data[CHECKSUM_OFFSET + 2],
            data[CHECKSUM_OFFSET + 3],
        ]);
        if !verify_checksum(&data[..CHECKSUM_OFFSET], stored_checksum) {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    compute_checksum(&data[..CHECKSUM_OFFSET]),
                    stored_checksum
                ),
            ));
        }

        if data[4] != FORMAT_VERSION {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!("Unsupported record format version: {}", data[4]),
            ));
        }

        let is_rare = match data[21] {
            0 => false,
            1 => true,
            other => {
                return Err(StorageError::corruption_at_offset(
                    offset,
                    format!("Invalid rare flag: {}", other),
                ))
            }
        };

        let mut x = [0u8; 8];
        x.copy_from_slice(&data[5..13]);
        let mut y = [0u8; 8];
        y.copy_from_slice(&data[13..21]);
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&data[22..22 + DIGEST_LEN]);

        Ok(Self {
            coordinate: Coordinate::new(i64::from_le_bytes(x), i64::from_le_bytes(y)),
            is_rare,
            digest: Digest::from_bytes(digest),
        })
    }
}

//! Lattice coordinates and the work items mined for them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of a digest in bytes
pub const DIGEST_LEN: usize = 32;

/// One cell of the searched lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i64,
    pub y: i64,
}

impl Coordinate {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns this coordinate shifted by `(dx, dy)`.
    ///
    /// Wraps at the i64 bounds, which the spiral cannot reach in practice.
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Fixed-width output of the keyed hash for one coordinate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// The low 64 bits of the digest, read as a big-endian integer from
    /// the final eight bytes.
    pub fn low_u64(&self) -> u64 {
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.0[DIGEST_LEN - 8..]);
        u64::from_be_bytes(tail)
    }

    /// Lowercase hex rendering (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64 character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A coordinate together with its classification.
///
/// Created unmined; a miner fills the digest and flag exactly once, after
/// which the item is treated as immutable and handed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    coordinate: Coordinate,
    is_rare: bool,
    digest: Option<Digest>,
}

impl WorkItem {
    /// Creates an unmined work item.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            is_rare: false,
            digest: None,
        }
    }

    /// Rebuilds a mined item, e.g. from a storage record.
    pub fn mined(coordinate: Coordinate, digest: Digest, is_rare: bool) -> Self {
        Self {
            coordinate,
            is_rare,
            digest: Some(digest),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn is_rare(&self) -> bool {
        self.is_rare
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    pub fn is_mined(&self) -> bool {
        self.digest.is_some()
    }

    pub(crate) fn fill(&mut self, digest: Digest, is_rare: bool) {
        self.digest = Some(digest);
        self.is_rare = is_rare;
    }
}

impl From<Coordinate> for WorkItem {
    fn from(coordinate: Coordinate) -> Self {
        Self::new(coordinate)
    }
}

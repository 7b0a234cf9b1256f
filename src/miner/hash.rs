//! Keyed hash and rarity classification shared by every backend
//!
//! Construction:
//!
//! ```text
//! message = key.to_le_bytes() || x.to_le_bytes() || y.to_le_bytes()   (24 bytes)
//! digest  = SHA-256(message)                                          (32 bytes)
//! low64   = u64::from_be_bytes(digest[24..32])
//! is_rare = low64 % rarity == 0
//! ```
//!
//! Backends that do not use this module (the accelerator kernel) must
//! reproduce these bytes exactly.

use sha2::{Digest as _, Sha256};

use super::work_item::{Coordinate, Digest, WorkItem, DIGEST_LEN};

/// Length of the hashed message in bytes
pub const MESSAGE_LEN: usize = 24;

/// Builds the 24-byte message hashed for a coordinate.
pub fn message(key: u64, coordinate: Coordinate) -> [u8; MESSAGE_LEN] {
    let mut msg = [0u8; MESSAGE_LEN];
    msg[0..8].copy_from_slice(&key.to_le_bytes());
    msg[8..16].copy_from_slice(&coordinate.x.to_le_bytes());
    msg[16..24].copy_from_slice(&coordinate.y.to_le_bytes());
    msg
}

/// Computes `H(key, x, y)`.
pub fn keyed_digest(key: u64, coordinate: Coordinate) -> Digest {
    let out = Sha256::digest(message(key, coordinate));
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&out);
    Digest::from_bytes(bytes)
}

/// Rarity test on a digest. `rarity` must be non-zero.
#[inline]
pub fn is_rare(digest: &Digest, rarity: u64) -> bool {
    digest.low_u64() % rarity == 0
}

/// Hashes and classifies one item in place.
#[inline]
pub fn mine_item(item: &mut WorkItem, rarity: u64, key: u64) {
    let digest = keyed_digest(key, item.coordinate());
    let rare = is_rare(&digest, rarity);
    item.fill(digest, rare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest as _;

    #[test]
    fn test_message_layout() {
        let msg = message(420, Coordinate::new(1, -1));
        assert_eq!(&msg[0..8], &420u64.to_le_bytes());
        assert_eq!(&msg[8..16], &1i64.to_le_bytes());
        assert_eq!(&msg[16..24], &(-1i64).to_le_bytes());
    }

    #[test]
    fn test_digest_deterministic() {
        let c = Coordinate::new(12, 34);
        assert_eq!(keyed_digest(420, c), keyed_digest(420, c));
    }

    #[test]
    fn test_digest_depends_on_key_and_coordinate() {
        let c = Coordinate::new(0, 0);
        assert_ne!(keyed_digest(420, c), keyed_digest(421, c));
        assert_ne!(keyed_digest(420, c), keyed_digest(420, Coordinate::new(0, 1)));
        // x and y are not interchangeable
        assert_ne!(
            keyed_digest(420, Coordinate::new(1, 2)),
            keyed_digest(420, Coordinate::new(2, 1))
        );
    }

    #[test]
    fn test_digest_matches_plain_sha256() {
        let c = Coordinate::new(-5, 9);
        let expected = Sha256::digest(message(7, c));
        assert_eq!(keyed_digest(7, c).as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_rarity_one_marks_everything() {
        for x in 0..16 {
            let d = keyed_digest(420, Coordinate::new(x, 0));
            assert!(is_rare(&d, 1));
        }
    }

    #[test]
    fn test_mine_item_fills_fields() {
        let mut item = WorkItem::new(Coordinate::new(2, 3));
        mine_item(&mut item, 4, 420);
        let digest = keyed_digest(420, Coordinate::new(2, 3));
        assert_eq!(item.digest(), Some(&digest));
        assert_eq!(item.is_rare(), digest.low_u64() % 4 == 0);
    }
}

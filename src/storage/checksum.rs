//! CRC32 checksums for result records and the cursor file
//!
//! Every read validates the checksum; a mismatch is a corrupt record.
//! Uses CRC32 (IEEE polynomial).

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes a CRC32 checksum over several slices as if concatenated.
pub fn compute_checksum_parts(parts: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

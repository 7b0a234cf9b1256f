//! Mining kernel in 32-bit word arithmetic
//!
//! This is the per-item program a device runs once per grid index. It
//! implements single-block SHA-256 directly on words rather than calling
//! the host hash library, so agreement with the CPU backend is a real
//! cross-check of the published construction.
//!
//! Buffer layouts (all `u32`):
//!
//! ```text
//! input  per item: [x_lo, x_hi, y_lo, y_hi]                  (INPUT_WORDS)
//! output per item: [h0, h1, h2, h3, h4, h5, h6, h7, flag]    (OUTPUT_WORDS)
//! ```
//!
//! `x_lo`/`x_hi` are the low and high halves of the two's complement bit
//! pattern of `x`. Digest words are SHA-256 state words; the digest bytes
//! are their big-endian concatenation.

/// Words uploaded per item
pub const INPUT_WORDS: usize = 4;

/// Words downloaded per item
pub const OUTPUT_WORDS: usize = 9;

/// Index of the rarity flag inside an output slot
pub const FLAG_WORD: usize = 8;

/// Uniform parameters shared by every invocation of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelParams {
    pub key_lo: u32,
    pub key_hi: u32,
    pub rarity: u64,
}

impl KernelParams {
    pub fn new(key: u64, rarity: u64) -> Self {
        let (key_lo, key_hi) = split(key);
        Self {
            key_lo,
            key_hi,
            rarity,
        }
    }
}

/// Splits a 64-bit value into (low, high) words.
#[inline]
pub fn split(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const H0: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Message length in bits (key, x, y: 3 * 64)
const MESSAGE_BITS: u32 = 192;

/// Runs the kernel for one grid index.
///
/// `input` is this item's `INPUT_WORDS` slice, `output` its
/// `OUTPUT_WORDS` slot.
pub fn mine_kernel(params: &KernelParams, input: &[u32], output: &mut [u32]) {
    // Message bytes are little-endian fields, SHA-256 reads big-endian words.
    let mut w = [0u32; 64];
    w[0] = params.key_lo.swap_bytes();
    w[1] = params.key_hi.swap_bytes();
    w[2] = input[0].swap_bytes();
    w[3] = input[1].swap_bytes();
    w[4] = input[2].swap_bytes();
    w[5] = input[3].swap_bytes();
    w[6] = 0x8000_0000;
    w[15] = MESSAGE_BITS;

    for i in 16..64 {
        let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
        let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
        w[i] = w[i - 16]
            .wrapping_add(s0)
            .wrapping_add(w[i - 7])
            .wrapping_add(s1);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = H0;

    for i in 0..64 {
        let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
        let ch = (e & f) ^ (!e & g);
        let t1 = h
            .wrapping_add(s1)
            .wrapping_add(ch)
            .wrapping_add(K[i])
            .wrapping_add(w[i]);
        let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
        let maj = (a & b) ^ (a & c) ^ (b & c);
        let t2 = s0.wrapping_add(maj);

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    let state = [a, b, c, d, e, f, g, h];
    for (slot, (init, word)) in output.iter_mut().zip(H0.iter().zip(state.iter())) {
        *slot = init.wrapping_add(*word);
    }

    let low64 = ((output[6] as u64) << 32) | output[7] as u64;
    output[FLAG_WORD] = (low64 % params.rarity == 0) as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::hash;
    use crate::miner::work_item::Coordinate;

    fn run(key: u64, rarity: u64, c: Coordinate) -> [u32; OUTPUT_WORDS] {
        let (x_lo, x_hi) = split(c.x as u64);
        let (y_lo, y_hi) = split(c.y as u64);
        let mut out = [0u32; OUTPUT_WORDS];
        mine_kernel(&KernelParams::new(key, rarity), &[x_lo, x_hi, y_lo, y_hi], &mut out);
        out
    }

    #[test]
    fn test_kernel_matches_host_hash() {
        let coords = [
            Coordinate::new(0, 0),
            Coordinate::new(1, 0),
            Coordinate::new(-1, -1),
            Coordinate::new(i64::MAX, i64::MIN),
            Coordinate::new(123_456_789, -987_654_321),
        ];
        for c in coords {
            let out = run(420, 16384, c);
            let mut bytes = Vec::with_capacity(32);
            for word in &out[..8] {
                bytes.extend_from_slice(&word.to_be_bytes());
            }
            let expected = hash::keyed_digest(420, c);
            assert_eq!(bytes.as_slice(), expected.as_bytes().as_slice(), "{}", c);
        }
    }

    #[test]
    fn test_kernel_flag_matches_host_classification() {
        for x in -20..20 {
            let c = Coordinate::new(x, 3 * x);
            let out = run(7, 3, c);
            let expected = hash::is_rare(&hash::keyed_digest(7, c), 3);
            assert_eq!(out[FLAG_WORD] == 1, expected);
        }
    }

    #[test]
    fn test_split_halves() {
        assert_eq!(split(0x0123_4567_89ab_cdef), (0x89ab_cdef, 0x0123_4567));
        assert_eq!(split((-1i64) as u64), (u32::MAX, u32::MAX));
    }
}

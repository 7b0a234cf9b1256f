//! Spiral positions and the resumable explorer cursor
//!
//! Ring 0 is the origin cell. Ring `k >= 1` is the border of the square of
//! half-width `k`, `8k` cells, walked from `(k, -k + 1)`:
//!
//! ```text
//! steps [0, 2k)   up the right edge      (k, -k+1) .. (k, k)
//! steps [2k, 4k)  left along the top     (k-1, k)  .. (-k, k)
//! steps [4k, 6k)  down the left edge     (-k, k-1) .. (-k, -k)
//! steps [6k, 8k)  right along the bottom (-k+1, -k) .. (k, -k)
//! ```
//!
//! All offsets are relative to the origin. `(2k - 1)^2` cells precede
//! ring `k`, which gives the closed-form cursor index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::miner::Coordinate;

/// Number of cells in `ring`.
#[inline]
pub fn ring_len(ring: u64) -> u128 {
    if ring == 0 {
        1
    } else {
        8 * ring as u128
    }
}

/// The cell at `step` of `ring` around `origin`.
///
/// `step` must be below `ring_len(ring)`.
pub fn cell_at(origin: Coordinate, ring: u64, step: u64) -> Coordinate {
    if ring == 0 {
        return origin;
    }
    let k = ring as i64;
    let s = step as i64;
    let side = k.wrapping_mul(2);

    let (dx, dy) = if s < side {
        (k, s.wrapping_sub(k).wrapping_add(1))
    } else if s < side.wrapping_mul(2) {
        let t = s - side;
        (k.wrapping_sub(1).wrapping_sub(t), k)
    } else if s < side.wrapping_mul(3) {
        let t = s - side.wrapping_mul(2);
        (k.wrapping_neg(), k.wrapping_sub(1).wrapping_sub(t))
    } else {
        let t = s - side.wrapping_mul(3);
        (t.wrapping_sub(k).wrapping_add(1), k.wrapping_neg())
    };
    origin.offset(dx, dy)
}

/// Integer square root (floor).
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = (n as f64).sqrt() as u128;
    while x.checked_mul(x).map_or(true, |sq| sq > n) {
        x -= 1;
    }
    while (x + 1).checked_mul(x + 1).map_or(false, |sq| sq <= n) {
        x += 1;
    }
    x
}

/// Position of the next unemitted cell of a spiral.
///
/// `step_index_within_ring` is the step within `ring_index`. A cursor is
/// valid iff it is `(0, 0)` or
/// `ring_index >= 1 && step_index_within_ring < 8 * ring_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerCursor {
    pub origin: Coordinate,
    pub ring_index: u64,
    pub step_index_within_ring: u64,
}

impl ExplorerCursor {
    /// Cursor at the origin cell (nothing emitted yet)
    pub fn start(origin: Coordinate) -> Self {
        Self {
            origin,
            ring_index: 0,
            step_index_within_ring: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.ring_index == 0 {
            self.step_index_within_ring == 0
        } else {
            (self.step_index_within_ring as u128) < ring_len(self.ring_index)
        }
    }

    /// The cell this cursor points at
    pub fn coordinate(&self) -> Coordinate {
        cell_at(self.origin, self.ring_index, self.step_index_within_ring)
    }

    /// The cursor one cell further along the spiral
    pub fn advanced(&self) -> Self {
        let next_step = self.step_index_within_ring as u128 + 1;
        if next_step >= ring_len(self.ring_index) {
            Self {
                origin: self.origin,
                ring_index: self.ring_index + 1,
                step_index_within_ring: 0,
            }
        } else {
            Self {
                step_index_within_ring: next_step as u64,
                ..*self
            }
        }
    }

    /// Number of cells emitted before this cursor
    pub fn index(&self) -> u128 {
        if self.ring_index == 0 {
            return 0;
        }
        let side = 2 * self.ring_index as u128 - 1;
        side * side + self.step_index_within_ring as u128
    }

    /// Cursor after `index` emissions around `origin`.
    ///
    /// Inverse of `index()`.
    pub fn from_index(origin: Coordinate, index: u128) -> Self {
        if index == 0 {
            return Self::start(origin);
        }
        let root = isqrt(index);
        let odd = if root % 2 == 1 { root } else { root - 1 };
        let ring = (odd + 1) / 2;
        Self {
            origin,
            ring_index: ring as u64,
            step_index_within_ring: (index - odd * odd) as u64,
        }
    }
}

impl fmt::Display for ExplorerCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "origin {} ring {} step {}",
            self.origin, self.ring_index, self.step_index_within_ring
        )
    }
}

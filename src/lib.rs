//! bluespace - resumable keyed-hash lattice search
//!
//! Enumerates integer lattice coordinates in an expanding square spiral,
//! computes a keyed SHA-256 digest for each, flags the rare ones and stores
//! every result durably so an interrupted search resumes exactly where it
//! stopped.

pub mod cli;
pub mod config;
pub mod crash_point;
pub mod driver;
pub mod errors;
pub mod explorer;
pub mod miner;
pub mod observability;
pub mod storage;

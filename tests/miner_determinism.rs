//! Miner Determinism Tests
//!
//! Tests for:
//! - CPU and accelerator backends producing identical results
//! - Results independent of partitioning, thread count and launch size
//! - Digests equal to a direct SHA-256 of the keyed message
//! - Rare frequency close to 1/rarity

use bluespace::miner::accelerator::HostEmulatedDevice;
use bluespace::miner::{
    create_miner, AcceleratorMiner, Coordinate, CpuMiner, Miner, MinerConfig, WorkItem,
};
use sha2::{Digest as _, Sha256};
use std::sync::Arc;

// =============================================================================
// Test Utilities
// =============================================================================

const KEY: u64 = 420;

fn batch(n: i64) -> Vec<WorkItem> {
    (0..n)
        .map(|i| WorkItem::new(Coordinate::new(i * 7 - n, 3 - i * 13)))
        .collect()
}

fn mine_with(miner: &dyn Miner, n: i64, rarity: u64, key: u64) -> Vec<WorkItem> {
    let mut items = batch(n);
    miner.mine_batch(&mut items, rarity, key).unwrap();
    items
}

fn accelerator(max_grid: usize) -> AcceleratorMiner {
    AcceleratorMiner::new(Arc::new(HostEmulatedDevice::with_max_grid(max_grid)))
}

fn direct_digest(key: u64, c: Coordinate) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.to_le_bytes());
    hasher.update(c.x.to_le_bytes());
    hasher.update(c.y.to_le_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

// =============================================================================
// Backend Agreement
// =============================================================================

#[test]
fn test_cpu_and_accelerator_agree_across_batch_sizes() {
    let cpu = CpuMiner::new();
    let gpu = accelerator(64);

    for n in [1, 2, 63, 64, 65, 500] {
        for rarity in [1, 3, 16384] {
            assert_eq!(
                mine_with(&cpu, n, rarity, KEY),
                mine_with(&gpu, n, rarity, KEY),
                "batch {} rarity {}",
                n,
                rarity
            );
        }
    }
}

#[test]
fn test_partitioning_and_threads_do_not_change_output() {
    let reference = mine_with(&CpuMiner::new(), 333, 5, KEY);

    for partitions in [1, 2, 7, 64, 1000] {
        let miner = CpuMiner::new().with_partitions(partitions);
        assert_eq!(mine_with(&miner, 333, 5, KEY), reference, "{} partitions", partitions);
    }
    for threads in [1, 3] {
        let miner = CpuMiner::with_threads(threads).unwrap();
        assert_eq!(mine_with(&miner, 333, 5, KEY), reference, "{} threads", threads);
    }
}

#[test]
fn test_launch_window_does_not_change_output() {
    let reference = mine_with(&accelerator(1 << 16), 300, 5, KEY);
    for max_grid in [1, 7, 100, 299] {
        assert_eq!(mine_with(&accelerator(max_grid), 300, 5, KEY), reference);
    }
}

#[test]
fn test_created_backends_agree() {
    let cpu = create_miner(&MinerConfig::cpu()).unwrap();
    let gpu = create_miner(&MinerConfig::accelerator(0)).unwrap();
    assert_eq!(
        mine_with(cpu.as_ref(), 128, 2, 9),
        mine_with(gpu.as_ref(), 128, 2, 9)
    );
}

// =============================================================================
// Digest Definition
// =============================================================================

#[test]
fn test_digest_is_sha256_of_keyed_message() {
    let items = mine_with(&CpuMiner::new(), 50, 16384, KEY);
    for item in &items {
        let expected = direct_digest(KEY, item.coordinate());
        let digest = item.digest().unwrap();
        assert_eq!(digest.as_bytes(), &expected);

        let low = u64::from_be_bytes(expected[24..32].try_into().unwrap());
        assert_eq!(item.is_rare(), low % 16384 == 0);
    }
}

#[test]
fn test_key_changes_every_digest() {
    let a = mine_with(&CpuMiner::new(), 40, 1, 1);
    let b = mine_with(&CpuMiner::new(), 40, 1, 2);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.coordinate(), y.coordinate());
        assert_ne!(x.digest(), y.digest());
    }
}

#[test]
fn test_rarity_one_marks_every_item() {
    let items = mine_with(&accelerator(16), 40, 1, KEY);
    assert!(items.iter().all(|item| item.is_rare()));
}

// =============================================================================
// Rare Frequency
// =============================================================================

#[test]
fn test_rare_frequency_within_binomial_tolerance() {
    let n: i64 = 40_000;
    let rarity: u64 = 16;
    let items = mine_with(&CpuMiner::new(), n, rarity, KEY);
    let rare = items.iter().filter(|item| item.is_rare()).count() as f64;

    let p = 1.0 / rarity as f64;
    let mean = n as f64 * p;
    let sd = (n as f64 * p * (1.0 - p)).sqrt();
    // six standard deviations
    assert!(
        (rare - mean).abs() < 6.0 * sd,
        "rare {} expected about {}",
        rare,
        mean
    );
}

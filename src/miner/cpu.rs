//! Multi-core CPU backend
//!
//! The batch is split into contiguous chunks, one per worker by default,
//! and each chunk is hashed independently. The only shared state is each
//! item's own output slot, so no synchronization is needed beyond the
//! final join. Output does not depend on the number of partitions.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::errors::{MinerError, MinerResult};
use super::hash;
use super::work_item::WorkItem;
use super::Miner;

/// CPU miner backed by rayon.
pub struct CpuMiner {
    /// Dedicated pool; `None` runs on rayon's global pool
    pool: Option<ThreadPool>,
    /// Forced partition count, mainly for equivalence testing
    partitions: Option<usize>,
}

impl CpuMiner {
    /// Miner running on the global rayon pool.
    pub fn new() -> Self {
        Self {
            pool: None,
            partitions: None,
        }
    }

    /// Miner with a dedicated pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for zero threads, `BackendUnavailable` if the
    /// pool cannot be spawned.
    pub fn with_threads(threads: usize) -> MinerResult<Self> {
        if threads == 0 {
            return Err(MinerError::InvalidConfiguration(
                "cpu thread count must be > 0".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("bluespace-cpu-{}", i))
            .build()
            .map_err(|e| MinerError::backend_unavailable("cpu", e.to_string()))?;
        Ok(Self {
            pool: Some(pool),
            partitions: None,
        })
    }

    /// Overrides the number of contiguous chunks a batch is split into.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = Some(partitions.max(1));
        self
    }

    /// Number of worker threads this miner runs on.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn chunk_len(&self, batch_len: usize) -> usize {
        let partitions = self.partitions.unwrap_or_else(|| self.threads()).max(1);
        batch_len.div_ceil(partitions).max(1)
    }

    fn run(&self, batch: &mut [WorkItem], rarity: u64, key: u64) {
        let chunk_len = self.chunk_len(batch.len());
        batch.par_chunks_mut(chunk_len).for_each(|chunk| {
            for item in chunk.iter_mut() {
                hash::mine_item(item, rarity, key);
            }
        });
    }
}

impl Default for CpuMiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Miner for CpuMiner {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn mine_batch(&self, batch: &mut [WorkItem], rarity: u64, key: u64) -> MinerResult<()> {
        if rarity == 0 {
            return Err(MinerError::ZeroRarity);
        }
        if batch.is_empty() {
            return Ok(());
        }
        match &self.pool {
            Some(pool) => pool.install(|| self.run(batch, rarity, key)),
            None => self.run(batch, rarity, key),
        }
        Ok(())
    }
}

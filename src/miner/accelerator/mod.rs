//! Accelerator backend
//!
//! Uploads the batch (coordinates plus key) as word buffers, launches the
//! mining kernel across the device grid, and copies digests and flags
//! back. The batch is filled only after every launch succeeded, so a
//! failed call leaves all items untouched.

mod device;
mod kernel;

use std::sync::Arc;

pub use device::{
    enumerate_devices, ComputeDevice, HostEmulatedDevice, KernelLaunch, DEFAULT_MAX_GRID,
};
pub use kernel::{mine_kernel, KernelParams, INPUT_WORDS, OUTPUT_WORDS};

use super::errors::{MinerError, MinerResult};
use super::work_item::{Digest, WorkItem, DIGEST_LEN};
use super::Miner;

/// Miner that runs the kernel on a `ComputeDevice`.
pub struct AcceleratorMiner {
    device: Arc<dyn ComputeDevice>,
}

impl AcceleratorMiner {
    pub fn new(device: Arc<dyn ComputeDevice>) -> Self {
        Self { device }
    }

    /// Opens the device at `ordinal` among `enumerate_devices()`.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` if no such device exists.
    pub fn open(ordinal: usize) -> MinerResult<Self> {
        let devices = enumerate_devices();
        let count = devices.len();
        devices
            .into_iter()
            .nth(ordinal)
            .map(Self::new)
            .ok_or_else(|| {
                MinerError::backend_unavailable(
                    "accelerator",
                    format!("no device at ordinal {} ({} present)", ordinal, count),
                )
            })
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Packs coordinates into the device input layout.
    fn upload(batch: &[WorkItem]) -> Vec<u32> {
        let mut input = Vec::with_capacity(batch.len() * INPUT_WORDS);
        for item in batch {
            let c = item.coordinate();
            let (x_lo, x_hi) = kernel::split(c.x as u64);
            let (y_lo, y_hi) = kernel::split(c.y as u64);
            input.extend_from_slice(&[x_lo, x_hi, y_lo, y_hi]);
        }
        input
    }

    /// Unpacks output slots into the batch.
    fn download(batch: &mut [WorkItem], output: &[u32]) {
        for (item, slot) in batch.iter_mut().zip(output.chunks_exact(OUTPUT_WORDS)) {
            let mut bytes = [0u8; DIGEST_LEN];
            for (chunk, word) in bytes.chunks_exact_mut(4).zip(&slot[..8]) {
                chunk.copy_from_slice(&word.to_be_bytes());
            }
            item.fill(Digest::from_bytes(bytes), slot[kernel::FLAG_WORD] != 0);
        }
    }
}

impl Miner for AcceleratorMiner {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn mine_batch(&self, batch: &mut [WorkItem], rarity: u64, key: u64) -> MinerResult<()> {
        if rarity == 0 {
            return Err(MinerError::ZeroRarity);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let params = KernelParams::new(key, rarity);
        let input = Self::upload(batch);
        let mut output = vec![0u32; batch.len() * OUTPUT_WORDS];
        let max_grid = self.device.max_grid().max(1);

        let mut offset = 0;
        while offset < batch.len() {
            let grid = max_grid.min(batch.len() - offset);
            let launch = KernelLaunch {
                params,
                input: &input[offset * INPUT_WORDS..(offset + grid) * INPUT_WORDS],
                grid,
            };
            let out = &mut output[offset * OUTPUT_WORDS..(offset + grid) * OUTPUT_WORDS];
            self.device.launch(&launch, out).map_err(|e| match e {
                MinerError::LaunchFailed { device, reason, .. } => MinerError::LaunchFailed {
                    device,
                    offset,
                    reason,
                },
                other => other,
            })?;
            offset += grid;
        }

        Self::download(batch, &output);
        Ok(())
    }
}

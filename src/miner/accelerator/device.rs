//! Compute devices the accelerator backend can launch kernels on
//!
//! A device receives host-visible word buffers (unified memory model),
//! runs `mine_kernel` once per grid index and writes every output slot
//! before `launch` returns. Device discovery and initialization belong to
//! the caller; this module only exposes what is present in-process.

use std::sync::Arc;

use rayon::prelude::*;

use super::kernel::{self, KernelParams, INPUT_WORDS, OUTPUT_WORDS};
use crate::miner::errors::{MinerError, MinerResult};

/// Default number of items per launch for the host-emulated device
pub const DEFAULT_MAX_GRID: usize = 256 * 256;

/// One kernel launch: uniform parameters plus the uploaded input buffer.
#[derive(Debug, Clone, Copy)]
pub struct KernelLaunch<'a> {
    pub params: KernelParams,
    pub input: &'a [u32],
    /// Number of kernel invocations (items)
    pub grid: usize,
}

impl KernelLaunch<'_> {
    /// Checks that both buffers match the grid size.
    pub fn validate(&self, output: &[u32]) -> Result<(), String> {
        if self.input.len() != self.grid * INPUT_WORDS {
            return Err(format!(
                "input buffer has {} words, grid {} needs {}",
                self.input.len(),
                self.grid,
                self.grid * INPUT_WORDS
            ));
        }
        if output.len() != self.grid * OUTPUT_WORDS {
            return Err(format!(
                "output buffer has {} words, grid {} needs {}",
                output.len(),
                self.grid,
                self.grid * OUTPUT_WORDS
            ));
        }
        Ok(())
    }
}

/// A massively parallel execution target.
pub trait ComputeDevice: Send + Sync {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Largest grid a single launch accepts
    fn max_grid(&self) -> usize;

    /// Runs the mining kernel over `launch.grid` items, blocking until every
    /// output slot is written.
    fn launch(&self, launch: &KernelLaunch<'_>, output: &mut [u32]) -> MinerResult<()>;
}

/// Executes the kernel grid on host threads.
///
/// Used where no discrete accelerator is attached; it runs exactly the
/// same kernel a device would, one invocation per grid index.
#[derive(Debug, Clone)]
pub struct HostEmulatedDevice {
    name: String,
    max_grid: usize,
}

impl HostEmulatedDevice {
    pub fn new() -> Self {
        Self::with_max_grid(DEFAULT_MAX_GRID)
    }

    pub fn with_max_grid(max_grid: usize) -> Self {
        Self {
            name: "host-emulated".to_string(),
            max_grid: max_grid.max(1),
        }
    }
}

impl Default for HostEmulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for HostEmulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_grid(&self) -> usize {
        self.max_grid
    }

    fn launch(&self, launch: &KernelLaunch<'_>, output: &mut [u32]) -> MinerResult<()> {
        if launch.grid > self.max_grid {
            return Err(MinerError::LaunchFailed {
                device: self.name.clone(),
                offset: 0,
                reason: format!("grid {} exceeds max grid {}", launch.grid, self.max_grid),
            });
        }
        launch.validate(output).map_err(|reason| MinerError::LaunchFailed {
            device: self.name.clone(),
            offset: 0,
            reason,
        })?;

        let params = launch.params;
        output
            .par_chunks_mut(OUTPUT_WORDS)
            .zip(launch.input.par_chunks(INPUT_WORDS))
            .for_each(|(slot, input)| kernel::mine_kernel(&params, input, slot));
        Ok(())
    }
}

/// Devices available to this process, in ordinal order.
pub fn enumerate_devices() -> Vec<Arc<dyn ComputeDevice>> {
    vec![Arc::new(HostEmulatedDevice::new())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerate_has_host_device() {
        let devices = enumerate_devices();
        assert!(!devices.is_empty());
        assert_eq!(devices[0].name(), "host-emulated");
    }

    #[test]
    fn test_launch_rejects_mismatched_buffers() {
        let device = HostEmulatedDevice::new();
        let input = vec![0u32; INPUT_WORDS * 2];
        let mut output = vec![0u32; OUTPUT_WORDS];
        let launch = KernelLaunch {
            params: KernelParams::new(1, 1),
            input: &input,
            grid: 2,
        };
        let err = device.launch(&launch, &mut output).unwrap_err();
        assert!(matches!(err, MinerError::LaunchFailed { .. }));
    }

    #[test]
    fn test_launch_rejects_oversized_grid() {
        let device = HostEmulatedDevice::with_max_grid(1);
        let input = vec![0u32; INPUT_WORDS * 2];
        let mut output = vec![0u32; OUTPUT_WORDS * 2];
        let launch = KernelLaunch {
            params: KernelParams::new(1, 1),
            input: &input,
            grid: 2,
        };
        assert!(device.launch(&launch, &mut output).is_err());
    }

    #[test]
    fn test_launch_writes_every_slot() {
        let device = HostEmulatedDevice::new();
        let input = vec![0u32; INPUT_WORDS * 3];
        let mut output = vec![0u32; OUTPUT_WORDS * 3];
        let launch = KernelLaunch {
            params: KernelParams::new(420, 1),
            input: &input,
            grid: 3,
        };
        device.launch(&launch, &mut output).unwrap();
        // rarity 1 flags everything
        for slot in output.chunks_exact(OUTPUT_WORDS) {
            assert_eq!(slot[kernel::FLAG_WORD], 1);
            assert_eq!(&slot[..8], &output[..8]);
        }
    }
}

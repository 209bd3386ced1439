use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::monitor::DeviceMonitor;
use crate::consts::RUN_BYTES_PER_VOXEL;
use crate::error::{BraggError, Result};
use crate::volume::DeviceId;

/// Free-memory report for one accelerator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub free_bytes: u64,
}

/// Snapshot of the accelerators visible at scheduling time.
pub type DeviceTable = Vec<DeviceInfo>;

/// Device memory estimate for one run on a volume of `shape`.
pub fn estimate_run_bytes(shape: (usize, usize, usize)) -> u64 {
    (shape.0 * shape.1 * shape.2) as u64 * RUN_BYTES_PER_VOXEL
}

/// Concurrent runs each listed device can hold: `floor(free / per_run)`.
/// Devices missing from the table get 0.
pub fn slots_from_table(
    per_run_bytes: u64,
    device_ids: &[DeviceId],
    table: &[DeviceInfo],
) -> Result<Vec<usize>> {
    if per_run_bytes == 0 {
        return Err(BraggError::InvalidArgument(
            "per-run memory footprint must be positive".into(),
        ));
    }
    Ok(device_ids
        .iter()
        .map(|id| {
            table
                .iter()
                .find(|d| d.id == *id)
                .map_or(0, |d| (d.free_bytes / per_run_bytes) as usize)
        })
        .collect())
}

/// Query the monitor and compute per-device slots for `device_ids`.
pub fn get_gpu_load(
    per_run_bytes: u64,
    device_ids: &[DeviceId],
    monitor: &dyn DeviceMonitor,
) -> Result<Vec<usize>> {
    let table = monitor.snapshot()?;
    let slots = slots_from_table(per_run_bytes, device_ids, &table)?;
    debug!(?device_ids, ?slots, per_run_bytes, "Device load");
    Ok(slots)
}

/// Trim `available` slots down to exactly `desired` runs.
///
/// Excess slots are removed one at a time, cycling through the devices from
/// the left and skipping devices already at zero. Fewer slots than runs is
/// [`BraggError::InsufficientCapacity`].
pub fn get_gpu_distribution(desired: usize, available: &[usize]) -> Result<Vec<usize>> {
    let total: usize = available.iter().sum();
    if total < desired {
        return Err(BraggError::InsufficientCapacity {
            desired,
            available: total,
        });
    }

    let mut slots = available.to_vec();
    let mut excess = total - desired;
    let mut device = 0;
    while excess > 0 {
        if slots[device] > 0 {
            slots[device] -= 1;
            excess -= 1;
        }
        device = (device + 1) % slots.len();
    }
    Ok(slots)
}

/// Expand slot counts into one device id per run, device-grouped.
pub fn assign_devices(slots: &[usize], device_ids: &[DeviceId]) -> Vec<DeviceId> {
    slots
        .iter()
        .zip(device_ids)
        .flat_map(|(&n, &id)| std::iter::repeat(id).take(n))
        .collect()
}

/// Re-chunk an assignment into per-directory groups of `per_directory_runs`.
pub fn split_by_directory<T: Clone>(assignment: &[T], per_directory_runs: usize) -> Vec<Vec<T>> {
    if per_directory_runs == 0 {
        return Vec::new();
    }
    assignment
        .chunks(per_directory_runs)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Device assignment for one batch of runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub slots: Vec<usize>,
    /// One entry per run; `None` means no accelerator (CPU).
    pub assignment: Vec<Option<DeviceId>>,
    pub warnings: Vec<String>,
}

/// Load, distribution and assignment for `desired` runs.
///
/// With no configured devices every run is assigned `None` and a warning is
/// recorded.
pub fn schedule_runs(
    desired: usize,
    per_run_bytes: u64,
    device_ids: &[DeviceId],
    monitor: &dyn DeviceMonitor,
) -> Result<Schedule> {
    if device_ids.is_empty() {
        let msg = format!("no devices configured, running {desired} runs without an accelerator");
        warn!("{msg}");
        return Ok(Schedule {
            slots: Vec::new(),
            assignment: vec![None; desired],
            warnings: vec![msg],
        });
    }

    let load = get_gpu_load(per_run_bytes, device_ids, monitor)?;
    let slots = get_gpu_distribution(desired, &load)?;
    let assignment: Vec<Option<DeviceId>> = assign_devices(&slots, device_ids)
        .into_iter()
        .map(Some)
        .collect();

    info!(desired, ?slots, "Devices assigned");
    Ok(Schedule {
        slots,
        assignment,
        warnings: Vec::new(),
    })
}

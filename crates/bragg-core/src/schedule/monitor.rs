use std::process::Command;

use tracing::debug;

use super::devices::{DeviceInfo, DeviceTable};
use crate::error::{BraggError, Result};

/// Source of device free-memory snapshots.
pub trait DeviceMonitor: Send + Sync {
    fn snapshot(&self) -> Result<DeviceTable>;
}

/// Fixed device table, for CPU-only hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticDeviceMonitor {
    table: DeviceTable,
}

impl StaticDeviceMonitor {
    pub fn new(table: DeviceTable) -> Self {
        Self { table }
    }
}

impl DeviceMonitor for StaticDeviceMonitor {
    fn snapshot(&self) -> Result<DeviceTable> {
        Ok(self.table.clone())
    }
}

const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--query-gpu=index,memory.free",
    "--format=csv,noheader,nounits",
];

/// Queries free memory through `nvidia-smi`.
#[derive(Clone, Debug)]
pub struct NvidiaSmiMonitor {
    program: String,
}

impl Default for NvidiaSmiMonitor {
    fn default() -> Self {
        Self {
            program: "nvidia-smi".into(),
        }
    }
}

impl NvidiaSmiMonitor {
    /// Use a different executable (e.g. a wrapper script).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DeviceMonitor for NvidiaSmiMonitor {
    fn snapshot(&self) -> Result<DeviceTable> {
        let output = Command::new(&self.program)
            .args(NVIDIA_SMI_ARGS)
            .output()
            .map_err(|e| BraggError::DeviceQuery(format!("cannot run {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(BraggError::DeviceQuery(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let table = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;
        debug!(devices = table.len(), "Queried nvidia-smi");
        Ok(table)
    }
}

/// Parse `index, free_MiB` lines into a device table.
pub fn parse_nvidia_smi(text: &str) -> Result<DeviceTable> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let (Some(index), Some(free), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(BraggError::DeviceQuery(format!("malformed line '{line}'")));
            };
            let id = index
                .parse()
                .map_err(|_| BraggError::DeviceQuery(format!("bad device index '{index}'")))?;
            let free_mib: u64 = free
                .parse()
                .map_err(|_| BraggError::DeviceQuery(format!("bad free memory '{free}'")))?;
            Ok(DeviceInfo {
                id,
                free_bytes: free_mib * 1024 * 1024,
            })
        })
        .collect()
}

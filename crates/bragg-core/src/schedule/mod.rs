pub mod devices;
pub mod monitor;

pub use devices::{
    assign_devices, estimate_run_bytes, get_gpu_distribution, get_gpu_load, schedule_runs,
    slots_from_table, split_by_directory, DeviceInfo, DeviceTable, Schedule,
};
pub use monitor::{parse_nvidia_smi, DeviceMonitor, NvidiaSmiMonitor, StaticDeviceMonitor};

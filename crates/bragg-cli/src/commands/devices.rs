use anyhow::{Context, Result};
use bragg_core::schedule::{schedule_runs, DeviceMonitor, NvidiaSmiMonitor};
use clap::Args;

#[derive(Args)]
pub struct DevicesArgs {
    /// Device memory needed by one run, in bytes
    #[arg(long)]
    pub per_run_bytes: u64,

    /// Comma-separated device ids to schedule on (default: all visible)
    #[arg(long, value_delimiter = ',')]
    pub devices: Vec<u32>,

    /// Number of runs to assign
    #[arg(long)]
    pub runs: Option<usize>,

    /// nvidia-smi executable
    #[arg(long, default_value = "nvidia-smi")]
    pub smi: String,
}

pub fn run(args: &DevicesArgs) -> Result<()> {
    let monitor = NvidiaSmiMonitor::with_program(&args.smi);
    let table = monitor.snapshot().context("Failed to query devices")?;

    println!("{:<8}{:>12}{:>8}", "Device", "Free MiB", "Slots");
    for device in &table {
        println!(
            "{:<8}{:>12}{:>8}",
            device.id,
            device.free_bytes >> 20,
            device.free_bytes / args.per_run_bytes.max(1)
        );
    }

    let ids: Vec<u32> = if args.devices.is_empty() {
        table.iter().map(|d| d.id).collect()
    } else {
        args.devices.clone()
    };

    if let Some(runs) = args.runs {
        let schedule = schedule_runs(runs, args.per_run_bytes, &ids, &monitor)?;
        println!();
        println!("Slots:       {:?}", schedule.slots);
        let assignment: Vec<String> = schedule
            .assignment
            .iter()
            .map(|d| d.map_or_else(|| "cpu".to_string(), |id| id.to_string()))
            .collect();
        println!("Assignment:  {}", assignment.join(" "));
        for warning in &schedule.warnings {
            println!("Warning:     {warning}");
        }
    }

    Ok(())
}

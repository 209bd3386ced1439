use std::path::PathBuf;

use anyhow::{Context, Result};
use bragg_core::align::register_3d;
use bragg_core::io::read_complex_volume;
use bragg_core::volume::{amplitude, to_complex};
use clap::Args;

#[derive(Args)]
pub struct RegisterArgs {
    /// Reference volume
    pub reference: PathBuf,

    /// Volume to register against the reference
    pub target: PathBuf,

    /// Sub-pixel upsampling factor (at least 2)
    #[arg(long, default_value = "100")]
    pub upsample: u32,

    /// Register the complex values instead of their amplitudes
    #[arg(long)]
    pub complex: bool,
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let reference = read_complex_volume(&args.reference)
        .with_context(|| format!("Failed to read {}", args.reference.display()))?;
    let target = read_complex_volume(&args.target)
        .with_context(|| format!("Failed to read {}", args.target.display()))?;

    let reg = if args.complex {
        register_3d(&reference, &target, args.upsample)?
    } else {
        register_3d(
            &to_complex(&amplitude(&reference)),
            &to_complex(&amplitude(&target)),
            args.upsample,
        )?
    };

    println!(
        "Shift:  {:+.4} {:+.4} {:+.4}",
        reg.shift[0], reg.shift[1], reg.shift[2]
    );
    println!("Peak:   {:.6e}", reg.peak);
    if !reg.peak_ok {
        println!("Warning: no correlation peak, shift is meaningless");
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bragg_core::pipeline::{prepare_scans, PrepConfig};
use clap::Args;

use crate::summary;

#[derive(Args)]
pub struct PrepArgs {
    /// Preparation config file (TOML)
    #[arg(long)]
    pub config: PathBuf,

    /// Override the output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &PrepArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut config: PrepConfig = toml::from_str(&contents).context("Invalid prep config")?;
    if let Some(out) = &args.output {
        config.output_dir = out.clone();
    }

    let report = prepare_scans(&config)?;
    summary::print_prep_report(&report);

    if report.all_failed() {
        bail!("No scan range could be prepared");
    }
    Ok(())
}

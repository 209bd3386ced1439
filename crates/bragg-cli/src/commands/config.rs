use std::path::PathBuf;

use anyhow::{Context, Result};
use bragg_core::pipeline::PrepConfig;
use clap::Args;

use super::run::RunFile;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit a scan preparation config instead of a run config
    #[arg(long)]
    pub prep: bool,
}

/// Print or save a full default configuration as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = if args.prep {
        toml::to_string_pretty(&PrepConfig::default())?
    } else {
        toml::to_string_pretty(&RunFile::default())?
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use bragg_core::io::VolumeReader;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Volume file (.vol)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = VolumeReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let header = &reader.header;
    let dims = &header.dims[..header.rank as usize];

    println!("File:        {}", args.file.display());
    println!("Elements:    {}", header.kind);
    println!("Rank:        {}", header.rank);
    println!(
        "Dimensions:  {}",
        dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x")
    );
    let total_mb = header.data_size() as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}

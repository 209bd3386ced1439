mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bragg", about = "Genetic phase retrieval for coherent diffraction data")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch raw scan directories into prepared volumes
    Prep(commands::prep::PrepArgs),
    /// Measure the sub-pixel shift between two volumes
    Register(commands::register::RegisterArgs),
    /// Query accelerators and show the run assignment
    Devices(commands::devices::DevicesArgs),
    /// Run the genetic reconstruction
    Run(commands::run::RunArgs),
    /// Print or save the default run configuration
    Config(commands::config::ConfigArgs),
    /// Show the header of a volume file
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn,bragg_core=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Prep(args) => commands::prep::run(args),
        Commands::Register(args) => commands::register::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bragg_core::io::{read_real_volume, DirectorySink};
use bragg_core::pipeline::{
    Dataset, GenerationController, GenerationStage, ProcessSolver, ProcessSolverConfig,
    ProgressReporter, ReconstructionConfig,
};
use bragg_core::schedule::NvidiaSmiMonitor;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::summary;

/// Contents of a run configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunFile {
    /// Prepared diffraction data (.vol), one file per scan range
    pub data: Vec<PathBuf>,
    /// Checkpoint root; each generation is written to `g_<n>/`, under a
    /// per-file subdirectory when several data files are given
    pub output: PathBuf,
    /// File whose appearance asks running solvers to stop
    #[serde(default)]
    pub stop_file: Option<PathBuf>,
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,
    #[serde(default)]
    pub solver: ProcessSolverConfig,
}

impl Default for RunFile {
    fn default() -> Self {
        Self {
            data: vec![PathBuf::from("prep/prep_data.vol")],
            output: PathBuf::from("results"),
            stop_file: None,
            reconstruction: ReconstructionConfig::default(),
            solver: ProcessSolverConfig::default(),
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Run config file (TOML)
    #[arg(long)]
    pub config: PathBuf,

    /// Override the number of generations
    #[arg(long)]
    pub generations: Option<usize>,

    /// Override the population size
    #[arg(long)]
    pub samples: Option<usize>,

    /// Continue from a checkpointed generation directory; with several
    /// data files each continues from its `<label>/` subdirectory
    #[arg(long)]
    pub continue_from: Option<PathBuf>,
}

/// Progress bar per generation stage.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>6} {msg:22} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_generation(&self, generation: usize, total: usize) {
        self.bar.set_prefix(format!("{}/{}", generation + 1, total));
    }

    fn begin_stage(&self, stage: GenerationStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut file: RunFile = toml::from_str(&contents).context("Invalid run config")?;

    if let Some(g) = args.generations {
        file.reconstruction.generations = g;
    }
    if let Some(s) = args.samples {
        file.reconstruction.samples = s;
    }
    if let Some(dir) = &args.continue_from {
        file.reconstruction.continuation_dir = Some(dir.clone());
    }

    let config = file
        .reconstruction
        .resolve()
        .context("Invalid reconstruction settings")?;
    if file.data.is_empty() {
        bail!("Run config lists no data files");
    }
    let multi = file.data.len() > 1;
    let mut datasets = Vec::with_capacity(file.data.len());
    for path in &file.data {
        let data = read_real_volume(path)
            .with_context(|| format!("Failed to read data {}", path.display()))?;
        let label = if multi { dataset_label(path) } else { String::new() };
        let sink = DirectorySink::for_dataset(&file.output, label.as_str());
        datasets.push(Dataset::new(label, data, Arc::new(sink)));
    }
    if multi {
        let mut labels: Vec<&str> = datasets.iter().map(|d| d.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        if labels.len() != datasets.len() || labels.contains(&"") {
            bail!("Data files must have distinct names");
        }
    }

    let shapes: Vec<_> = datasets.iter().map(|d| d.data.dim()).collect();
    summary::print_run_summary(&file, &config, &shapes);

    let reporter = Arc::new(BarReporter::new()?);
    let mut controller = GenerationController::new(
        config,
        Arc::new(ProcessSolver::new(file.solver.clone())),
        Arc::new(DirectorySink::new(&file.output)),
    )
    .with_monitor(Arc::new(NvidiaSmiMonitor::default()))
    .with_reporter(reporter.clone());
    if let Some(stop) = &file.stop_file {
        controller = controller.with_stop_file(stop);
    }

    let result = controller.run_datasets(datasets);
    reporter.bar.finish_and_clear();
    let reports = result?;

    for report in &reports {
        summary::print_termination(report, &file.output);
    }
    if let Some(report) = reports.first() {
        summary::print_warnings(&report.warnings);
    }
    Ok(())
}

/// Checkpoint subdirectory name for a data file: its stem without the
/// `prep_data_` prefix written by `bragg prep`.
fn dataset_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_prefix("prep_data_") {
        Some(range) if !range.is_empty() => range.to_string(),
        _ => stem,
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::volume::{
    read_complex_volume, read_real_volume, read_trace, write_complex_volume, write_real_volume,
    write_trace,
};
use crate::error::{BraggError, Result};
use crate::quality::FitnessMetric;
use crate::volume::{Candidate, Population};

const IMAGE_FILE: &str = "image.vol";
const SUPPORT_FILE: &str = "support.vol";
const COHERENCE_FILE: &str = "coherence.vol";
const ERRORS_FILE: &str = "errors.vol";
const RECIPROCAL_FILE: &str = "reciprocal.vol";
const SUMMARY_FILE: &str = "summary.toml";

/// Scores of a ranked population, best first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitnessSummary {
    pub generation: usize,
    pub metric: FitnessMetric,
    pub scores: Vec<f64>,
}

/// Destination for per-generation checkpoints.
pub trait ResultSink: Send + Sync {
    /// Persist a ranked population. Saving the same generation again
    /// replaces the earlier checkpoint.
    fn save(&self, generation: usize, population: &[Candidate], summary: &FitnessSummary)
        -> Result<()>;
}

/// Writes `root/g_<generation>/<index>/*.vol` plus a `summary.toml`.
/// A sink bound to a data set label writes under
/// `root/g_<generation>/<label>/` instead.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    root: PathBuf,
    label: Option<String>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            label: None,
        }
    }

    pub fn for_dataset(root: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            root: root.into(),
            label: (!label.is_empty()).then_some(label),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generation_dir(&self, generation: usize) -> PathBuf {
        let dir = self.root.join(format!("g_{generation}"));
        match &self.label {
            Some(label) => dir.join(label),
            None => dir,
        }
    }

    fn staging_dir(&self, generation: usize) -> PathBuf {
        match &self.label {
            Some(label) => self.root.join(format!(".g_{generation}.{label}.partial")),
            None => self.root.join(format!(".g_{generation}.partial")),
        }
    }
}

impl ResultSink for DirectorySink {
    fn save(
        &self,
        generation: usize,
        population: &[Candidate],
        summary: &FitnessSummary,
    ) -> Result<()> {
        let target = self.generation_dir(generation);
        let staging = self.staging_dir(generation);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        for (index, candidate) in population.iter().enumerate() {
            let dir = staging.join(index.to_string());
            fs::create_dir_all(&dir)?;
            save_candidate(&dir, candidate)?;
        }
        let text = toml::to_string_pretty(summary).map_err(std::io::Error::other)?;
        fs::write(staging.join(SUMMARY_FILE), text)?;

        // Swap in the finished tree only once every file is written.
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&staging, &target)?;

        info!(
            generation,
            candidates = population.len(),
            dir = %target.display(),
            "Checkpoint written"
        );
        Ok(())
    }
}

/// Write one candidate's volumes into `dir`.
pub(crate) fn save_candidate(dir: &Path, candidate: &Candidate) -> Result<()> {
    write_complex_volume(&dir.join(IMAGE_FILE), &candidate.image)?;
    write_real_volume(&dir.join(SUPPORT_FILE), &candidate.support)?;
    if let Some(coherence) = &candidate.coherence {
        write_complex_volume(&dir.join(COHERENCE_FILE), coherence)?;
    }
    write_trace(&dir.join(ERRORS_FILE), &candidate.error_trace)?;
    if let Some(reciprocal) = &candidate.reciprocal {
        write_complex_volume(&dir.join(RECIPROCAL_FILE), reciprocal)?;
    }
    Ok(())
}

/// Read one candidate from `dir`. Image and support are required;
/// coherence, error trace and reciprocal space are loaded when present.
pub(crate) fn read_candidate(dir: &Path) -> Result<Candidate> {
    let mut loaded = Candidate::new(
        read_complex_volume(&dir.join(IMAGE_FILE))?,
        read_real_volume(&dir.join(SUPPORT_FILE))?,
    )?;
    let coherence_path = dir.join(COHERENCE_FILE);
    if coherence_path.is_file() {
        loaded.coherence = Some(read_complex_volume(&coherence_path)?);
    }
    let errors_path = dir.join(ERRORS_FILE);
    if errors_path.is_file() {
        loaded.error_trace = read_trace(&errors_path)?;
    }
    let reciprocal_path = dir.join(RECIPROCAL_FILE);
    if reciprocal_path.is_file() {
        loaded.reciprocal = Some(read_complex_volume(&reciprocal_path)?);
    }
    Ok(loaded)
}

/// Load `count` candidates from `dir/<index>/`.
///
/// A missing index directory, image or support is
/// [`BraggError::ContinuationDataMissing`].
pub fn load_population(dir: &Path, count: usize) -> Result<Population> {
    let mut population = Vec::with_capacity(count);
    for candidate in 0..count {
        let sub = dir.join(candidate.to_string());
        if !sub.join(IMAGE_FILE).is_file() || !sub.join(SUPPORT_FILE).is_file() {
            return Err(BraggError::ContinuationDataMissing {
                dir: dir.to_path_buf(),
                candidate,
            });
        }
        population.push(read_candidate(&sub)?);
        debug!(candidate, dir = %sub.display(), "Loaded continuation candidate");
    }
    Ok(population)
}

/// Read back the summary of a checkpointed generation.
pub fn read_summary(generation_dir: &Path) -> Result<FitnessSummary> {
    let text = fs::read_to_string(generation_dir.join(SUMMARY_FILE))?;
    toml::from_str(&text).map_err(|e| BraggError::InvalidConfig(e.to_string()))
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::align::align_frames;
use crate::error::{BraggError, Result};
use crate::io::scan::{find_scan_dirs, read_scan, FieldCorrection};
use crate::io::write_real_volume;
use crate::volume::RealVolume;

/// Raw scan preparation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub data_dir: PathBuf,
    /// Inclusive scan-number ranges; each range is stitched into one volume.
    pub scan_ranges: Vec<[u32; 2]>,
    pub exclude_scans: Vec<u32>,
    pub min_files: usize,
    pub dark_file: Option<PathBuf>,
    pub white_file: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("raw"),
            scan_ranges: Vec::new(),
            exclude_scans: Vec::new(),
            min_files: 1,
            dark_file: None,
            white_file: None,
            output_dir: PathBuf::from("prep"),
        }
    }
}

/// A stitched range written to disk.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRange {
    pub path: PathBuf,
    pub shape: (usize, usize, usize),
    /// Scan numbers that contributed frames.
    pub scans: Vec<u32>,
}

#[derive(Debug)]
pub struct RangeOutcome {
    pub range: [u32; 2],
    pub result: Result<PreparedRange>,
}

/// Per-range results of [`prepare_scans`].
#[derive(Debug, Default)]
pub struct PrepReport {
    pub outcomes: Vec<RangeOutcome>,
    pub warnings: Vec<String>,
}

impl PrepReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PreparedRange> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&[u32; 2], &BraggError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.range, e)))
    }

    /// True when there was at least one range and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.result.is_err())
    }
}

/// Stitch the scans of one range into a single aligned, summed volume.
///
/// Scan directories that yield no frames are skipped with a warning pushed
/// to `warnings`. Returns the volume and the contributing scan numbers.
pub fn stitch_scan_range(
    config: &PrepConfig,
    range: [u32; 2],
    correction: &FieldCorrection,
    warnings: &mut Vec<String>,
) -> Result<(RealVolume, Vec<u32>)> {
    let dirs = find_scan_dirs(&config.data_dir, range, &config.exclude_scans, config.min_files)?;
    if dirs.is_empty() {
        return Err(BraggError::NoData(format!(
            "no scan directories for range {}-{} in {}",
            range[0],
            range[1],
            config.data_dir.display()
        )));
    }

    let mut frames = Vec::with_capacity(dirs.len());
    let mut scans = Vec::with_capacity(dirs.len());
    for dir in &dirs {
        match read_scan(&dir.path, correction) {
            Ok(volume) => {
                frames.push(volume);
                scans.push(dir.scan);
            }
            Err(BraggError::NoData(msg)) => {
                warn!(scan = dir.scan, "Skipping scan: {msg}");
                warnings.push(format!("scan {} skipped: {msg}", dir.scan));
            }
            Err(e) => return Err(e),
        }
    }

    let stitched = align_frames(&frames)?;
    Ok((stitched, scans))
}

/// File name for a prepared range; a single configured range gets the
/// plain name.
pub fn prepared_file_name(range: [u32; 2], single: bool) -> String {
    if single {
        "prep_data.vol".to_string()
    } else {
        format!("prep_data_{}-{}.vol", range[0], range[1])
    }
}

/// Write a stitched volume into `output_dir`.
pub fn save(output_dir: &Path, range: [u32; 2], single: bool, volume: &RealVolume) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(prepared_file_name(range, single));
    write_real_volume(&path, volume)?;
    Ok(path)
}

/// Stitch and save every configured range. Failures of one range are
/// recorded in the report and do not stop the others; only problems
/// shared by all ranges (no ranges, unreadable field files) are returned
/// as errors.
pub fn prepare_scans(config: &PrepConfig) -> Result<PrepReport> {
    if config.scan_ranges.is_empty() {
        return Err(BraggError::InvalidConfig("no scan ranges configured".into()));
    }
    if let Some(bad) = config.scan_ranges.iter().find(|r| r[0] > r[1]) {
        return Err(BraggError::InvalidConfig(format!(
            "scan range {}-{} is reversed",
            bad[0], bad[1]
        )));
    }

    let correction = FieldCorrection::load(config.dark_file.as_deref(), config.white_file.as_deref())?;
    let single = config.scan_ranges.len() == 1;
    let mut report = PrepReport::default();

    for &range in &config.scan_ranges {
        let result = stitch_scan_range(config, range, &correction, &mut report.warnings)
            .and_then(|(volume, scans)| {
                let path = save(&config.output_dir, range, single, &volume)?;
                Ok(PreparedRange {
                    path,
                    shape: volume.dim(),
                    scans,
                })
            });
        match &result {
            Ok(prepared) => info!(
                start = range[0],
                end = range[1],
                scans = prepared.scans.len(),
                path = %prepared.path.display(),
                "Range prepared"
            ),
            Err(e) => warn!(start = range[0], end = range[1], "Range failed: {e}"),
        }
        report.outcomes.push(RangeOutcome { range, result });
    }

    Ok(report)
}

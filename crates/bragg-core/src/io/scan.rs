//! Raw detector scans: one directory per scan, one TIFF file per slice.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{s, Array2, Zip};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::debug;

use crate::consts::{
    DARK_FIELD_CUTOFF, WHITE_FIELD_DEAD_PIXEL, WHITE_FIELD_DEAD_VALUE, WHITE_FIELD_SCALE,
};
use crate::error::{BraggError, Result};
use crate::volume::RealVolume;

/// A scan directory together with the scan number parsed from its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanDir {
    pub scan: u32,
    pub path: PathBuf,
}

fn is_tiff(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tif" | "tiff")
    )
}

fn is_background(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with("_bg"))
}

/// Number parsed from the last four characters of `name`.
fn trailing_number(name: &str) -> Option<u32> {
    let start = name.char_indices().rev().nth(3)?.0;
    name[start..].parse().ok()
}

fn count_tiffs(dir: &Path) -> Result<usize> {
    let mut n = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_tiff(&path) && !is_background(&path) {
            n += 1;
        }
    }
    Ok(n)
}

/// Scan directories under `data_dir` whose number lies in the inclusive
/// `range`, is not excluded, and that hold at least `min_files` slices.
/// Sorted by scan number.
pub fn find_scan_dirs(
    data_dir: &Path,
    range: [u32; 2],
    exclude: &[u32],
    min_files: usize,
) -> Result<Vec<ScanDir>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(scan) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(trailing_number)
        else {
            continue;
        };
        if scan < range[0] || scan > range[1] || exclude.contains(&scan) {
            continue;
        }
        if count_tiffs(&path)? < min_files {
            debug!(scan, "Skipping scan directory with too few files");
            continue;
        }
        dirs.push(ScanDir { scan, path });
    }
    dirs.sort_by_key(|d| d.scan);
    Ok(dirs)
}

/// Read a single-channel TIFF as raw counts. Integer and float samples of
/// any width are taken as-is, without rescaling to a common bit depth.
pub fn read_tiff_slice(path: &Path) -> Result<Array2<f64>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let colortype = decoder.colortype()?;
    if !matches!(colortype, ColorType::Gray(_)) {
        return Err(BraggError::InvalidArgument(format!(
            "{}: expected a grayscale TIFF, found {colortype:?}",
            path.display()
        )));
    }
    let (w, h) = decoder.dimensions()?;
    let pixels: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(BraggError::InvalidArgument(format!(
                "{}: unsupported sample format",
                path.display()
            )))
        }
    };
    Array2::from_shape_vec((h as usize, w as usize), pixels)
        .map_err(|e| BraggError::InvalidArgument(format!("{}: {e}", path.display())))
}

/// Dark- and white-field detector corrections.
#[derive(Clone, Debug, Default)]
pub struct FieldCorrection {
    dark: Option<Array2<f64>>,
    white: Option<Array2<f64>>,
}

impl FieldCorrection {
    pub fn load(dark_file: Option<&Path>, white_file: Option<&Path>) -> Result<Self> {
        let dark = dark_file.map(read_tiff_slice).transpose()?;
        let white = white_file
            .map(read_tiff_slice)
            .transpose()?
            .map(|w| w.mapv(|v| if v < WHITE_FIELD_DEAD_PIXEL { WHITE_FIELD_DEAD_VALUE } else { v }));
        Ok(Self { dark, white })
    }

    /// Apply the corrections to one slice. Fields larger than the slice
    /// are cropped from the origin; smaller ones are an error.
    pub fn apply(&self, mut slice: Array2<f64>) -> Result<Array2<f64>> {
        let (h, w) = slice.dim();
        let fit = |field: &Array2<f64>, what: &str| -> Result<Array2<f64>> {
            let (fh, fw) = field.dim();
            if fh < h || fw < w {
                return Err(BraggError::InvalidArgument(format!(
                    "{what} field {fh}x{fw} is smaller than slice {h}x{w}"
                )));
            }
            Ok(field.slice(s![..h, ..w]).to_owned())
        };

        if let Some(dark) = &self.dark {
            let dark = fit(dark, "dark")?;
            Zip::from(&mut slice).and(&dark).for_each(|v, &d| {
                if d > DARK_FIELD_CUTOFF {
                    *v = 0.0;
                }
            });
        }
        if let Some(white) = &self.white {
            let white = fit(white, "white")?;
            Zip::from(&mut slice)
                .and(&white)
                .for_each(|v, &wf| *v = *v / wf * WHITE_FIELD_SCALE);
        }
        slice.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
        Ok(slice)
    }
}

/// Slice files of a scan ordered by the last four characters of their stem,
/// each paired with its `_bg` sibling when one exists.
fn slice_files(dir: &Path) -> Result<Vec<(PathBuf, Option<PathBuf>)>> {
    let mut keyed: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_tiff(&path) || is_background(&path) {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let key = stem
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| stem[i..].to_string())
            .unwrap_or_else(|| stem.clone());
        keyed.push((key, path));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(keyed
        .into_iter()
        .map(|(_, path)| {
            let bg = background_for(&path);
            (path, bg)
        })
        .collect())
}

fn background_for(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    let candidate = path.with_file_name(format!("{stem}_bg.{ext}"));
    candidate.is_file().then_some(candidate)
}

/// Read one scan directory as a `(rows, cols, slices)` volume.
pub fn read_scan(dir: &Path, correction: &FieldCorrection) -> Result<RealVolume> {
    let files = slice_files(dir)?;
    if files.is_empty() {
        return Err(BraggError::NoData(format!(
            "no TIFF slices in {}",
            dir.display()
        )));
    }

    let mut volume: Option<RealVolume> = None;
    for (k, (file, bg)) in files.iter().enumerate() {
        let mut slice = read_tiff_slice(file)?;
        if let Some(bg) = bg {
            let background = read_tiff_slice(bg)?;
            if background.dim() != slice.dim() {
                return Err(BraggError::InvalidArgument(format!(
                    "background {} does not match slice shape",
                    bg.display()
                )));
            }
            slice -= &background;
        }
        let slice = correction.apply(slice)?;

        let vol = volume.get_or_insert_with(|| {
            let (h, w) = slice.dim();
            RealVolume::zeros((h, w, files.len()))
        });
        if slice.dim() != (vol.dim().0, vol.dim().1) {
            return Err(BraggError::InvalidArgument(format!(
                "slice {} has shape {:?}, expected {:?}",
                file.display(),
                slice.dim(),
                (vol.dim().0, vol.dim().1)
            )));
        }
        vol.slice_mut(s![.., .., k]).assign(&slice);
    }

    volume.ok_or_else(|| BraggError::NoData(format!("no slices read from {}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_number_uses_last_four_characters() {
        assert_eq!(trailing_number("scan_0042"), Some(42));
        assert_eq!(trailing_number("S1234"), Some(1234));
        assert_eq!(trailing_number("abc"), None);
        assert_eq!(trailing_number("scan_ab12"), None);
    }

    #[test]
    fn dark_field_masks_hot_pixels() {
        let correction = FieldCorrection {
            dark: Some(Array2::from_shape_vec((1, 2), vec![10.0, 0.0]).unwrap()),
            white: None,
        };
        let out = correction
            .apply(Array2::from_shape_vec((1, 2), vec![7.0, 3.0]).unwrap())
            .unwrap();
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[0, 1]], 3.0);
    }
}

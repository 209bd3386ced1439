//! Little-endian binary volume files.
//!
//! Layout: 8-byte magic, u32 version, u32 element kind, u32 rank, three u64
//! dimensions (unused trailing dimensions are 1), then the elements in
//! row-major order. Complex elements are stored as `re, im` pairs.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{Array, Array3, Dimension};
use num_complex::Complex64;

use crate::error::{BraggError, Result};
use crate::volume::{ComplexVolume, RealVolume};

pub const VOLUME_MAGIC: &[u8; 8] = b"BRAGGVOL";
pub const VOLUME_VERSION: u32 = 1;
pub const VOLUME_HEADER_SIZE: usize = 8 + 3 * 4 + 3 * 8;

/// Element type stored in a volume file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeKind {
    Real,
    Complex,
}

impl VolumeKind {
    fn code(self) -> u32 {
        match self {
            VolumeKind::Real => 1,
            VolumeKind::Complex => 2,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(VolumeKind::Real),
            2 => Some(VolumeKind::Complex),
            _ => None,
        }
    }

    /// Bytes per stored element.
    pub fn element_size(self) -> usize {
        match self {
            VolumeKind::Real => 8,
            VolumeKind::Complex => 16,
        }
    }
}

impl std::fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeKind::Real => write!(f, "real f64"),
            VolumeKind::Complex => write!(f, "complex f64"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeHeader {
    pub kind: VolumeKind,
    pub rank: u32,
    pub dims: [usize; 3],
}

impl VolumeHeader {
    fn for_shape(kind: VolumeKind, shape: &[usize]) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(BraggError::InvalidArgument(format!(
                "volume files hold rank 1 to 3 arrays, got rank {}",
                shape.len()
            )));
        }
        let mut dims = [1usize; 3];
        dims[..shape.len()].copy_from_slice(shape);
        Ok(Self {
            kind,
            rank: shape.len() as u32,
            dims,
        })
    }

    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn data_size(&self) -> usize {
        self.element_count() * self.kind.element_size()
    }
}

fn write_header(w: &mut impl Write, header: &VolumeHeader) -> Result<()> {
    w.write_all(VOLUME_MAGIC)?;
    w.write_u32::<LittleEndian>(VOLUME_VERSION)?;
    w.write_u32::<LittleEndian>(header.kind.code())?;
    w.write_u32::<LittleEndian>(header.rank)?;
    for &d in &header.dims {
        w.write_u64::<LittleEndian>(d as u64)?;
    }
    Ok(())
}

/// Write a real array of rank 1 to 3.
pub fn write_real_volume<D: Dimension>(path: &Path, data: &Array<f64, D>) -> Result<()> {
    let header = VolumeHeader::for_shape(VolumeKind::Real, data.shape())?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, &header)?;
    for &v in data.iter() {
        writer.write_f64::<LittleEndian>(v)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a complex array of rank 1 to 3.
pub fn write_complex_volume<D: Dimension>(path: &Path, data: &Array<Complex64, D>) -> Result<()> {
    let header = VolumeHeader::for_shape(VolumeKind::Complex, data.shape())?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, &header)?;
    for v in data.iter() {
        writer.write_f64::<LittleEndian>(v.re)?;
        writer.write_f64::<LittleEndian>(v.im)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a sequence of values (an error trace) as a rank-1 real volume.
pub fn write_trace(path: &Path, values: &[f64]) -> Result<()> {
    write_real_volume(path, &ndarray::aview1(values).to_owned())
}

/// Memory-mapped volume file reader.
pub struct VolumeReader {
    mmap: Mmap,
    pub header: VolumeHeader,
}

impl VolumeReader {
    /// Open a volume file and validate its header against the file size.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < VOLUME_HEADER_SIZE {
            return Err(BraggError::InvalidVolumeFile(format!(
                "{}: file too small for header",
                path.display()
            )));
        }
        if &mmap[0..8] != VOLUME_MAGIC {
            return Err(BraggError::InvalidVolumeFile(format!(
                "{}: missing BRAGGVOL magic",
                path.display()
            )));
        }

        let header = parse_header(&mmap[8..VOLUME_HEADER_SIZE])?;
        let expected = VOLUME_HEADER_SIZE + header.data_size();
        if mmap.len() < expected {
            return Err(BraggError::InvalidVolumeFile(format!(
                "{}: truncated, expected {} bytes, got {}",
                path.display(),
                expected,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    fn payload(&self) -> &[u8] {
        &self.mmap[VOLUME_HEADER_SIZE..VOLUME_HEADER_SIZE + self.header.data_size()]
    }

    fn raw_values(&self) -> Vec<f64> {
        let payload = self.payload();
        let mut values = vec![0.0f64; payload.len() / 8];
        LittleEndian::read_f64_into(payload, &mut values);
        values
    }

    /// Flat element values of a real file.
    pub fn read_values(&self) -> Result<Vec<f64>> {
        if self.header.kind != VolumeKind::Real {
            return Err(BraggError::InvalidVolumeFile(
                "expected real data, found complex".into(),
            ));
        }
        Ok(self.raw_values())
    }

    /// Read as a real 3-D volume; lower-rank files get unit trailing axes.
    pub fn read_real(&self) -> Result<RealVolume> {
        let values = self.read_values()?;
        self.shape_3d(values)
    }

    /// Read as a complex 3-D volume; real files are promoted.
    pub fn read_complex(&self) -> Result<ComplexVolume> {
        let raw = self.raw_values();
        let values: Vec<Complex64> = match self.header.kind {
            VolumeKind::Real => raw.into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
            VolumeKind::Complex => raw
                .chunks_exact(2)
                .map(|pair| Complex64::new(pair[0], pair[1]))
                .collect(),
        };
        self.shape_3d(values)
    }

    fn shape_3d<A>(&self, values: Vec<A>) -> Result<Array3<A>> {
        let [d0, d1, d2] = self.header.dims;
        Array3::from_shape_vec((d0, d1, d2), values)
            .map_err(|e| BraggError::InvalidVolumeFile(e.to_string()))
    }
}

fn parse_header(buf: &[u8]) -> Result<VolumeHeader> {
    let mut cursor = Cursor::new(buf);
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != VOLUME_VERSION {
        return Err(BraggError::InvalidVolumeFile(format!(
            "unsupported version {version}"
        )));
    }
    let code = cursor.read_u32::<LittleEndian>()?;
    let kind = VolumeKind::from_code(code)
        .ok_or_else(|| BraggError::InvalidVolumeFile(format!("unknown element kind {code}")))?;
    let rank = cursor.read_u32::<LittleEndian>()?;
    if !(1..=3).contains(&rank) {
        return Err(BraggError::InvalidVolumeFile(format!("invalid rank {rank}")));
    }

    let mut dims = [1usize; 3];
    for d in &mut dims {
        *d = usize::try_from(cursor.read_u64::<LittleEndian>()?)
            .map_err(|_| BraggError::InvalidVolumeFile("dimension overflows usize".into()))?;
    }
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|n| n.checked_mul(kind.element_size()))
        .ok_or_else(|| BraggError::InvalidVolumeFile("volume size overflows".into()))?;

    Ok(VolumeHeader { kind, rank, dims })
}

pub fn read_real_volume(path: &Path) -> Result<RealVolume> {
    VolumeReader::open(path)?.read_real()
}

pub fn read_complex_volume(path: &Path) -> Result<ComplexVolume> {
    VolumeReader::open(path)?.read_complex()
}

pub fn read_trace(path: &Path) -> Result<Vec<f64>> {
    VolumeReader::open(path)?.read_values()
}

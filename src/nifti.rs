//! NIfTI-1 volume loading and writing
//!
//! Supports single-file NIfTI-1 (`n+1`) in either byte order, optionally
//! gzip-compressed, and ZIP archives containing one such file (the format
//! Vista3D returns). Only the first 3D volume of a file is read.
//!
//! The voxel-to-world affine is taken from the sform when `sform_code > 0`,
//! otherwise from the qform quaternion when `qform_code > 0`, otherwise it
//! is `diag(pixdim)`.

use crate::error::{Error, Result};
use crate::volume::LabeledVolume;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{Array3, ShapeBuilder};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Size of a NIfTI-1 header in bytes
pub const HEADER_SIZE: usize = 348;

/// Offset of voxel data in files written by [`write`]
const DATA_OFFSET: usize = 352;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Voxel data types that can hold labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// `DT_UINT8` (2)
    U8,
    /// `DT_INT16` (4)
    I16,
    /// `DT_INT32` (8)
    I32,
    /// `DT_FLOAT32` (16)
    F32,
    /// `DT_FLOAT64` (64)
    F64,
    /// `DT_INT8` (256)
    I8,
    /// `DT_UINT16` (512)
    U16,
    /// `DT_UINT32` (768)
    U32,
}

impl Datatype {
    /// Map a header datatype code
    pub fn from_code(code: i16) -> Option<Self> {
        Some(match code {
            2 => Datatype::U8,
            4 => Datatype::I16,
            8 => Datatype::I32,
            16 => Datatype::F32,
            64 => Datatype::F64,
            256 => Datatype::I8,
            512 => Datatype::U16,
            768 => Datatype::U32,
            _ => return None,
        })
    }

    /// Header datatype code
    pub fn code(&self) -> i16 {
        match self {
            Datatype::U8 => 2,
            Datatype::I16 => 4,
            Datatype::I32 => 8,
            Datatype::F32 => 16,
            Datatype::F64 => 64,
            Datatype::I8 => 256,
            Datatype::U16 => 512,
            Datatype::U32 => 768,
        }
    }

    /// Bytes per voxel
    pub fn size(&self) -> usize {
        match self {
            Datatype::U8 | Datatype::I8 => 1,
            Datatype::I16 | Datatype::U16 => 2,
            Datatype::I32 | Datatype::U32 | Datatype::F32 => 4,
            Datatype::F64 => 8,
        }
    }
}

/// Fixed-offset reader over header bytes in a known byte order
struct HeaderBytes<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl HeaderBytes<'_> {
    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    fn i16(&self, offset: usize) -> i16 {
        let raw = self.array::<2>(offset);
        if self.little_endian {
            i16::from_le_bytes(raw)
        } else {
            i16::from_be_bytes(raw)
        }
    }

    fn f32(&self, offset: usize) -> f64 {
        let raw = self.array::<4>(offset);
        let value = if self.little_endian {
            f32::from_le_bytes(raw)
        } else {
            f32::from_be_bytes(raw)
        };
        value as f64
    }
}

/// The header fields used to interpret a labeled volume
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Voxel counts along x, y, z
    pub dim: [usize; 3],
    /// Voxel data type
    pub datatype: Datatype,
    /// `pixdim[0..8]`; `pixdim[0]` is the qform handedness factor
    pub pixdim: [f64; 8],
    /// Byte offset of the voxel data
    pub vox_offset: usize,
    /// Data scaling slope, 0 when unused
    pub scl_slope: f64,
    /// Data scaling intercept
    pub scl_inter: f64,
    /// qform code, 0 when the quaternion is unused
    pub qform_code: i16,
    /// sform code, 0 when the sform rows are unused
    pub sform_code: i16,
    /// Quaternion parameters b, c, d
    pub quatern: [f64; 3],
    /// qform translation
    pub qoffset: [f64; 3],
    /// sform rows x, y, z
    pub srow: [[f64; 4]; 3],
    /// Byte order of the file
    pub little_endian: bool,
}

impl NiftiHeader {
    /// Parse the first 348 bytes of a NIfTI-1 file
    ///
    /// # Errors
    /// [`Error::Load`] when the header is truncated, has an unknown byte
    /// order or magic, an unsupported datatype, or a zero dimension.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::load(format!(
                "NIfTI header truncated: {} bytes, expected {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let size = [bytes[0], bytes[1], bytes[2], bytes[3]];
        let little_endian = if i32::from_le_bytes(size) == HEADER_SIZE as i32 {
            true
        } else if i32::from_be_bytes(size) == HEADER_SIZE as i32 {
            false
        } else {
            return Err(Error::load("Not a NIfTI-1 file: sizeof_hdr is not 348"));
        };
        let h = HeaderBytes {
            bytes,
            little_endian,
        };

        let magic = &bytes[344..348];
        if magic == b"ni1\0" {
            return Err(Error::load(
                "Header-only NIfTI-1 (.hdr) with a separate .img file is not supported",
            ));
        }
        if magic != b"n+1\0" {
            return Err(Error::load(format!("Invalid NIfTI magic {:?}", magic)));
        }

        let ndim = h.i16(40);
        if !(1..=7).contains(&ndim) {
            return Err(Error::load(format!("Invalid dimension count {}", ndim)));
        }
        let mut dim = [1usize; 3];
        for (axis, d) in dim.iter_mut().enumerate() {
            if axis < ndim as usize {
                let value = h.i16(42 + axis * 2);
                if value <= 0 {
                    return Err(Error::load(format!(
                        "Dimension {} has size {}",
                        axis + 1,
                        value
                    )));
                }
                *d = value as usize;
            }
        }
        let extra: i64 = (3..ndim as usize)
            .map(|axis| h.i16(42 + axis * 2).max(1) as i64)
            .product();
        if extra > 1 {
            warn!(volumes = extra, "Reading only the first 3D volume");
        }

        let code = h.i16(70);
        let datatype = Datatype::from_code(code)
            .ok_or_else(|| Error::load(format!("Unsupported NIfTI datatype {}", code)))?;

        let mut pixdim = [0.0; 8];
        for (i, p) in pixdim.iter_mut().enumerate() {
            *p = h.f32(76 + i * 4);
        }

        let vox_offset = h.f32(108);
        if !(vox_offset.is_finite() && vox_offset >= 0.0) {
            return Err(Error::load(format!("Invalid vox_offset {}", vox_offset)));
        }
        // single-file NIfTI data never starts inside the header
        let vox_offset = (vox_offset as usize).max(DATA_OFFSET);

        let mut srow = [[0.0; 4]; 3];
        for (r, row) in srow.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = h.f32(280 + r * 16 + c * 4);
            }
        }

        Ok(Self {
            dim,
            datatype,
            pixdim,
            vox_offset,
            scl_slope: h.f32(112),
            scl_inter: h.f32(116),
            qform_code: h.i16(252),
            sform_code: h.i16(254),
            quatern: [h.f32(256), h.f32(260), h.f32(264)],
            qoffset: [h.f32(268), h.f32(272), h.f32(276)],
            srow,
            little_endian,
        })
    }

    /// Voxel spacing from `pixdim[1..=3]`
    pub fn spacing(&self) -> [f64; 3] {
        [self.pixdim[1], self.pixdim[2], self.pixdim[3]]
    }

    /// Voxel-index to world affine
    pub fn affine(&self) -> Matrix4<f64> {
        if self.sform_code > 0 {
            let mut affine = Matrix4::identity();
            for r in 0..3 {
                for c in 0..4 {
                    affine[(r, c)] = self.srow[r][c];
                }
            }
            affine
        } else if self.qform_code > 0 {
            self.qform_affine()
        } else {
            Matrix4::new_nonuniform_scaling(&Vector3::from(self.spacing()))
        }
    }

    fn qform_affine(&self) -> Matrix4<f64> {
        let [b, c, d] = self.quatern;
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let rotation = Matrix3::new(
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - b * b - c * c,
        );
        let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let [dx, dy, dz] = self.spacing();
        let linear = rotation * Matrix3::from_diagonal(&Vector3::new(dx, dy, qfac * dz));

        let mut affine = Matrix4::identity();
        affine.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        for r in 0..3 {
            affine[(r, 3)] = self.qoffset[r];
        }
        affine
    }

    /// Whether `scl_slope`/`scl_inter` change the stored values
    fn has_scaling(&self) -> bool {
        self.scl_slope != 0.0
            && self.scl_slope.is_finite()
            && !(self.scl_slope == 1.0 && self.scl_inter == 0.0)
    }
}

fn decode_voxel(raw: &[u8], datatype: Datatype, little_endian: bool) -> f64 {
    macro_rules! read {
        ($ty:ty, $n:literal) => {{
            let mut bytes = [0u8; $n];
            bytes.copy_from_slice(&raw[..$n]);
            if little_endian {
                <$ty>::from_le_bytes(bytes) as f64
            } else {
                <$ty>::from_be_bytes(bytes) as f64
            }
        }};
    }
    match datatype {
        Datatype::U8 => raw[0] as f64,
        Datatype::I8 => raw[0] as i8 as f64,
        Datatype::I16 => read!(i16, 2),
        Datatype::U16 => read!(u16, 2),
        Datatype::I32 => read!(i32, 4),
        Datatype::U32 => read!(u32, 4),
        Datatype::F32 => read!(f32, 4),
        Datatype::F64 => read!(f64, 8),
    }
}

fn to_label(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Parse an uncompressed NIfTI-1 image
fn parse_image(bytes: &[u8]) -> Result<LabeledVolume> {
    let header = NiftiHeader::parse(bytes)?;
    let [nx, ny, nz] = header.dim;
    let voxels = nx * ny * nz;
    let size = header.datatype.size();
    let end = header.vox_offset + voxels * size;
    if bytes.len() < end {
        return Err(Error::load(format!(
            "NIfTI data truncated: {} bytes, header promises {}",
            bytes.len(),
            end
        )));
    }

    let scaling = header.has_scaling();
    let mut labels = Vec::with_capacity(voxels);
    for chunk in bytes[header.vox_offset..end].chunks_exact(size) {
        let mut value = decode_voxel(chunk, header.datatype, header.little_endian);
        if scaling {
            value = value * header.scl_slope + header.scl_inter;
        }
        let label = to_label(value).ok_or_else(|| {
            Error::load(format!(
                "Label values must be non-negative integers, found {}",
                value
            ))
        })?;
        labels.push(label);
    }

    // x varies fastest on disk
    let labels = Array3::from_shape_vec((nx, ny, nz).f(), labels)
        .map_err(|e| Error::load(format!("Invalid volume shape: {}", e)))?
        .as_standard_layout()
        .into_owned();

    let volume = LabeledVolume::new(labels, header.spacing(), header.affine())?;
    info!(
        dims = ?header.dim,
        spacing = ?header.spacing(),
        datatype = ?header.datatype,
        "Loaded NIfTI volume"
    );
    Ok(volume)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    MultiGzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| Error::load(format!("Failed to decompress gzip data: {}", e)))?;
    Ok(out)
}

/// Decode a `.nii` or `.nii.gz` payload
fn parse_single(bytes: &[u8]) -> Result<LabeledVolume> {
    if bytes.starts_with(&GZIP_MAGIC) {
        debug!(compressed = bytes.len(), "Decompressing gzip NIfTI");
        parse_image(&gunzip(bytes)?)
    } else {
        parse_image(bytes)
    }
}

/// Read the first `.nii`/`.nii.gz` entry of a ZIP archive
fn parse_zip(bytes: &[u8]) -> Result<LabeledVolume> {
    let invalid = |e: zip::result::ZipError| Error::load(format!("Invalid ZIP archive: {}", e));
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(invalid)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid)?;
        let name = entry.name().to_ascii_lowercase();
        if entry.is_dir() || name.starts_with("__macosx") {
            continue;
        }
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            debug!(entry = entry.name(), "Reading NIfTI from ZIP archive");
            // the declared size is untrusted, so the buffer grows as data arrives
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(|e| {
                Error::load(format!("Failed to read ZIP entry '{}': {}", entry.name(), e))
            })?;
            return parse_single(&content);
        }
    }
    Err(Error::load("ZIP archive contains no .nii or .nii.gz file"))
}

/// Load a labeled volume from bytes
///
/// Accepts raw NIfTI-1, gzip-compressed NIfTI-1, or a ZIP archive holding
/// either.
pub fn load_from_bytes(bytes: &[u8]) -> Result<LabeledVolume> {
    if bytes.starts_with(&ZIP_MAGIC) {
        parse_zip(bytes)
    } else {
        parse_single(bytes)
    }
}

/// Load a labeled volume from a `.nii`, `.nii.gz` or `.zip` file
///
/// # Errors
/// [`Error::Load`] when the file cannot be read or its content is not a
/// usable labeled volume.
pub fn load<P: AsRef<Path>>(path: P) -> Result<LabeledVolume> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| Error::load(format!("Cannot read '{}': {}", path.display(), e)))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read volume file");
    load_from_bytes(&bytes)
}

/// Serialize a volume as little-endian NIfTI-1 with uint32 voxels
///
/// The affine is stored as the sform (`sform_code = 1`).
///
/// # Errors
/// [`Error::Load`] when a dimension does not fit the 16-bit header field.
pub fn to_bytes(volume: &LabeledVolume) -> Result<Vec<u8>> {
    let (nx, ny, nz) = volume.dim();
    let header_dim = |size: usize| {
        i16::try_from(size).map_err(|_| {
            Error::load(format!(
                "Dimension {} exceeds the NIfTI-1 limit of {}",
                size,
                i16::MAX
            ))
        })
    };
    let dims = [
        3i16,
        header_dim(nx)?,
        header_dim(ny)?,
        header_dim(nz)?,
        1,
        1,
        1,
        1,
    ];
    let spacing = volume.spacing();
    let affine = volume.affine();
    let mut out = vec![0u8; DATA_OFFSET];

    let mut put = |offset: usize, bytes: &[u8]| {
        out[offset..offset + bytes.len()].copy_from_slice(bytes);
    };
    put(0, &(HEADER_SIZE as i32).to_le_bytes());
    for (i, d) in dims.iter().enumerate() {
        put(40 + i * 2, &d.to_le_bytes());
    }
    put(70, &Datatype::U32.code().to_le_bytes());
    put(72, &32i16.to_le_bytes());
    let pixdim = [1.0f32, spacing[0] as f32, spacing[1] as f32, spacing[2] as f32];
    for (i, p) in pixdim.iter().enumerate() {
        put(76 + i * 4, &p.to_le_bytes());
    }
    put(108, &(DATA_OFFSET as f32).to_le_bytes());
    put(112, &1.0f32.to_le_bytes());
    // xyzt_units: millimetres
    put(123, &[2]);
    put(254, &1i16.to_le_bytes());
    for r in 0..3 {
        for c in 0..4 {
            put(280 + r * 16 + c * 4, &(affine[(r, c)] as f32).to_le_bytes());
        }
    }
    put(344, b"n+1\0");

    out.reserve(nx * ny * nz * 4);
    // the transposed view iterates with x fastest
    for label in volume.labels().t().iter() {
        out.extend_from_slice(&label.to_le_bytes());
    }
    Ok(out)
}

/// Write a volume to `path`, gzip-compressed when the path ends in `.gz`
pub fn write<P: AsRef<Path>>(path: P, volume: &LabeledVolume) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(volume)?;
    let gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes)?;
        std::fs::write(path, encoder.finish()?)?;
    } else {
        std::fs::write(path, bytes)?;
    }
    debug!(path = %path.display(), "Wrote NIfTI volume");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_volume() -> LabeledVolume {
        let mut labels = Array3::<u32>::zeros((4, 3, 2));
        labels[[1, 0, 0]] = 1;
        labels[[3, 2, 1]] = 7;
        labels[[0, 1, 1]] = 300;
        let mut affine = Matrix4::new_nonuniform_scaling(&Vector3::new(0.5, 0.75, 2.0));
        affine[(0, 3)] = -10.0;
        affine[(2, 3)] = 4.5;
        LabeledVolume::new(labels, [0.5, 0.75, 2.0], affine).unwrap()
    }

    #[test]
    fn test_round_trip_bytes() {
        let volume = sample_volume();
        let loaded = load_from_bytes(&to_bytes(&volume).unwrap()).unwrap();
        assert_eq!(loaded.labels(), volume.labels());
        assert_eq!(loaded.spacing(), volume.spacing());
        assert_eq!(loaded.affine(), volume.affine());
    }

    #[test]
    fn test_round_trip_gzip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.nii.gz");
        let volume = sample_volume();
        write(&path, &volume).unwrap();
        assert_eq!(&std::fs::read(&path).unwrap()[..2], &GZIP_MAGIC);
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.labels(), volume.labels());
    }

    #[test]
    fn test_big_endian_header() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        // byte-swap every header field and voxel
        let swap = |bytes: &mut [u8], offset: usize, width: usize| {
            bytes[offset..offset + width].reverse();
        };
        swap(&mut bytes, 0, 4);
        for i in 0..8 {
            swap(&mut bytes, 40 + i * 2, 2);
        }
        swap(&mut bytes, 70, 2);
        swap(&mut bytes, 72, 2);
        for i in 0..8 {
            swap(&mut bytes, 76 + i * 4, 4);
        }
        for offset in [108, 112, 116] {
            swap(&mut bytes, offset, 4);
        }
        swap(&mut bytes, 252, 2);
        swap(&mut bytes, 254, 2);
        for i in 0..12 {
            swap(&mut bytes, 280 + i * 4, 4);
        }
        for offset in (DATA_OFFSET..bytes.len()).step_by(4) {
            swap(&mut bytes, offset, 4);
        }

        let loaded = load_from_bytes(&bytes).unwrap();
        assert_eq!(loaded.labels(), sample_volume().labels());
    }

    #[test]
    fn test_qform_affine() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        bytes[254..256].copy_from_slice(&0i16.to_le_bytes());
        bytes[252..254].copy_from_slice(&1i16.to_le_bytes());
        // 180 degree rotation about z: (b, c, d) = (0, 0, 1)
        bytes[264..268].copy_from_slice(&1.0f32.to_le_bytes());
        bytes[268..272].copy_from_slice(&5.0f32.to_le_bytes());

        let header = NiftiHeader::parse(&bytes).unwrap();
        let affine = header.affine();
        assert!((affine[(0, 0)] + 0.5).abs() < 1e-6);
        assert!((affine[(1, 1)] + 0.75).abs() < 1e-6);
        assert!((affine[(2, 2)] - 2.0).abs() < 1e-6);
        assert!((affine[(0, 3)] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixdim_fallback() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        bytes[254..256].copy_from_slice(&0i16.to_le_bytes());
        let header = NiftiHeader::parse(&bytes).unwrap();
        assert_eq!(
            header.affine(),
            Matrix4::new_nonuniform_scaling(&Vector3::new(0.5, 0.75, 2.0))
        );
    }

    #[test]
    fn test_scaled_float_labels() {
        let volume = sample_volume();
        let mut bytes = to_bytes(&volume).unwrap();
        bytes[70..72].copy_from_slice(&Datatype::F32.code().to_le_bytes());
        let data: Vec<u8> = volume
            .labels()
            .t()
            .iter()
            .flat_map(|&l| ((l as f32 - 1.0) / 2.0).to_le_bytes())
            .collect();
        bytes.truncate(DATA_OFFSET);
        bytes.extend(data);
        bytes[112..116].copy_from_slice(&2.0f32.to_le_bytes());
        bytes[116..120].copy_from_slice(&1.0f32.to_le_bytes());

        let loaded = load_from_bytes(&bytes).unwrap();
        assert_eq!(loaded.labels(), volume.labels());
    }

    #[test]
    fn test_negative_labels_rejected() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        bytes[70..72].copy_from_slice(&Datatype::I32.code().to_le_bytes());
        bytes[DATA_OFFSET..DATA_OFFSET + 4].copy_from_slice(&(-3i32).to_le_bytes());
        let err = load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_fractional_labels_rejected() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        bytes[70..72].copy_from_slice(&Datatype::F32.code().to_le_bytes());
        bytes[DATA_OFFSET..DATA_OFFSET + 4].copy_from_slice(&1.5f32.to_le_bytes());
        assert!(matches!(load_from_bytes(&bytes), Err(Error::Load(_))));
    }

    #[test]
    fn test_malformed_inputs() {
        let bytes = to_bytes(&sample_volume()).unwrap();
        assert!(matches!(load_from_bytes(&bytes[..200]), Err(Error::Load(_))));
        assert!(matches!(load_from_bytes(&bytes[..400]), Err(Error::Load(_))));

        let mut bad_magic = bytes.clone();
        bad_magic[344..348].copy_from_slice(b"xxxx");
        assert!(matches!(load_from_bytes(&bad_magic), Err(Error::Load(_))));

        let mut zero_dim = bytes.clone();
        zero_dim[44..46].copy_from_slice(&0i16.to_le_bytes());
        assert!(matches!(load_from_bytes(&zero_dim), Err(Error::Load(_))));

        let mut bad_type = bytes.clone();
        bad_type[70..72].copy_from_slice(&32i16.to_le_bytes());
        assert!(matches!(load_from_bytes(&bad_type), Err(Error::Load(_))));

        let mut zero_spacing = bytes.clone();
        zero_spacing[254..256].copy_from_slice(&0i16.to_le_bytes());
        zero_spacing[80..84].copy_from_slice(&0.0f32.to_le_bytes());
        assert!(matches!(load_from_bytes(&zero_spacing), Err(Error::Load(_))));
    }

    #[test]
    fn test_header_only_pair_rejected() {
        let mut bytes = to_bytes(&sample_volume()).unwrap();
        bytes[344..348].copy_from_slice(b"ni1\0");
        let err = load_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
        assert!(err.to_string().contains(".img"), "{}", err);
    }

    #[test]
    fn test_oversized_dimension_not_written() {
        let volume =
            LabeledVolume::with_spacing(Array3::<u32>::zeros((32768, 1, 1)), [1.0; 3]).unwrap();
        let err = to_bytes(&volume).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
        assert!(err.to_string().contains("32768"));

        let dir = tempdir().unwrap();
        assert!(write(dir.path().join("wide.nii"), &volume).is_err());
        assert!(!dir.path().join("wide.nii").exists());
    }

    #[test]
    fn test_corrupt_zip_is_load_error() {
        let err = load_from_bytes(b"PK\x03\x04garbage").unwrap_err();
        assert!(matches!(err, Error::Load(_)), "Unexpected error {:?}", err);
        assert!(err.to_string().contains("ZIP"));
    }

    #[test]
    fn test_zip_archive() {
        let volume = sample_volume();
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("readme.txt", options).unwrap();
            zip.write_all(b"segmentation result").unwrap();
            zip.start_file("result/labels.nii", options).unwrap();
            zip.write_all(&to_bytes(&volume).unwrap()).unwrap();
            zip.finish().unwrap();
        }
        let loaded = load_from_bytes(buffer.get_ref()).unwrap();
        assert_eq!(loaded.labels(), volume.labels());
    }

    #[test]
    fn test_zip_without_volume() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            zip.start_file("readme.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"nothing here").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(
            load_from_bytes(buffer.get_ref()),
            Err(Error::Load(_))
        ));
    }
}

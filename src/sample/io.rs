//! Loading and storing samples.
//!
//! Raw sample files are flat arrays of one [`SampleType`] in little-endian
//! order. Manifests are text files with one `<sample-path> <label>` pair per
//! line. Image samples go through an [`ImageDecoder`]; the bundled
//! [`NetpbmDecoder`] reads binary PGM and PPM files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error};
use ndarray::Array1;

use super::{Sample, SampleSet};
use crate::error::{Result, SubspaceError};
use crate::utils::checked_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    I8,
    U8,
    I32,
    U32,
    F32,
    F64,
    Image,
}

impl SampleType {
    /// Width in bytes of one stored element; `None` for images.
    pub const fn element_size(self) -> Option<usize> {
        match self {
            SampleType::I8 | SampleType::U8 => Some(1),
            SampleType::I32 | SampleType::U32 | SampleType::F32 => Some(4),
            SampleType::F64 => Some(8),
            SampleType::Image => None,
        }
    }

    /// Parses the names used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "char" => Some(SampleType::I8),
            "uchar" => Some(SampleType::U8),
            "int" => Some(SampleType::I32),
            "uint" => Some(SampleType::U32),
            "float" => Some(SampleType::F32),
            "double" => Some(SampleType::F64),
            "img" => Some(SampleType::Image),
            _ => None,
        }
    }

    fn decode(self, bytes: &[u8]) -> Vec<f64> {
        match self {
            SampleType::I8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
            SampleType::U8 => bytes.iter().map(|&b| b as f64).collect(),
            SampleType::I32 => bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            SampleType::U32 => bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            SampleType::F32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            SampleType::F64 => bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    f64::from_le_bytes(buf)
                })
                .collect(),
            SampleType::Image => Vec::new(),
        }
    }
}

/// A decoded 8-bit grayscale image, pixels stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl GrayImage {
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }
}

pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage>;
}

/// Decoder for binary PGM (`P5`) and PPM (`P6`) files with 8-bit channels.
/// Colour pixels are reduced to the average of their channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetpbmDecoder;

impl NetpbmDecoder {
    fn parse(bytes: &[u8]) -> Result<GrayImage> {
        let mut pos = 0usize;
        let mut fields = Vec::with_capacity(4);
        while fields.len() < 4 {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'#' {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                continue;
            }
            let start = pos;
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if start == pos {
                return Err(SubspaceError::Format("truncated netpbm header".into()));
            }
            fields.push(String::from_utf8_lossy(&bytes[start..pos]).into_owned());
        }
        // exactly one whitespace byte separates the header from the raster
        pos += 1;

        let channels = match fields[0].as_str() {
            "P5" => 1,
            "P6" => 3,
            other => {
                return Err(SubspaceError::Format(format!(
                    "unsupported image format '{}'",
                    other
                )))
            }
        };
        let parse_field = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| SubspaceError::Format(format!("bad netpbm header field '{}'", s)))
        };
        let width = parse_field(&fields[1])?;
        let height = parse_field(&fields[2])?;
        let max_value = parse_field(&fields[3])?;
        if width == 0 || height == 0 {
            return Err(SubspaceError::Format("image has zero width or height".into()));
        }
        if max_value == 0 || max_value > 255 {
            return Err(SubspaceError::Format(format!(
                "unsupported maximum value {}",
                max_value
            )));
        }

        let needed = checked_len(width, height, "image size")
            .and_then(|pixels| checked_len(pixels, channels, "image size"))?;
        let raster = bytes
            .get(pos..)
            .and_then(|rest| rest.get(..needed))
            .ok_or_else(|| SubspaceError::Format("truncated image data".into()))?;
        let pixels = raster
            .chunks_exact(channels)
            .map(|px| (px.iter().map(|&c| c as u32).sum::<u32>() / channels as u32) as u8)
            .collect();

        Ok(GrayImage {
            width,
            height,
            pixels,
        })
    }
}

impl ImageDecoder for NetpbmDecoder {
    fn decode(&self, path: &Path) -> Result<GrayImage> {
        let bytes = fs::read(path).map_err(|e| SubspaceError::file(path, e))?;
        Self::parse(&bytes)
    }
}

/// Writes `image` as a binary PGM file.
pub fn save_pgm<P: AsRef<Path>>(path: P, image: &GrayImage) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SubspaceError::file(path, e))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "P5\n{} {}\n255\n", image.width, image.height)?;
    writer.write_all(&image.pixels)?;
    writer.flush()?;
    Ok(())
}

/// Reads the `(path, label)` pairs of a manifest in file order.
///
/// Blank lines are skipped; a line without a label gets an empty one.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<(PathBuf, String)>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SubspaceError::file(path, e))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(sample_path) = parts.next() else {
            continue;
        };
        let label = parts.next().unwrap_or_default();
        entries.push((PathBuf::from(sample_path), label.to_string()));
    }
    Ok(entries)
}

impl Sample {
    /// Loads a sample file of `sample_type` elements.
    ///
    /// With `size == 0` the element count is derived from the file length.
    /// Image samples use the bundled [`NetpbmDecoder`] and ignore `size`.
    pub fn load<P: AsRef<Path>>(
        path: P,
        label: &str,
        sample_type: SampleType,
        size: usize,
    ) -> Result<Sample> {
        Self::load_with(path, label, sample_type, size, &NetpbmDecoder)
    }

    pub fn load_with<P: AsRef<Path>, D: ImageDecoder + ?Sized>(
        path: P,
        label: &str,
        sample_type: SampleType,
        size: usize,
        decoder: &D,
    ) -> Result<Sample> {
        let path = path.as_ref();
        let features = match sample_type.element_size() {
            None => {
                let image = decoder.decode(path).map_err(|e| {
                    error!("Error reading image {}", path.display());
                    e
                })?;
                image.pixels.iter().map(|&p| p as f64).collect::<Vec<_>>()
            }
            Some(width) => {
                let bytes = fs::read(path).map_err(|e| SubspaceError::file(path, e))?;
                let count = if size == 0 { bytes.len() / width } else { size };
                let needed = checked_len(count, width, "sample size")?;
                let raw = bytes.get(..needed).ok_or_else(|| {
                    SubspaceError::Format(format!(
                        "{} holds {} bytes, {} needed",
                        path.display(),
                        bytes.len(),
                        needed
                    ))
                })?;
                sample_type.decode(raw)
            }
        };

        debug!("Loaded {} features from {}", features.len(), path.display());
        Ok(Sample::new(Array1::from(features), label).with_source(path.to_string_lossy()))
    }

    /// Writes the features as little-endian `f64` into `folder`, under the
    /// file name of the sample's source.
    pub fn save<P: AsRef<Path>>(&self, folder: P) -> Result<PathBuf> {
        let name = Path::new(&self.source)
            .file_name()
            .ok_or_else(|| {
                SubspaceError::InvalidArgument(format!(
                    "sample source '{}' has no file name",
                    self.source
                ))
            })?
            .to_owned();
        let path = folder.as_ref().join(name);
        let file = File::create(&path).map_err(|e| SubspaceError::file(&path, e))?;
        let mut writer = BufWriter::new(file);
        for v in self.features.iter() {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(path)
    }
}

impl SampleSet {
    /// Loads every sample listed in `manifest`, preserving its order.
    ///
    /// With `size == 0` the element count of raw samples is derived from the
    /// length of the first listed file and applied to every sample.
    pub fn load<P: AsRef<Path>>(
        manifest: P,
        sample_type: SampleType,
        size: usize,
    ) -> Result<SampleSet> {
        Self::load_with(manifest, sample_type, size, &NetpbmDecoder)
    }

    pub fn load_with<P: AsRef<Path>, D: ImageDecoder + ?Sized>(
        manifest: P,
        sample_type: SampleType,
        size: usize,
        decoder: &D,
    ) -> Result<SampleSet> {
        let entries = load_manifest(manifest)?;
        // The first raw file fixes the element count for the whole set.
        let size = match (size, sample_type.element_size(), entries.first()) {
            (0, Some(width), Some((first, _))) => {
                let bytes = fs::metadata(first)
                    .map_err(|e| SubspaceError::file(first, e))?
                    .len();
                let count = usize::try_from(bytes / width as u64).map_err(|_| {
                    SubspaceError::Format(format!("{} is too large", first.display()))
                })?;
                debug!("Using {} features per sample from {}", count, first.display());
                count
            }
            _ => size,
        };
        entries
            .into_iter()
            .map(|(path, label)| Sample::load_with(&path, &label, sample_type, size, decoder))
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, folder: P) -> Result<()> {
        for sample in self.iter() {
            sample.save(folder.as_ref())?;
        }
        Ok(())
    }
}

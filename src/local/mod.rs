//! # Local (patch) subspaces
//!
//! Image-shaped samples are tiled into square, possibly overlapping patches.
//! One ordinary [`Subspace`] is trained per patch and the axes of all patches
//! are ranked together by `|criterion|`, so the strongest local features can
//! be picked regardless of which patch they come from.
//!
//! Binary layout of a [`LocalSubspace`]:
//! `[i64 descriptors][i64 subspaces][i64 features]`, then every descriptor as
//! `[i64 size][size i64 pixel indices]`, every subspace in the
//! [`Subspace`] layout and finally every feature as
//! `[i64 patch][i64 subspace][i64 axis][f64 score]`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, ArrayView1};

use crate::error::{Result, SubspaceError};
use crate::sample::{GrayImage, Sample};
use crate::subspace::Subspace;
use crate::utils::{read_f64, read_len, write_f64, write_len};

mod generator;
mod projector;

pub use generator::{LocalSubspaceGenerator, LocalSubspaceGeneratorBuilder};
pub use projector::LocalSubspaceProjector;

/// Positions of a patch's pixels inside the flattened sample, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalDescriptor {
    indices: Vec<usize>,
}

impl LocalDescriptor {
    pub fn new(indices: Vec<usize>) -> Self {
        LocalDescriptor { indices }
    }

    /// Square patch of side `size` with its upper-left corner at `(x, y)`,
    /// clipped to a `width × height` image.
    pub fn square_patch(width: usize, height: usize, size: usize, x: usize, y: usize) -> Self {
        let max_x = (x + size).min(width);
        let max_y = (y + size).min(height);
        let mut indices = Vec::with_capacity(max_x.saturating_sub(x) * max_y.saturating_sub(y));
        for row in y..max_y {
            for col in x..max_x {
                indices.push(row * width + col);
            }
        }
        LocalDescriptor { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Gathers the patch's values from `features`. Indices past the end of
    /// the sample read as zero.
    pub fn extract(&self, features: ArrayView1<'_, f64>) -> Array1<f64> {
        self.indices
            .iter()
            .map(|&i| features.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Local sample with the same label and source as `sample`.
    pub fn extract_sample(&self, sample: &Sample) -> Sample {
        Sample::new(self.extract(sample.features()), sample.label()).with_source(sample.source())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_len(writer, self.indices.len())?;
        for &index in &self.indices {
            write_len(writer, index)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let size = read_len(reader, "descriptor size")?;
        let indices = (0..size)
            .map(|_| read_len(reader, "pixel index"))
            .collect::<Result<Vec<_>>>()?;
        Ok(LocalDescriptor { indices })
    }
}

/// One ranked feature: axis `axis_index` of subspace `subspace_index`,
/// applied to the pixels of patch `patch_index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFeature {
    pub patch_index: usize,
    pub subspace_index: usize,
    pub axis_index: usize,
    /// `|criterion|` of the axis.
    pub score: f64,
}

impl LocalFeature {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_len(writer, self.patch_index)?;
        write_len(writer, self.subspace_index)?;
        write_len(writer, self.axis_index)?;
        write_f64(writer, self.score)
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(LocalFeature {
            patch_index: read_len(reader, "patch index")?,
            subspace_index: read_len(reader, "subspace index")?,
            axis_index: read_len(reader, "axis index")?,
            score: read_f64(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalSubspace {
    descriptors: Vec<LocalDescriptor>,
    subspaces: Vec<Subspace>,
    features: Vec<LocalFeature>,
}

impl LocalSubspace {
    /// Fails with [`SubspaceError::Format`] when a feature points at a patch,
    /// subspace or axis that does not exist.
    pub fn new(
        descriptors: Vec<LocalDescriptor>,
        subspaces: Vec<Subspace>,
        features: Vec<LocalFeature>,
    ) -> Result<Self> {
        for (i, feature) in features.iter().enumerate() {
            if feature.patch_index >= descriptors.len() {
                return Err(SubspaceError::Format(format!(
                    "feature {} refers to patch {} of {}",
                    i,
                    feature.patch_index,
                    descriptors.len()
                )));
            }
            let subspace = subspaces.get(feature.subspace_index).ok_or_else(|| {
                SubspaceError::Format(format!(
                    "feature {} refers to subspace {} of {}",
                    i,
                    feature.subspace_index,
                    subspaces.len()
                ))
            })?;
            if feature.axis_index >= subspace.subspace_dim() {
                return Err(SubspaceError::Format(format!(
                    "feature {} refers to axis {} of {}",
                    i,
                    feature.axis_index,
                    subspace.subspace_dim()
                )));
            }
        }
        Ok(LocalSubspace {
            descriptors,
            subspaces,
            features,
        })
    }

    pub fn descriptors(&self) -> &[LocalDescriptor] {
        &self.descriptors
    }

    pub fn subspaces(&self) -> &[Subspace] {
        &self.subspaces
    }

    pub fn features(&self) -> &[LocalFeature] {
        &self.features
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Grayscale map of how often each pixel is covered by the patches of the
    /// first `count` ranked features (all of them when `count` is zero). The
    /// most used pixel is white.
    pub fn coverage_image(&self, width: usize, height: usize, count: usize) -> GrayImage {
        let count = if count == 0 {
            self.features.len()
        } else {
            count.min(self.features.len())
        };

        let mut hits = vec![0u64; width * height];
        for feature in &self.features[..count] {
            for &index in self.descriptors[feature.patch_index].indices() {
                if let Some(hit) = hits.get_mut(index) {
                    *hit += 1;
                }
            }
        }

        let max = hits.iter().copied().max().unwrap_or(0);
        let pixels = hits
            .iter()
            .map(|&h| if max == 0 { 0 } else { (h * 255 / max) as u8 })
            .collect();
        GrayImage {
            width,
            height,
            pixels,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_len(writer, self.descriptors.len())?;
        write_len(writer, self.subspaces.len())?;
        write_len(writer, self.features.len())?;
        for descriptor in &self.descriptors {
            descriptor.write_to(writer)?;
        }
        for subspace in &self.subspaces {
            subspace.write_to(writer)?;
        }
        for feature in &self.features {
            feature.write_to(writer)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<LocalSubspace> {
        let num_descriptors = read_len(reader, "descriptor count")?;
        let num_subspaces = read_len(reader, "subspace count")?;
        let num_features = read_len(reader, "feature count")?;

        let descriptors = (0..num_descriptors)
            .map(|_| LocalDescriptor::read_from(reader))
            .collect::<Result<Vec<_>>>()?;
        let subspaces = (0..num_subspaces)
            .map(|_| Subspace::read_from(reader))
            .collect::<Result<Vec<_>>>()?;
        let features = (0..num_features)
            .map(|_| LocalFeature::read_from(reader))
            .collect::<Result<Vec<_>>>()?;

        LocalSubspace::new(descriptors, subspaces, features)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SubspaceError::file(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<LocalSubspace> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SubspaceError::file(path, e))?;
        LocalSubspace::read_from(&mut BufReader::new(file))
    }
}

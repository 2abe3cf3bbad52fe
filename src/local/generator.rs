use log::{error, warn};

use crate::error::{Result, SubspaceError};
use crate::local::{LocalDescriptor, LocalFeature, LocalSubspace};
use crate::sample::SampleSet;
use crate::subspace::{Subspace, SubspaceGenerator};
use crate::utils::progress;

/// Trains one subspace per image patch with an inner generator and ranks all
/// their axes into a single feature list.
#[derive(Debug, Clone)]
pub struct LocalSubspaceGenerator<G> {
    generator: G,
    width: usize,
    height: usize,
    patch_size: usize,
    patch_stride: usize,
    max_features: usize,
    verbose: bool,
}

impl<G: SubspaceGenerator> LocalSubspaceGenerator<G> {
    pub fn builder(generator: G) -> LocalSubspaceGeneratorBuilder<G> {
        LocalSubspaceGeneratorBuilder::new(generator)
    }

    /// Patch grid starting at the upper-left corner, row by row. Patches on
    /// the border are clipped to the image.
    pub fn descriptors(&self) -> Vec<LocalDescriptor> {
        let steps_x = (self.width - self.patch_size) / self.patch_stride + 1;
        let steps_y = (self.height - self.patch_size) / self.patch_stride + 1;

        let mut descriptors = Vec::with_capacity(steps_x * steps_y);
        for i in 0..steps_y {
            for j in 0..steps_x {
                descriptors.push(LocalDescriptor::square_patch(
                    self.width,
                    self.height,
                    self.patch_size,
                    j * self.patch_stride,
                    i * self.patch_stride,
                ));
            }
        }
        descriptors
    }

    pub fn generate(&self, samples: &SampleSet) -> Result<LocalSubspace> {
        if samples.is_empty() {
            return Err(SubspaceError::EmptyInput(
                "local subspace needs at least one sample".into(),
            ));
        }
        let dim = samples.dim()?;
        if dim != self.width * self.height {
            warn!(
                "Samples have {} features but the image is {}x{}",
                dim, self.width, self.height
            );
        }

        let descriptors = self.descriptors();
        let mut subspaces = Vec::with_capacity(descriptors.len());
        for (i, descriptor) in descriptors.iter().enumerate() {
            progress(
                self.verbose,
                &format!(
                    "Generating local subspace {} of {}...",
                    i + 1,
                    descriptors.len()
                ),
            );
            let local_set: SampleSet = samples
                .iter()
                .map(|s| descriptor.extract_sample(s))
                .collect();
            let subspace = self.generator.generate(&local_set).map_err(|e| {
                if self.verbose {
                    error!("Local subspace {} failed: {}", i, e);
                }
                e
            })?;
            subspaces.push(subspace);
        }

        progress(self.verbose, "Merging local subspaces...");
        let features = self.merge(&subspaces);
        LocalSubspace::new(descriptors, subspaces, features)
    }

    /// Every axis of every patch subspace, ordered by descending score and
    /// cut to `max_features`. Equal scores keep patch and axis order.
    fn merge(&self, subspaces: &[Subspace]) -> Vec<LocalFeature> {
        let mut features: Vec<LocalFeature> = subspaces
            .iter()
            .enumerate()
            .flat_map(|(i, subspace)| {
                subspace
                    .criterion()
                    .iter()
                    .enumerate()
                    .map(move |(j, c)| LocalFeature {
                        patch_index: i,
                        subspace_index: i,
                        axis_index: j,
                        score: c.abs(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        features.sort_by(|a, b| b.score.total_cmp(&a.score));
        if self.max_features > 0 {
            features.truncate(self.max_features);
        }
        features
    }
}

/// Builder for [`LocalSubspaceGenerator`].
///
/// # Example
/// ```
/// use single_subspace::local::LocalSubspaceGenerator;
/// use single_subspace::subspace::PcaSubspaceGenerator;
///
/// let generator = LocalSubspaceGenerator::builder(PcaSubspaceGenerator::new())
///     .image_size(32, 32)
///     .patch_size(8)
///     .patch_stride(4)
///     .max_features(100)
///     .build()
///     .unwrap();
/// assert_eq!(generator.descriptors().len(), 49);
/// ```
#[derive(Debug, Clone)]
pub struct LocalSubspaceGeneratorBuilder<G> {
    generator: G,
    width: usize,
    height: usize,
    patch_size: usize,
    patch_stride: usize,
    max_features: usize,
    verbose: bool,
}

impl<G: SubspaceGenerator> LocalSubspaceGeneratorBuilder<G> {
    pub fn new(generator: G) -> Self {
        LocalSubspaceGeneratorBuilder {
            generator,
            width: 0,
            height: 0,
            patch_size: 0,
            patch_stride: 1,
            max_features: 0,
            verbose: false,
        }
    }

    pub fn image_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn patch_size(mut self, patch_size: usize) -> Self {
        self.patch_size = patch_size;
        self
    }

    pub fn patch_stride(mut self, patch_stride: usize) -> Self {
        self.patch_stride = patch_stride;
        self
    }

    /// Upper bound on the number of ranked features kept: the merged list
    /// never grows past it. Zero leaves the list uncapped, keeping every axis
    /// of every patch.
    pub fn max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<LocalSubspaceGenerator<G>> {
        if self.width == 0 || self.height == 0 {
            return Err(SubspaceError::InvalidArgument(format!(
                "image size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.patch_size == 0 || self.patch_size > self.width.min(self.height) {
            return Err(SubspaceError::InvalidArgument(format!(
                "patch size {} does not fit a {}x{} image",
                self.patch_size, self.width, self.height
            )));
        }
        if self.patch_stride == 0 {
            return Err(SubspaceError::InvalidArgument(
                "patch stride must be at least 1".into(),
            ));
        }
        Ok(LocalSubspaceGenerator {
            generator: self.generator,
            width: self.width,
            height: self.height,
            patch_size: self.patch_size,
            patch_stride: self.patch_stride,
            max_features: self.max_features,
            verbose: self.verbose,
        })
    }
}

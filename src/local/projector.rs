use ndarray::Array1;

use crate::error::{Result, SubspaceError};
use crate::local::LocalSubspace;
use crate::sample::{Sample, SampleSet};

/// Computes the ranked local features of a sample.
#[derive(Debug, Clone, Copy)]
pub struct LocalSubspaceProjector<'a> {
    subspace: &'a LocalSubspace,
}

impl<'a> LocalSubspaceProjector<'a> {
    pub fn new(subspace: &'a LocalSubspace) -> Self {
        LocalSubspaceProjector { subspace }
    }

    /// Output feature `i` is the projection of the sample's patch for ranked
    /// feature `i` onto that feature's axis, after subtracting the patch
    /// subspace's center. `dim == 0` uses every ranked feature.
    pub fn project(&self, sample: &Sample, dim: usize) -> Result<Sample> {
        let available = self.subspace.num_features();
        let dim = match dim {
            0 => available,
            d if d <= available => d,
            d => {
                return Err(SubspaceError::InvalidArgument(format!(
                    "cannot project onto {} local features, {} are available",
                    d, available
                )))
            }
        };

        // Each patch is gathered at most once.
        let mut patches: Vec<Option<Array1<f64>>> = vec![None; self.subspace.descriptors().len()];
        let mut features = Array1::zeros(dim);
        for (i, feature) in self.subspace.features()[..dim].iter().enumerate() {
            let subspace = &self.subspace.subspaces()[feature.subspace_index];
            let local = patches[feature.patch_index].get_or_insert_with(|| {
                self.subspace.descriptors()[feature.patch_index].extract(sample.features())
            });
            if local.len() != subspace.original_dim() {
                return Err(SubspaceError::ShapeMismatch {
                    op: "Local projection",
                    left: (subspace.subspace_dim(), subspace.original_dim()),
                    right: (local.len(), 1),
                });
            }
            features[i] = (&*local - &subspace.center()).dot(&subspace.axis(feature.axis_index));
        }

        Ok(Sample::new(features, sample.label()).with_source(sample.source()))
    }

    pub fn project_set(&self, samples: &SampleSet, dim: usize) -> Result<SampleSet> {
        samples.iter().map(|s| self.project(s, dim)).collect()
    }
}

use ndarray::s;

use crate::error::{Result, SubspaceError};
use crate::sample::{Sample, SampleSet};
use crate::subspace::Subspace;

/// Maps samples onto the leading axes of a [`Subspace`].
#[derive(Debug, Clone, Copy)]
pub struct SubspaceProjector<'a> {
    subspace: &'a Subspace,
}

impl<'a> SubspaceProjector<'a> {
    pub fn new(subspace: &'a Subspace) -> Self {
        SubspaceProjector { subspace }
    }

    pub fn subspace(&self) -> &'a Subspace {
        self.subspace
    }

    fn resolve_dim(&self, dim: usize) -> Result<usize> {
        let available = self.subspace.subspace_dim();
        match dim {
            0 => Ok(available),
            d if d <= available => Ok(d),
            d => Err(SubspaceError::InvalidArgument(format!(
                "cannot project onto {} axes, the subspace has {}",
                d, available
            ))),
        }
    }

    /// Feature `i` of the result is `(sample - center) · axis_i` for the
    /// first `dim` axes, or all of them when `dim` is zero. Label and source
    /// are carried over.
    pub fn project(&self, sample: &Sample, dim: usize) -> Result<Sample> {
        let dim = self.resolve_dim(dim)?;
        if sample.len() != self.subspace.original_dim() {
            return Err(SubspaceError::ShapeMismatch {
                op: "Projection",
                left: (self.subspace.subspace_dim(), self.subspace.original_dim()),
                right: (sample.len(), 1),
            });
        }

        let centered = &sample.features() - &self.subspace.center();
        let features = self
            .subspace
            .axes()
            .slice(s![..dim, ..])
            .dot(&centered);

        Ok(Sample::new(features, sample.label()).with_source(sample.source()))
    }

    pub fn project_set(&self, samples: &SampleSet, dim: usize) -> Result<SampleSet> {
        samples.iter().map(|s| self.project(s, dim)).collect()
    }
}

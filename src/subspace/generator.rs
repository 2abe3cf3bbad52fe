use log::{error, warn};
use ndarray::{s, Array1};

use crate::dense::DenseMatrix;
use crate::eigen::{eigen, generalized_eigen, EigenError, GeneralizedStrategy};
use crate::error::{Result, SubspaceError};
use crate::sample::SampleSet;
use crate::subspace::{Subspace, SubspaceKind, SubspaceProjector};
use crate::utils::progress;

/// Learns a [`Subspace`] from a labelled sample set.
///
/// Implemented by [`PcaSubspaceGenerator`] and [`LdaSubspaceGenerator`];
/// the local generator takes any implementor as its per-patch trainer.
pub trait SubspaceGenerator {
    fn generate(&self, samples: &SampleSet) -> Result<Subspace>;
}

impl<G: SubspaceGenerator + ?Sized> SubspaceGenerator for &G {
    fn generate(&self, samples: &SampleSet) -> Result<Subspace> {
        (**self).generate(samples)
    }
}

impl<G: SubspaceGenerator + ?Sized> SubspaceGenerator for Box<G> {
    fn generate(&self, samples: &SampleSet) -> Result<Subspace> {
        (**self).generate(samples)
    }
}

fn eigen_failure(verbose: bool, err: EigenError) -> SubspaceError {
    if verbose {
        error!("Error computing eigenvectors: {}", err);
    }
    SubspaceError::Eigen(err)
}

/// Principal component analysis.
///
/// With `n` dimensions and `N` samples the `n × n` covariance matrix is
/// decomposed when `n <= N`. Otherwise the `N × N` Gram matrix of the
/// centered samples is decomposed and its eigenvectors are mapped back into
/// the original space, giving `N` axes.
#[derive(Debug, Clone, Default)]
pub struct PcaSubspaceGenerator {
    verbose: bool,
}

impl PcaSubspaceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PcaSubspaceGeneratorBuilder {
        PcaSubspaceGeneratorBuilder::new()
    }
}

impl SubspaceGenerator for PcaSubspaceGenerator {
    fn generate(&self, samples: &SampleSet) -> Result<Subspace> {
        if samples.is_empty() {
            return Err(SubspaceError::EmptyInput(
                "PCA needs at least one sample".into(),
            ));
        }
        let n = samples.dim()?;
        let count = samples.len();

        let center = samples.mean()?;
        let mut x = samples.as_matrix()?;
        for mut column in x.view_mut().columns_mut() {
            column -= &center;
        }
        let xt = x.transpose();

        let (axes, values) = if n > count {
            progress(self.verbose, "Computing covariance matrix...");
            let mut gram = xt.multiply(&x)?;
            gram.scale(1.0 / count as f64);

            progress(self.verbose, "Computing eigenvectors...");
            let eig = eigen(gram).map_err(|e| eigen_failure(self.verbose, e))?;

            progress(self.verbose, "Computing actual eigenvectors...");
            (eig.vectors.multiply(&xt)?, eig.values)
        } else {
            progress(self.verbose, "Computing covariance matrix...");
            let mut covariance = x.multiply(&xt)?;
            covariance.scale(1.0 / count as f64);

            progress(self.verbose, "Computing eigenvectors...");
            let eig = eigen(covariance).map_err(|e| eigen_failure(self.verbose, e))?;
            (eig.vectors, eig.values)
        };

        let mut subspace = Subspace::new(SubspaceKind::Pca, center, axes.into_array(), values)?;
        subspace.normalize();
        subspace.reorder_abs_descending();
        Ok(subspace)
    }
}

/// Builder for [`PcaSubspaceGenerator`].
#[derive(Debug, Clone, Default)]
pub struct PcaSubspaceGeneratorBuilder {
    verbose: bool,
}

impl PcaSubspaceGeneratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> PcaSubspaceGenerator {
        PcaSubspaceGenerator {
            verbose: self.verbose,
        }
    }
}

/// Linear discriminant analysis, solving `B x = λ W x` for the between-class
/// scatter `B` and the within-class scatter `W`.
///
/// With `N` samples in `Nc` classes the problem is solved directly in the
/// original space when no PCA dimension is configured and the dimension does
/// not exceed `N - Nc`. Otherwise the samples are first reduced with PCA to
/// `pca_dim` dimensions (`N - Nc` when zero), LDA is run there and the two
/// bases are composed. The composed subspace keeps the PCA center.
#[derive(Debug, Clone, Default)]
pub struct LdaSubspaceGenerator {
    pca_dim: usize,
    verbose: bool,
}

impl LdaSubspaceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> LdaSubspaceGeneratorBuilder {
        LdaSubspaceGeneratorBuilder::new()
    }

    pub fn pca_dim(&self) -> usize {
        self.pca_dim
    }

    fn direct(&self, samples: &SampleSet, n: usize) -> Result<Subspace> {
        let center = samples.mean()?;

        progress(self.verbose, "Getting between class variance matrix...");
        let b = samples.between_class_scatter()?;
        progress(self.verbose, "Getting within class variance matrix...");
        let w = samples.within_class_scatter()?;

        progress(self.verbose, "Computing generalized eigenvectors...");
        let eig = generalized_eigen(b, w, GeneralizedStrategy::Cholesky)
            .map_err(|e| eigen_failure(self.verbose, e))?;
        debug_assert_eq!(eig.vectors.shape(), (n, n));

        Subspace::new(SubspaceKind::Lda, center, eig.vectors.into_array(), eig.values)
    }

    fn two_stage(&self, samples: &SampleSet, n: usize, dof: usize) -> Result<Subspace> {
        let mut npca = if self.pca_dim == 0 { dof } else { self.pca_dim };
        if npca == 0 {
            return Err(SubspaceError::EmptyInput(format!(
                "{} samples in {} classes leave no dimensions for LDA",
                samples.len(),
                samples.number_of_classes()
            )));
        }

        progress(self.verbose, "Performing PCA...");
        let pca = PcaSubspaceGenerator::builder()
            .verbose(self.verbose)
            .build()
            .generate(samples)?;
        if npca > pca.subspace_dim() {
            warn!(
                "PCA dimension {} exceeds the {} available axes, using {}",
                npca,
                pca.subspace_dim(),
                pca.subspace_dim()
            );
            npca = pca.subspace_dim();
        }

        progress(
            self.verbose,
            "Projecting samples into low-dimensional subspace...",
        );
        let reduced = SubspaceProjector::new(&pca).project_set(samples, npca)?;

        progress(self.verbose, "Getting between class variance matrix...");
        let b = reduced.between_class_scatter()?;
        progress(self.verbose, "Getting within class variance matrix...");
        let w = reduced.within_class_scatter()?;

        progress(self.verbose, "Computing generalized eigenvectors...");
        let eig = generalized_eigen(b, w, GeneralizedStrategy::Cholesky)
            .map_err(|e| eigen_failure(self.verbose, e))?;

        let mut lda = Subspace::new(
            SubspaceKind::Lda,
            Array1::zeros(npca),
            eig.vectors.into_array(),
            eig.values,
        )?;
        lda.reorder_abs_descending();

        progress(self.verbose, "Computing final subspace...");
        let pca_axes = DenseMatrix::from_array(pca.axes().slice(s![..npca, ..]).to_owned());
        let composed = lda.to_matrix().multiply(&pca_axes)?;
        debug_assert_eq!(composed.shape(), (npca, n));

        Subspace::new(
            SubspaceKind::Lda,
            pca.center().to_owned(),
            composed.into_array(),
            lda.criterion().to_owned(),
        )
    }
}

impl SubspaceGenerator for LdaSubspaceGenerator {
    fn generate(&self, samples: &SampleSet) -> Result<Subspace> {
        if samples.is_empty() {
            return Err(SubspaceError::EmptyInput(
                "LDA needs at least one sample".into(),
            ));
        }
        let n = samples.dim()?;
        let dof = samples.len().saturating_sub(samples.number_of_classes());

        let mut subspace = if self.pca_dim == 0 && n <= dof {
            self.direct(samples, n)?
        } else {
            self.two_stage(samples, n, dof)?
        };
        subspace.reorder_abs_descending();
        subspace.normalize();
        Ok(subspace)
    }
}

/// Builder for [`LdaSubspaceGenerator`].
///
/// # Example
/// ```
/// use single_subspace::subspace::LdaSubspaceGenerator;
///
/// let lda = LdaSubspaceGenerator::builder().pca_dim(20).verbose(true).build();
/// assert_eq!(lda.pca_dim(), 20);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LdaSubspaceGeneratorBuilder {
    pca_dim: usize,
    verbose: bool,
}

impl LdaSubspaceGeneratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension of the PCA reduction run before LDA. Zero picks the
    /// direct solution when possible and `N - Nc` otherwise.
    pub fn pca_dim(mut self, pca_dim: usize) -> Self {
        self.pca_dim = pca_dim;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> LdaSubspaceGenerator {
        LdaSubspaceGenerator {
            pca_dim: self.pca_dim,
            verbose: self.verbose,
        }
    }
}

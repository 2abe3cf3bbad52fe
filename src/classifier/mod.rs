//! # Nearest-neighbour classification
//!
//! [`OneNNClassifier`] assigns every probe the label of its closest gallery
//! sample. A probe that is itself a member of the gallery (the same object,
//! not merely an equal one) is never compared with itself, so passing the
//! same set as gallery and probes gives a leave-one-out evaluation.

use log::info;
use ndarray::s;

use crate::dense::DenseMatrix;
use crate::error::{Result, SubspaceError};
use crate::sample::{Sample, SampleSet};
use crate::similarity::{DistanceMeasure, DistanceMetric};

#[derive(Debug, Clone, Copy, Default)]
pub struct OneNNClassifier {
    metric: DistanceMetric,
    verbose: bool,
}

impl OneNNClassifier {
    pub fn new(metric: DistanceMetric) -> Self {
        OneNNClassifier {
            metric,
            verbose: false,
        }
    }

    /// Logs every misclassified probe during [`OneNNClassifier::evaluate`].
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Distance over the first `dim` features, or all of them when `dim` is
    /// zero.
    pub fn distance(&self, a: &Sample, b: &Sample, dim: usize) -> f64 {
        let dim = if dim == 0 { a.len() } else { dim };
        let a = a.features();
        let b = b.features();
        let a = a.slice(s![..dim.min(a.len())]);
        let b = b.slice(s![..dim.min(b.len())]);
        self.metric.distance(a, b)
    }

    fn resolve_dim(gallery: &SampleSet, dim: usize) -> Result<usize> {
        let available = gallery
            .get(0)
            .ok_or(SubspaceError::NoCandidate)?
            .len();
        if dim == 0 || dim > available {
            Ok(available)
        } else {
            Ok(dim)
        }
    }

    fn nearest<'g>(
        &self,
        probe: &Sample,
        gallery: &'g SampleSet,
        dim: usize,
    ) -> Result<&'g Sample> {
        let mut best: Option<(f64, &Sample)> = None;
        for candidate in gallery.iter() {
            if std::ptr::eq(candidate, probe) {
                continue;
            }
            let dist = self.distance(candidate, probe, dim);
            let closer = match best {
                Some((min, _)) => dist < min,
                None => !dist.is_nan(),
            };
            if closer {
                best = Some((dist, candidate));
            }
        }
        best.map(|(_, s)| s).ok_or(SubspaceError::NoCandidate)
    }

    /// Label of the gallery sample closest to `probe`. Ties go to the
    /// earlier gallery sample.
    pub fn classify<'g>(
        &self,
        probe: &Sample,
        gallery: &'g SampleSet,
        dim: usize,
    ) -> Result<&'g str> {
        let dim = Self::resolve_dim(gallery, dim)?;
        Ok(self.nearest(probe, gallery, dim)?.label())
    }

    /// Fraction of `probes` whose nearest gallery sample carries the same
    /// label.
    pub fn evaluate(&self, gallery: &SampleSet, probes: &SampleSet, dim: usize) -> Result<f64> {
        if probes.is_empty() {
            return Err(SubspaceError::EmptyInput("no samples to classify".into()));
        }
        let dim = Self::resolve_dim(gallery, dim)?;

        let mut correct = 0usize;
        for probe in probes.iter() {
            let claimed = self.nearest(probe, gallery, dim)?.label();
            if claimed == probe.label() {
                correct += 1;
            } else if self.verbose {
                info!(
                    "Incorrect classification: {} <---> {}",
                    probe.source(),
                    claimed
                );
            }
        }
        Ok(correct as f64 / probes.len() as f64)
    }

    /// `probes × gallery` matrix of pairwise distances. Nothing is excluded,
    /// so an empty gallery gives a matrix without columns.
    pub fn distance_matrix(
        &self,
        gallery: &SampleSet,
        probes: &SampleSet,
        dim: usize,
    ) -> Result<DenseMatrix> {
        if gallery.is_empty() {
            return Ok(DenseMatrix::zeros(probes.len(), 0));
        }
        let dim = Self::resolve_dim(gallery, dim)?;
        let mut matrix = DenseMatrix::zeros(probes.len(), gallery.len());
        for (i, probe) in probes.iter().enumerate() {
            for (j, candidate) in gallery.iter().enumerate() {
                matrix[(i, j)] = self.distance(candidate, probe, dim);
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn gallery() -> SampleSet {
        vec![
            Sample::new(array![0.0, 0.0], "a").with_source("a1"),
            Sample::new(array![1.0, 0.0], "a").with_source("a2"),
            Sample::new(array![0.0, 5.0], "b").with_source("b1"),
            Sample::new(array![1.0, 5.0], "b").with_source("b2"),
        ]
        .into()
    }

    #[test]
    fn test_classify() {
        let gallery = gallery();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
        let probe = Sample::new(array![0.5, 0.1], "?");
        assert_eq!(classifier.classify(&probe, &gallery, 0).unwrap(), "a");
        let probe = Sample::new(array![0.5, 4.9], "?");
        assert_eq!(classifier.classify(&probe, &gallery, 0).unwrap(), "b");
    }

    #[test]
    fn test_classify_limits_dimension() {
        let gallery = gallery();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
        // Only the first coordinate counts, which is closest to a2.
        let probe = Sample::new(array![0.9, 5.0], "?");
        assert_eq!(classifier.classify(&probe, &gallery, 1).unwrap(), "a");
        // Oversized dimensions fall back to the gallery's.
        assert_eq!(classifier.classify(&probe, &gallery, 10).unwrap(), "b");
    }

    #[test]
    fn test_self_exclusion() {
        let gallery: SampleSet = vec![
            Sample::new(array![0.0, 0.0], "a"),
            Sample::new(array![0.0, 0.0], "a"),
            Sample::new(array![3.0, 3.0], "b"),
        ]
        .into();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
        assert_eq!(classifier.classify(&gallery[0], &gallery, 0).unwrap(), "a");
        assert_eq!(classifier.classify(&gallery[2], &gallery, 0).unwrap(), "a");

        // An equal but distinct probe is compared with everything.
        let copy = gallery[2].clone();
        assert_eq!(classifier.classify(&copy, &gallery, 0).unwrap(), "b");
    }

    #[test]
    fn test_exhausted_gallery() {
        let gallery: SampleSet = vec![Sample::new(array![1.0], "a")].into();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
        assert!(matches!(
            classifier.classify(&gallery[0], &gallery, 0),
            Err(SubspaceError::NoCandidate)
        ));
        assert!(matches!(
            classifier.classify(&Sample::zeros(1), &SampleSet::new(), 0),
            Err(SubspaceError::NoCandidate)
        ));
    }

    #[test]
    fn test_leave_one_out_evaluation() {
        let gallery = gallery();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean).verbose(true);
        assert_relative_eq!(classifier.evaluate(&gallery, &gallery, 0).unwrap(), 1.0);

        let probes: SampleSet = vec![
            Sample::new(array![0.2, 0.3], "a"),
            Sample::new(array![0.2, 4.0], "a"),
        ]
        .into();
        assert_relative_eq!(classifier.evaluate(&gallery, &probes, 0).unwrap(), 0.5);
        assert!(classifier.evaluate(&gallery, &SampleSet::new(), 0).is_err());
    }

    #[test]
    fn test_distance_matrix() {
        let gallery = gallery();
        let probes: SampleSet = vec![Sample::new(array![0.0, 0.0], "a")].into();
        let classifier = OneNNClassifier::new(DistanceMetric::Euclidean);
        let matrix = classifier.distance_matrix(&gallery, &probes, 0).unwrap();
        assert_eq!(matrix.shape(), (1, 4));
        assert_eq!(matrix[(0, 0)], 0.0);
        assert_relative_eq!(matrix[(0, 3)], 26.0f64.sqrt());

        let own = classifier.distance_matrix(&gallery, &gallery, 0).unwrap();
        for i in 0..4 {
            assert_eq!(own[(i, i)], 0.0);
        }

        let none = classifier
            .distance_matrix(&SampleSet::new(), &probes, 0)
            .unwrap();
        assert_eq!(none.shape(), (1, 0));
    }

    #[test]
    fn test_sign_metric_distance() {
        let classifier = OneNNClassifier::new(DistanceMetric::SignAgreement);
        let a = Sample::new(array![1.0, -1.0, 1.0, 1.0], "a");
        let b = Sample::new(array![-1.0, -1.0, -1.0, -1.0], "b");
        assert_relative_eq!(classifier.distance(&a, &b, 0), 0.75);
        assert_relative_eq!(classifier.distance(&a, &b, 2), 0.5);
    }
}

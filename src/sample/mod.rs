//! # Samples and sample sets
//!
//! A [`Sample`] is a labelled feature vector; a [`SampleSet`] owns an ordered
//! collection of them and computes the statistics the subspace generators
//! need (means, scatter matrices, design matrix).
//!
//! All statistics assume every sample in the set has the same length and
//! report [`SubspaceError::ShapeMismatch`] otherwise.

use std::ops::{Index, IndexMut};

use ndarray::{Array1, ArrayView1};

use crate::dense::DenseMatrix;
use crate::error::{Result, SubspaceError};

pub mod io;

pub use io::{load_manifest, save_pgm, GrayImage, ImageDecoder, NetpbmDecoder, SampleType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    features: Array1<f64>,
    label: String,
    source: String,
}

impl Sample {
    pub fn new(features: Array1<f64>, label: impl Into<String>) -> Self {
        Sample {
            features,
            label: label.into(),
            source: String::new(),
        }
    }

    /// A sample of `dim` zero features with no label.
    pub fn zeros(dim: usize) -> Self {
        Sample {
            features: Array1::zeros(dim),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Discards the previous contents and resizes to `dim` zero features.
    pub fn init(&mut self, dim: usize) {
        self.features = Array1::zeros(dim);
        self.label.clear();
        self.source.clear();
    }

    pub fn set_features(&mut self, features: Array1<f64>) {
        self.features = features;
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> ArrayView1<'_, f64> {
        self.features.view()
    }

    pub fn features_mut(&mut self) -> &mut Array1<f64> {
        &mut self.features
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Where the sample came from, usually the file it was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }
}

impl Index<usize> for Sample {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.features[i]
    }
}

impl IndexMut<usize> for Sample {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.features[i]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with `count` unlabelled samples of `dim` zeros.
    pub fn init(&mut self, count: usize, dim: usize) {
        self.samples = (0..count).map(|_| Sample::zeros(dim)).collect();
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn get(&self, i: usize) -> Option<&Sample> {
        self.samples.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Sample> {
        self.samples.get_mut(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Appends deep copies of every sample in `other`.
    pub fn merge(&mut self, other: &SampleSet) {
        self.samples.extend(other.samples.iter().cloned());
    }

    /// Common feature length of the set.
    pub fn dim(&self) -> Result<usize> {
        let first = self
            .samples
            .first()
            .ok_or_else(|| SubspaceError::EmptyInput("sample set has no samples".into()))?;
        let dim = first.len();
        if let Some(odd) = self.samples.iter().find(|s| s.len() != dim) {
            return Err(SubspaceError::ShapeMismatch {
                op: "Sample set",
                left: (dim, 1),
                right: (odd.len(), 1),
            });
        }
        Ok(dim)
    }

    pub fn mean(&self) -> Result<Array1<f64>> {
        let dim = self.dim()?;
        let mut avg = Array1::zeros(dim);
        for sample in &self.samples {
            avg += &sample.features;
        }
        avg /= self.samples.len() as f64;
        Ok(avg)
    }

    /// Mean of the samples labelled `label`.
    ///
    /// Fails with [`SubspaceError::EmptyInput`] when no sample carries the
    /// label.
    pub fn mean_of_class(&self, label: &str) -> Result<Array1<f64>> {
        let dim = self.dim()?;
        let mut avg = Array1::zeros(dim);
        let mut count = 0usize;
        for sample in self.samples.iter().filter(|s| s.label == label) {
            avg += &sample.features;
            count += 1;
        }
        if count == 0 {
            return Err(SubspaceError::EmptyInput(format!(
                "no samples of class '{}'",
                label
            )));
        }
        avg /= count as f64;
        Ok(avg)
    }

    /// Distinct labels in order of first occurrence.
    pub fn class_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for sample in &self.samples {
            if !labels.contains(&sample.label.as_str()) {
                labels.push(&sample.label);
            }
        }
        labels
    }

    pub fn number_of_classes(&self) -> usize {
        self.class_labels().len()
    }

    /// Per-class `(mean, member count)` in first-occurrence order, plus the
    /// class position of every sample.
    fn class_statistics(&self) -> Result<(Vec<(Array1<f64>, usize)>, Vec<usize>)> {
        let labels = self.class_labels();
        let mut stats = Vec::with_capacity(labels.len());
        for label in &labels {
            let count = self.samples.iter().filter(|s| s.label == *label).count();
            stats.push((self.mean_of_class(label)?, count));
        }
        let membership = self
            .samples
            .iter()
            .map(|s| {
                labels
                    .iter()
                    .position(|l| *l == s.label.as_str())
                    .unwrap_or_default()
            })
            .collect();
        Ok((stats, membership))
    }

    /// Samples as the columns of an `dim × len` matrix.
    pub fn as_matrix(&self) -> Result<DenseMatrix> {
        let dim = self.dim()?;
        let mut mat = DenseMatrix::zeros(dim, self.samples.len());
        for (j, sample) in self.samples.iter().enumerate() {
            mat.view_mut().column_mut(j).assign(&sample.features);
        }
        Ok(mat)
    }

    /// `W = Σ_i (x_i - m_c(i)) (x_i - m_c(i))ᵗ`
    pub fn within_class_scatter(&self) -> Result<DenseMatrix> {
        let dim = self.dim()?;
        let (stats, membership) = self.class_statistics()?;

        let mut w = DenseMatrix::zeros(dim, dim);
        for (sample, &class) in self.samples.iter().zip(membership.iter()) {
            let diff = &sample.features - &stats[class].0;
            accumulate_outer(&mut w, diff.view(), 1.0);
        }
        mirror_upper(&mut w);
        Ok(w)
    }

    /// `B = Σ_c n_c (m_c - m) (m_c - m)ᵗ`
    pub fn between_class_scatter(&self) -> Result<DenseMatrix> {
        let dim = self.dim()?;
        let avg = self.mean()?;
        let (stats, _) = self.class_statistics()?;

        let mut b = DenseMatrix::zeros(dim, dim);
        for (class_mean, count) in &stats {
            let diff = class_mean - &avg;
            accumulate_outer(&mut b, diff.view(), *count as f64);
        }
        mirror_upper(&mut b);
        Ok(b)
    }

    /// `T = Σ_i (x_i - m) (x_i - m)ᵗ`, equal to `B + W`.
    pub fn total_scatter(&self) -> Result<DenseMatrix> {
        let dim = self.dim()?;
        let avg = self.mean()?;

        let mut t = DenseMatrix::zeros(dim, dim);
        for sample in &self.samples {
            let diff = &sample.features - &avg;
            accumulate_outer(&mut t, diff.view(), 1.0);
        }
        mirror_upper(&mut t);
        Ok(t)
    }
}

// Adds `weight * v vᵗ` into the upper triangle of `m`.
fn accumulate_outer(m: &mut DenseMatrix, v: ArrayView1<'_, f64>, weight: f64) {
    let n = v.len();
    for j in 0..n {
        let wj = weight * v[j];
        if wj == 0.0 {
            continue;
        }
        for k in j..n {
            m[(j, k)] += wj * v[k];
        }
    }
}

fn mirror_upper(m: &mut DenseMatrix) {
    let n = m.nrows();
    for j in 0..n {
        for k in 0..j {
            m[(j, k)] = m[(k, j)];
        }
    }
}

impl Index<usize> for SampleSet {
    type Output = Sample;

    fn index(&self, i: usize) -> &Sample {
        &self.samples[i]
    }
}

impl IndexMut<usize> for SampleSet {
    fn index_mut(&mut self, i: usize) -> &mut Sample {
        &mut self.samples[i]
    }
}

impl From<Vec<Sample>> for SampleSet {
    fn from(samples: Vec<Sample>) -> Self {
        SampleSet { samples }
    }
}

impl FromIterator<Sample> for SampleSet {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        SampleSet {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn labelled(values: &[f64], label: &str) -> Sample {
        Sample::new(Array1::from(values.to_vec()), label)
    }

    fn three_class_set() -> SampleSet {
        SampleSet::from(vec![
            labelled(&[1.0, 2.0, 0.5], "a"),
            labelled(&[2.0, 1.0, 1.5], "b"),
            labelled(&[1.5, 2.5, 0.0], "a"),
            labelled(&[4.0, 0.0, 2.0], "c"),
            labelled(&[2.5, 1.5, 1.0], "b"),
            labelled(&[0.5, 3.0, 0.5], "a"),
        ])
    }

    #[test]
    fn test_means() {
        let set = three_class_set();
        let avg = set.mean().unwrap();
        assert_abs_diff_eq!(avg[0], 11.5 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(avg[1], 10.0 / 6.0, epsilon = 1e-12);

        let a = set.mean_of_class("a").unwrap();
        assert_abs_diff_eq!(a[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a[1], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(a[2], 1.0 / 3.0, epsilon = 1e-12);

        assert!(matches!(
            set.mean_of_class("z"),
            Err(SubspaceError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_empty_set() {
        let set = SampleSet::new();
        assert!(matches!(set.mean(), Err(SubspaceError::EmptyInput(_))));
        assert_eq!(set.number_of_classes(), 0);
    }

    #[test]
    fn test_ragged_set() {
        let set = SampleSet::from(vec![labelled(&[1.0, 2.0], "a"), labelled(&[1.0], "b")]);
        assert!(matches!(
            set.within_class_scatter(),
            Err(SubspaceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_class_labels_first_occurrence() {
        let set = three_class_set();
        assert_eq!(set.class_labels(), vec!["a", "b", "c"]);
        assert_eq!(set.number_of_classes(), 3);
    }

    #[test]
    fn test_as_matrix_columns_are_samples() {
        let set = three_class_set();
        let m = set.as_matrix().unwrap();
        assert_eq!(m.shape(), (3, 6));
        assert_eq!(m[(0, 3)], 4.0);
        assert_eq!(m[(2, 1)], 1.5);
    }

    #[test]
    fn test_scatter_decomposition() {
        let set = three_class_set();
        let w = set.within_class_scatter().unwrap();
        let b = set.between_class_scatter().unwrap();
        let t = set.total_scatter().unwrap();
        let sum = w.add(&b).unwrap();
        for j in 0..3 {
            for k in 0..3 {
                assert_abs_diff_eq!(sum[(j, k)], t[(j, k)], epsilon = 1e-10);
                assert_eq!(w[(j, k)], w[(k, j)]);
                assert_eq!(b[(j, k)], b[(k, j)]);
            }
        }
    }

    #[test]
    fn test_within_class_scatter_values() {
        let set = SampleSet::from(vec![
            labelled(&[0.0, 0.0], "a"),
            labelled(&[2.0, 0.0], "a"),
            labelled(&[0.0, 4.0], "b"),
            labelled(&[0.0, 6.0], "b"),
        ]);
        let w = set.within_class_scatter().unwrap();
        assert_eq!(w.into_array(), array![[2.0, 0.0], [0.0, 2.0]]);

        let b = set.between_class_scatter().unwrap();
        // class means (1,0) and (0,5), global mean (0.5, 2.5)
        assert_abs_diff_eq!(b[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[(1, 1)], 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[(0, 1)], -5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_init_and_merge() {
        let mut set = SampleSet::new();
        set.init(3, 4);
        assert_eq!(set.len(), 3);
        assert_eq!(set[2].len(), 4);

        let other = three_class_set();
        set.merge(&other);
        assert_eq!(set.len(), 9);
        assert_eq!(set[3].label(), "a");
        assert_eq!(other.len(), 6);
    }
}

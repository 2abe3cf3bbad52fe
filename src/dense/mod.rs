//! # Dense matrices
//!
//! A small row-major matrix type on top of [`ndarray::Array2`] with the exact
//! binary persistence format used by every artifact in this crate:
//! `[i64 rows][i64 cols][rows*cols f64, row-major]`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::{Index, IndexMut};
use std::path::Path;

use log::error;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2};

use crate::error::{Result, SubspaceError};
use crate::utils::{checked_len, read_f64_vec, read_len, write_f64_iter, write_len};

/// Shared dimension from which [`DenseMatrix::multiply`] switches to the
/// transposed right-operand loop.
pub const TRANSPOSED_MULTIPLY_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DenseMatrix {
    data: Array2<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        DenseMatrix {
            data: Array2::zeros((rows, cols)),
        }
    }

    pub fn from_array(data: Array2<f64>) -> Self {
        DenseMatrix { data }
    }

    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(SubspaceError::ShapeMismatch {
                op: "Matrix construction",
                left: (rows, cols),
                right: (values.len(), 1),
            });
        }
        let data = Array2::from_shape_vec((rows, cols), values.to_vec())
            .map_err(|e| SubspaceError::InvalidArgument(e.to_string()))?;
        Ok(DenseMatrix { data })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    /// Elements in row-major order.
    pub fn to_row_major_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Matrix product `self * rhs`.
    ///
    /// For a shared dimension of at least [`TRANSPOSED_MULTIPLY_THRESHOLD`]
    /// the right operand is transposed first so both inner loops walk
    /// contiguous rows. Both paths accumulate in the same order and give
    /// bit-identical results.
    pub fn multiply(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.ncols() != rhs.nrows() {
            error!("Matrix multiplication error: matrix dimensions don't match.");
            return Err(SubspaceError::ShapeMismatch {
                op: "Matrix multiplication",
                left: self.shape(),
                right: rhs.shape(),
            });
        }

        if self.ncols() >= TRANSPOSED_MULTIPLY_THRESHOLD {
            Ok(self.multiply_transposed(rhs))
        } else {
            Ok(self.multiply_direct(rhs))
        }
    }

    fn multiply_direct(&self, rhs: &DenseMatrix) -> DenseMatrix {
        let (m, shared) = self.shape();
        let n = rhs.ncols();
        let mut ret = Array2::zeros((m, n));
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for k in 0..shared {
                    sum += self.data[[i, k]] * rhs.data[[k, j]];
                }
                ret[[i, j]] = sum;
            }
        }
        DenseMatrix { data: ret }
    }

    fn multiply_transposed(&self, rhs: &DenseMatrix) -> DenseMatrix {
        let rhs_t = rhs.transpose();
        let m = self.nrows();
        let n = rhs.ncols();
        let mut ret = Array2::zeros((m, n));
        for (i, row) in self.data.rows().into_iter().enumerate() {
            for (j, col) in rhs_t.data.rows().into_iter().enumerate() {
                let mut sum = 0.0;
                for (a, b) in row.iter().zip(col.iter()) {
                    sum += a * b;
                }
                ret[[i, j]] = sum;
            }
        }
        DenseMatrix { data: ret }
    }

    pub fn add(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.shape() != rhs.shape() {
            error!("Matrix addition error: matrix dimensions don't match.");
            return Err(SubspaceError::ShapeMismatch {
                op: "Matrix addition",
                left: self.shape(),
                right: rhs.shape(),
            });
        }
        Ok(DenseMatrix {
            data: &self.data + &rhs.data,
        })
    }

    /// Returns an owned, row-major transpose.
    pub fn transpose(&self) -> DenseMatrix {
        DenseMatrix {
            data: self.data.t().as_standard_layout().into_owned(),
        }
    }

    pub fn scale(&mut self, scalar: f64) {
        self.data.mapv_inplace(|v| v * scalar);
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_len(writer, self.nrows())?;
        write_len(writer, self.ncols())?;
        write_f64_iter(writer, self.data.iter())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<DenseMatrix> {
        let rows = read_len(reader, "row count")?;
        let cols = read_len(reader, "column count")?;
        let values = read_f64_vec(reader, checked_len(rows, cols, "matrix size")?)?;
        DenseMatrix::from_row_slice(rows, cols, &values)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SubspaceError::file(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<DenseMatrix> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SubspaceError::file(path, e))?;
        DenseMatrix::read_from(&mut BufReader::new(file))
    }
}

impl From<Array2<f64>> for DenseMatrix {
    fn from(data: Array2<f64>) -> Self {
        DenseMatrix::from_array(data)
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[[i, j]]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[[i, j]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> DenseMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let values: Vec<f64> = (0..rows * cols)
            .map(|_| rng.random_range(-10.0..10.0))
            .collect();
        DenseMatrix::from_row_slice(rows, cols, &values).unwrap()
    }

    #[test]
    fn test_small_multiply() {
        let a = DenseMatrix::from(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let b = DenseMatrix::from(array![[1.0, 0.0, 2.0], [0.0, 1.0, -1.0]]);
        let c = a.multiply(&b).unwrap();
        assert_eq!(c.shape(), (3, 3));
        assert_eq!(
            c.into_array(),
            array![[1.0, 2.0, 0.0], [3.0, 4.0, 2.0], [5.0, 6.0, 4.0]]
        );
    }

    #[test]
    fn test_multiply_paths_agree_exactly() {
        let a = random_matrix(7, 150, 42);
        let b = random_matrix(150, 5, 43);
        let transposed = a.multiply(&b).unwrap();
        let direct = a.multiply_direct(&b);
        assert_eq!(transposed, direct);
    }

    #[test]
    fn test_multiply_matches_ndarray_dot() {
        let a = random_matrix(4, 120, 1);
        let b = random_matrix(120, 3, 2);
        let c = a.multiply(&b).unwrap();
        let expected = a.as_array().dot(b.as_array());
        for i in 0..4 {
            for j in 0..3 {
                assert_relative_eq!(c[(i, j)], expected[[i, j]], max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let a = DenseMatrix::zeros(2, 3);
        let b = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            a.multiply(&b),
            Err(SubspaceError::ShapeMismatch { .. })
        ));
        assert!(a.add(&b).is_ok());
        assert!(matches!(
            a.add(&DenseMatrix::zeros(3, 2)),
            Err(SubspaceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_transpose_and_scale() {
        let mut a = DenseMatrix::from(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(2, 1)], 6.0);
        assert_eq!(t.to_row_major_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        a.scale(0.5);
        assert_eq!(a[(1, 2)], 3.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.dat");
        let a = random_matrix(3, 4, 7);
        a.save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 16 + 12 * 8);

        let loaded = DenseMatrix::load(&path).unwrap();
        assert_eq!(loaded, a);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DenseMatrix::load(dir.path().join("missing.dat")).unwrap_err();
        assert!(matches!(err, SubspaceError::File { .. }));
    }

    #[test]
    fn test_oversized_header_is_an_error() {
        let mut buf = Vec::new();
        write_len(&mut buf, 1 << 62).unwrap();
        write_len(&mut buf, 4).unwrap();
        let err = DenseMatrix::read_from(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, SubspaceError::Format(_)));

        let mut buf = Vec::new();
        write_len(&mut buf, 1 << 20).unwrap();
        write_len(&mut buf, 1 << 20).unwrap();
        buf.extend_from_slice(&[0u8; 64]);
        let err = DenseMatrix::read_from(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, SubspaceError::Io(_)));
    }
}

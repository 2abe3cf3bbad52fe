//! # Eigen-decomposition
//!
//! Standard and generalized symmetric eigenproblems on [`DenseMatrix`] using
//! the `nalgebra` decompositions.
//!
//! Both solvers take their input matrices by value: the buffers are consumed
//! by the decomposition and the caller receives freshly allocated
//! eigenvectors and eigenvalues. Keep a clone if the inputs are needed later.
//!
//! Eigenvectors are returned as the ROWS of [`EigenDecomposition::vectors`],
//! ordered by ascending eigenvalue.

use nalgebra::{Cholesky, DMatrix, DVector, Schur, SymmetricEigen, LU};
use ndarray::Array1;
use thiserror::Error;

use crate::dense::DenseMatrix;

const INVERSE_ITERATIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EigenError {
    #[error("algorithm failed to converge")]
    NotConverged,
    #[error("illegal argument")]
    IllegalArgument,
    #[error("matrix B is not positive definite")]
    NotPositiveDefinite,
    #[error("QZ iteration failed")]
    QzFailed,
}

/// Solver used by [`generalized_eigen`] for `A x = λ B x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneralizedStrategy {
    /// Reduces the pencil with the Cholesky factor of `B`, which therefore
    /// has to be symmetric positive definite.
    #[default]
    Cholesky,
    /// General pencils. Only real parts of the eigenpairs are kept.
    Qz,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition {
    /// `n × n`, row `i` is the eigenvector belonging to `values[i]`.
    pub vectors: DenseMatrix,
    pub values: Array1<f64>,
}

fn max_iterations(n: usize) -> usize {
    (60 * n).max(1000)
}

fn to_nalgebra(m: DenseMatrix) -> DMatrix<f64> {
    let (rows, cols) = m.shape();
    DMatrix::from_row_slice(rows, cols, &m.to_row_major_vec())
}

fn check_square(m: &DenseMatrix) -> Result<usize, EigenError> {
    let (rows, cols) = m.shape();
    if rows != cols || m.as_array().iter().any(|v| !v.is_finite()) {
        return Err(EigenError::IllegalArgument);
    }
    Ok(rows)
}

/// Packs column eigenvectors into the row layout, sorted by ascending value.
fn into_decomposition(columns: &DMatrix<f64>, values: &[f64]) -> EigenDecomposition {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut vectors = DenseMatrix::zeros(n, columns.nrows());
    for (row, &src) in order.iter().enumerate() {
        for (j, &v) in columns.column(src).iter().enumerate() {
            vectors[(row, j)] = v;
        }
    }
    let values = order.iter().map(|&i| values[i]).collect();
    EigenDecomposition { vectors, values }
}

/// Solves `A V_i = E_i V_i` for a symmetric matrix `A`.
pub fn eigen(a: DenseMatrix) -> Result<EigenDecomposition, EigenError> {
    let n = check_square(&a)?;
    let a = to_nalgebra(a);
    let eig = SymmetricEigen::try_new(a, f64::EPSILON, max_iterations(n))
        .ok_or(EigenError::NotConverged)?;
    Ok(into_decomposition(
        &eig.eigenvectors,
        eig.eigenvalues.as_slice(),
    ))
}

/// Solves the generalized problem `A x = λ B x` for symmetric `A` and `B`.
pub fn generalized_eigen(
    a: DenseMatrix,
    b: DenseMatrix,
    strategy: GeneralizedStrategy,
) -> Result<EigenDecomposition, EigenError> {
    let n = check_square(&a)?;
    if check_square(&b)? != n {
        return Err(EigenError::IllegalArgument);
    }
    let a = to_nalgebra(a);
    let b = to_nalgebra(b);
    match strategy {
        GeneralizedStrategy::Cholesky => cholesky_reduction(a, b, n),
        GeneralizedStrategy::Qz => schur_reduction(a, b, n),
    }
}

// B = L Lᵗ turns the pencil into the standard problem (L⁻¹ A L⁻ᵗ) y = λ y
// with x = L⁻ᵗ y.
fn cholesky_reduction(
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    n: usize,
) -> Result<EigenDecomposition, EigenError> {
    let l = Cholesky::new(b)
        .ok_or(EigenError::NotPositiveDefinite)?
        .unpack();

    let l_inv_a = l
        .solve_lower_triangular(&a)
        .ok_or(EigenError::NotPositiveDefinite)?;
    let c = l
        .solve_lower_triangular(&l_inv_a.transpose())
        .ok_or(EigenError::NotPositiveDefinite)?;
    let c = (&c + c.transpose()) * 0.5;

    let eig = SymmetricEigen::try_new(c, f64::EPSILON, max_iterations(n))
        .ok_or(EigenError::NotConverged)?;
    let x = l
        .transpose()
        .solve_upper_triangular(&eig.eigenvectors)
        .ok_or(EigenError::NotPositiveDefinite)?;

    Ok(into_decomposition(&x, eig.eigenvalues.as_slice()))
}

// Real Schur iteration on B⁻¹A. A singular B is handled through A⁻¹B, whose
// zero eigenvalues correspond to infinite ones of the pencil and are reported
// as 0.
fn schur_reduction(
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    n: usize,
) -> Result<EigenDecomposition, EigenError> {
    let (operator, reciprocal) = match LU::new(b.clone()).solve(&a) {
        Some(b_inv_a) => (b_inv_a, false),
        None => match LU::new(a).solve(&b) {
            Some(a_inv_b) => (a_inv_b, true),
            None => return Err(EigenError::IllegalArgument),
        },
    };
    if operator.iter().any(|v| !v.is_finite()) {
        return Err(EigenError::QzFailed);
    }

    let schur = Schur::try_new(operator.clone(), f64::EPSILON, max_iterations(n))
        .ok_or(EigenError::QzFailed)?;
    let shifts: Vec<f64> = schur.complex_eigenvalues().iter().map(|mu| mu.re).collect();

    let mut columns = DMatrix::zeros(n, n);
    let mut values = Vec::with_capacity(n);
    for (i, &shift) in shifts.iter().enumerate() {
        let vector = inverse_iteration(&operator, shift);
        columns.set_column(i, &vector);
        let value = if reciprocal {
            if shift != 0.0 {
                1.0 / shift
            } else {
                0.0
            }
        } else {
            shift
        };
        values.push(value);
    }

    Ok(into_decomposition(&columns, &values))
}

// Eigenvector of `operator` for an eigenvalue close to `shift`.
fn inverse_iteration(operator: &DMatrix<f64>, shift: f64) -> DVector<f64> {
    let n = operator.nrows();
    let mut x = DVector::from_fn(n, |i, _| 1.0 + i as f64 / n as f64);
    x /= x.norm();

    let mut delta = operator.amax().max(1.0) * 1e-10;
    let mut lu = LU::new(operator - DMatrix::identity(n, n) * (shift + delta));
    let mut done = 0;
    let mut attempts = 0;
    while done < INVERSE_ITERATIONS && attempts < 4 * INVERSE_ITERATIONS {
        attempts += 1;
        match lu.solve(&x) {
            Some(y) if y.iter().all(|v| v.is_finite()) && y.norm() > 0.0 => {
                x = &y / y.norm();
                done += 1;
            }
            _ => {
                delta *= 10.0;
                lu = LU::new(operator - DMatrix::identity(n, n) * (shift + delta));
            }
        }
    }
    x
}

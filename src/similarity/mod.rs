//! Distances between feature vectors, as used by the nearest-neighbour
//! classifier. Only the coordinates both vectors have are compared.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use num_traits::{Float, ToPrimitive};

use crate::error::SubspaceError;

pub trait DistanceMeasure {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive;
}

fn to_f64<T: ToPrimitive>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// L2 norm of `a - b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl DistanceMeasure for Euclidean {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut squared_dist = T::zero();
        for (&x, &y) in a.iter().zip(b.iter()) {
            let diff = y - x;
            squared_dist = squared_dist + diff * diff;
        }
        to_f64(squared_dist.sqrt())
    }
}

/// `1 - cos(a, b)`, in `[0, 2]`. A zero vector is treated as orthogonal to
/// everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineComplement;

impl DistanceMeasure for CosineComplement {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut dot_product = T::zero();
        let mut norm_a = T::zero();
        let mut norm_b = T::zero();

        for (&x, &y) in a.iter().zip(b.iter()) {
            dot_product = dot_product + x * y;
            norm_a = norm_a + x * x;
            norm_b = norm_b + y * y;
        }

        let norm_product = norm_a.sqrt() * norm_b.sqrt();
        if norm_product > T::epsilon() {
            (1.0 - to_f64(dot_product / norm_product)).clamp(0.0, 2.0)
        } else {
            1.0
        }
    }
}

/// Fraction of coordinates where `a` and `b` have strictly opposite signs.
/// Zeros agree with everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignAgreement;

impl DistanceMeasure for SignAgreement {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let zero = T::zero();
        let mut n = 0usize;
        let mut opposite = 0usize;
        for (&x, &y) in a.iter().zip(b.iter()) {
            n += 1;
            if (x < zero && y > zero) || (x > zero && y < zero) {
                opposite += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            opposite as f64 / n as f64
        }
    }
}

/// Runtime choice between the bundled measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    CosineComplement,
    SignAgreement,
}

impl DistanceMeasure for DistanceMetric {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        match self {
            DistanceMetric::Euclidean => Euclidean.distance(a, b),
            DistanceMetric::CosineComplement => CosineComplement.distance(a, b),
            DistanceMetric::SignAgreement => SignAgreement.distance(a, b),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = SubspaceError;

    /// Accepts `euclid`, `nc` (normalized correlation) and `hamming`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclidean),
            "nc" | "cosine" => Ok(DistanceMetric::CosineComplement),
            "hamming" | "sign" => Ok(DistanceMetric::SignAgreement),
            other => Err(SubspaceError::InvalidArgument(format!(
                "unknown distance measure '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::Euclidean => "euclid",
            DistanceMetric::CosineComplement => "nc",
            DistanceMetric::SignAgreement => "hamming",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_euclidean() {
        let a = array![0.0, 3.0];
        let b = array![4.0, 0.0];
        assert_relative_eq!(Euclidean.distance(a.view(), b.view()), 5.0);
        assert_eq!(Euclidean.distance(a.view(), a.view()), 0.0);

        let a32 = array![1.0f32, 1.0];
        let b32 = array![1.0f32, 2.0];
        assert_relative_eq!(Euclidean.distance(a32.view(), b32.view()), 1.0);
    }

    #[test]
    fn test_cosine_complement() {
        let a = array![1.0, 0.0];
        assert_relative_eq!(
            CosineComplement.distance(a.view(), array![0.0, 2.0].view()),
            1.0
        );
        assert_relative_eq!(
            CosineComplement.distance(a.view(), array![-3.0, 0.0].view()),
            2.0
        );
        assert_relative_eq!(CosineComplement.distance(a.view(), a.view()), 0.0);
        assert_eq!(
            CosineComplement.distance(a.view(), array![0.0, 0.0].view()),
            1.0
        );
    }

    #[test]
    fn test_sign_agreement() {
        let a = array![1.0, -1.0, 0.0, 2.0];
        let b = array![-1.0, -2.0, -5.0, -1.0];
        assert_relative_eq!(SignAgreement.distance(a.view(), b.view()), 0.5);
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(SignAgreement.distance(empty.view(), empty.view()), 0.0);
    }

    #[test]
    fn test_ranges_on_random_vectors() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let a: Array1<f64> = (0..6).map(|_| rng.random_range(-1.0..1.0)).collect();
            let b: Array1<f64> = (0..6).map(|_| rng.random_range(-1.0..1.0)).collect();
            let cos = DistanceMetric::CosineComplement.distance(a.view(), b.view());
            assert!((0.0..=2.0).contains(&cos));
            let sign = DistanceMetric::SignAgreement.distance(a.view(), b.view());
            assert!((0.0..=1.0).contains(&sign));
            assert_eq!(DistanceMetric::Euclidean.distance(a.view(), a.view()), 0.0);
        }
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("euclid".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("nc".parse::<DistanceMetric>().unwrap(), DistanceMetric::CosineComplement);
        assert_eq!("hamming".parse::<DistanceMetric>().unwrap(), DistanceMetric::SignAgreement);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        assert_eq!(DistanceMetric::CosineComplement.to_string(), "nc");
    }
}

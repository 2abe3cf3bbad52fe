pub mod classifier;
pub mod dense;
pub mod eigen;
mod error;
pub mod local;
pub mod sample;
pub mod similarity;
pub mod subspace;
mod utils;

pub use classifier::OneNNClassifier;
pub use dense::DenseMatrix;
pub use error::{Result, SubspaceError};
pub use sample::{Sample, SampleSet};
pub use similarity::DistanceMetric;
pub use subspace::{Subspace, SubspaceGenerator, SubspaceKind, SubspaceProjector};

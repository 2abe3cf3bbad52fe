use std::path::PathBuf;

use thiserror::Error;

use crate::eigen::EigenError;

#[derive(Debug, Error)]
pub enum SubspaceError {
    #[error("error opening {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{op} error: dimensions don't match ({left:?} vs {right:?})")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("error computing eigenvectors: {0}")]
    Eigen(#[from] EigenError),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("no gallery sample left to compare against")]
    NoCandidate,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed data: {0}")]
    Format(String),
}

impl SubspaceError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SubspaceError::File {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubspaceError>;

use kiln_tensor::{ErrorKind, TensorError};
use thiserror::Error;

/// An error type for tensor operations.
#[derive(Error, Debug, PartialEq)]
pub enum TensorOpsError {
    /// The operation needs at least one input tensor.
    #[error("{0} expects a non-empty list of tensors")]
    EmptyInput(&'static str),

    /// Input sizes disagree outside the dimensions the operation is allowed to change.
    #[error("Shape mismatch: {message}. Expected: {expected:?}, got: {actual:?}")]
    ShapeMismatch {
        /// Human-readable description of the mismatch
        message: String,
        /// Expected sizes
        expected: Vec<usize>,
        /// Actual sizes
        actual: Vec<usize>,
    },

    /// Tensor error
    #[error("Error with the tensor: {0}")]
    TensorError(#[from] TensorError),
}

impl TensorOpsError {
    /// Returns the coarse kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput(_) => ErrorKind::InvalidArgument,
            Self::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Self::TensorError(e) => e.kind(),
        }
    }
}

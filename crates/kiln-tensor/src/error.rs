use thiserror::Error;

use crate::allocator::TensorAllocatorError;
use crate::dtype::DType;
use crate::layout::Layout;

/// Coarse classification of a [`TensorError`].
///
/// Every failure is deterministic for a given input and scoped to the call that
/// produced it; the kind tells the caller which of its inputs was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Sizes or element counts disagree.
    ShapeMismatch,
    /// A dimension index falls outside the valid range.
    IndexError,
    /// An argument value is invalid on its own.
    InvalidArgument,
    /// Input dtypes have no common promoted dtype.
    TypePromotion,
    /// Memory could not be obtained.
    Storage,
}

/// Error type for tensor operations.
///
/// This enum provides detailed error information for tensor creation,
/// manipulation, and metadata queries.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// Sizes or element counts do not agree.
    ///
    /// # Examples
    /// - Reshaping 6 elements into `[4, 2]`
    /// - Concatenating `[2, 3]` with `[2, 4]` along dimension 0
    /// - Writing a full reduction into a destination that is not rank 0
    #[error("Shape mismatch: {message}. Expected: {expected}, got: {actual}")]
    ShapeMismatch {
        /// Human-readable description of the mismatch
        message: String,
        /// Expected shape description
        expected: String,
        /// Actual shape description
        actual: String,
    },

    /// A dimension index is outside `[-rank, rank - 1]`.
    ///
    /// Negative indices count from the end; `-1` is the last dimension. The
    /// accepted range widens by one for operations that insert a dimension.
    #[error("Dimension out of range (expected to be in range of [{min}, {max}], but got {dim})")]
    IndexError {
        /// The requested dimension index
        dim: i64,
        /// Smallest accepted index
        min: i64,
        /// Largest accepted index
        max: i64,
    },

    /// An argument is invalid regardless of the tensor it is applied to.
    ///
    /// # Examples
    /// - `arange` with a zero step
    /// - wrapping a null external buffer that should hold elements
    /// - more than one `-1` placeholder in a reshape request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The inputs of an operation have no common promoted dtype.
    #[error("Type promotion failed: no common dtype for {0} and {1}")]
    TypePromotion(DType, DType),

    /// Typed access requested an element type that does not match the tensor dtype.
    #[error("DType mismatch: tensor holds {actual} but {expected} was requested")]
    DTypeMismatch {
        /// The dtype of the requested element type
        expected: DType,
        /// The dtype of the tensor
        actual: DType,
    },

    /// The operation needs a layout the tensor strides cannot express.
    ///
    /// Raised by `view` when the requested sizes are not re-expressible over the
    /// current strides, and by slice accessors on non-contiguous tensors.
    #[error("Non-contiguous tensor: {0}")]
    NonContiguous(String),

    /// Mutable slice access was requested while other handles alias the storage.
    #[error("Storage is shared by {0} handles; mutable slice access needs a unique handle")]
    SharedStorage(usize),

    /// A factory was asked for a layout kind this runtime does not execute.
    #[error("Unsupported layout {0}: only Strided tensors can be materialized")]
    UnsupportedLayout(Layout),

    /// Underlying storage operation failed.
    ///
    /// This error wraps lower-level memory allocation errors.
    /// See [`TensorAllocatorError`] for details.
    #[error("Storage error: {0}")]
    StorageError(#[from] TensorAllocatorError),
}

impl TensorError {
    /// Creates a ShapeMismatch error with formatted shapes.
    pub fn shape_mismatch(message: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Creates an IndexError for a dimension checked against `rank` valid positions.
    pub fn index_error(dim: i64, rank: usize) -> Self {
        let rank = rank.max(1) as i64;
        Self::IndexError {
            dim,
            min: -rank,
            max: rank - 1,
        }
    }

    /// Creates an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns the coarse kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch { .. } | Self::NonContiguous(_) => ErrorKind::ShapeMismatch,
            Self::IndexError { .. } => ErrorKind::IndexError,
            Self::InvalidArgument(_)
            | Self::DTypeMismatch { .. }
            | Self::SharedStorage(_)
            | Self::UnsupportedLayout(_) => ErrorKind::InvalidArgument,
            Self::TypePromotion(..) => ErrorKind::TypePromotion,
            Self::StorageError(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if this error is recoverable by freeing memory.
    pub fn is_out_of_memory(&self) -> bool {
        match self {
            Self::StorageError(e) => e.is_out_of_memory(),
            _ => false,
        }
    }
}

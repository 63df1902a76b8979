#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for tensor operations.
///
/// Defines [`TensorOpsError`] for handling failures during tensor computations.
pub mod error;

/// Element-level kernels.
///
/// Typed building blocks used by the operations: the [`kernels::Magnitude`] trait
/// behind [`abs`] and the accumulator behind [`sum`].
pub mod kernels;

/// Concatenation along one dimension.
pub mod concat;

/// Reductions.
pub mod reduce;

/// Elementwise unary operations.
pub mod unary;

pub use concat::cat;
pub use error::TensorOpsError;
pub use reduce::{sum, sum_out};
pub use unary::abs;

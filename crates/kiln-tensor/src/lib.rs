#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `kiln-tensor` is a CPU tensor runtime with dynamic rank and runtime dtypes. A
//! [`Tensor`] is a cheap handle over reference-counted [`TensorStorage`]; views share the
//! storage and differ only in their [`Geometry`] (sizes, strides and an offset).
//!
//! # Architecture
//!
//! - **TensorStorage**: a type-erased byte buffer, either owned (allocated through a
//!   [`TensorAllocator`]) or borrowed from an external owner
//! - **Geometry**: the layout descriptor, immutable once built
//! - **shape**: pure layout algebra deriving new geometries (`view`, `transpose`, ...)
//! - **Tensor**: storage + geometry + [`DType`] + [`Device`] + [`Layout`]
//! - **factory**: every way of materializing a tensor, configured by [`TensorOptions`]
//!
//! # Quick Start
//!
//! ```rust
//! use kiln_tensor::{DType, Tensor};
//!
//! let t = Tensor::arange(6, DType::Float32).unwrap();
//! let m = t.reshape(&[2, 3]).unwrap();
//! assert_eq!(m.strides(), &[3, 1]);
//! assert!(m.storage().ptr_eq(t.storage()));
//!
//! let col = m.transpose(0, 1).unwrap().narrow(0, 1, 1).unwrap();
//! assert_eq!(col.to_vec::<f32>().unwrap(), vec![1.0, 4.0]);
//! ```
//!
//! Wrapping an external buffer:
//!
//! ```rust
//! use kiln_tensor::{DType, Tensor};
//!
//! let mut data = vec![1_i64, 2, 3, 4];
//! let ptr = data.as_mut_ptr() as *mut u8;
//! let t = unsafe { Tensor::from_blob(ptr, &[2, 2], None, DType::Int64) }.unwrap();
//! assert_eq!(t.data_ptr(), ptr);
//! assert_eq!(t.get::<i64>(&[1, 0]).unwrap(), 3);
//! ```

/// Allocator module containing memory management utilities.
///
/// This module provides the [`TensorAllocator`] trait and the [`CpuAllocator`] used by
/// owned storage.
pub mod allocator;

/// Device tags.
pub mod device;

/// Element dtypes, promotion and the [`dispatch_dtype!`] macro.
pub mod dtype;

/// Error types.
pub mod error;

/// Tensor options and factory functions.
pub mod factory;

/// The layout descriptor and its offset iterator.
pub mod geometry;

/// Layout kinds.
pub mod layout;

/// Dtype-erased scalars and the [`Element`] trait.
pub mod scalar;

/// Layout algebra for view-producing operations.
pub mod shape;

/// Storage module containing the reference-counted memory buffer.
///
/// This module provides [`storage::TensorStorage`] which owns or borrows the bytes
/// behind every tensor.
pub mod storage;

/// Tensor module containing the tensor handle.
pub mod tensor;

#[doc(hidden)]
pub use num_complex;

pub use crate::allocator::{CpuAllocator, TensorAllocator, TensorAllocatorError};
pub use crate::device::Device;
pub use crate::dtype::{promote_types, result_type, DType};
pub use crate::error::{ErrorKind, TensorError};
pub use crate::factory::TensorOptions;
pub use crate::geometry::Geometry;
pub use crate::layout::{
    Layout, K_JAGGED, K_MKLDNN, K_SPARSE, K_SPARSE_BSC, K_SPARSE_BSR, K_SPARSE_CSC,
    K_SPARSE_CSR, K_STRIDED,
};
pub use crate::scalar::{Element, Scalar};
pub use crate::storage::{AllocInit, TensorStorage, WeakStorage};
pub use crate::tensor::{Tensor, WeakTensor};

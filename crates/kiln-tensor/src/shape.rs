//! Pure layout algebra for view-producing operations.
//!
//! Every function here takes a [`Geometry`] and returns a new one without touching
//! storage. Whether a result can share the source storage is decided here; callers
//! that need a copy fall back to a contiguous materialization.

use crate::{
    error::TensorError,
    geometry::{checked_numel, contiguous_strides, numel_of, Geometry},
};

/// Resolves a possibly negative dimension index against `rank` dimensions.
///
/// Negative indices count from the end, so `-1` is the last dimension. A rank-0
/// tensor accepts `0` and `-1`, both resolving to `0`.
///
/// # Errors
///
/// Returns [`TensorError::IndexError`] if `dim` is outside `[-rank, rank - 1]`.
pub fn wrap_dim(dim: i64, rank: usize) -> Result<usize, TensorError> {
    let bound = rank.max(1) as i64;
    if dim < -bound || dim >= bound {
        return Err(TensorError::index_error(dim, rank));
    }
    let wrapped = if dim < 0 { dim + bound } else { dim };
    Ok(wrapped as usize)
}

/// Resolves a requested shape that may contain a single `-1` placeholder.
///
/// # Errors
///
/// - [`TensorError::InvalidArgument`] if more than one `-1` is given or a size is
///   below `-1`.
/// - [`TensorError::ShapeMismatch`] if the element count cannot be matched.
pub fn infer_size(requested: &[i64], numel: usize) -> Result<Vec<usize>, TensorError> {
    let mut infer_at = None;
    let mut known: usize = 1;
    // product with zeros counted as 1, bounding every contiguous stride
    let mut extent: usize = 1;
    for (i, &size) in requested.iter().enumerate() {
        match size {
            -1 => {
                if infer_at.replace(i).is_some() {
                    return Err(TensorError::invalid_argument(
                        "only one dimension can be inferred",
                    ));
                }
            }
            s if s < -1 => {
                return Err(TensorError::invalid_argument(format!(
                    "invalid shape dimension {s}"
                )));
            }
            s => {
                let s = usize::try_from(s).map_err(|_| {
                    TensorError::invalid_argument(format!("invalid shape dimension {s}"))
                })?;
                extent = extent.checked_mul(s.max(1)).ok_or_else(|| {
                    TensorError::invalid_argument(format!(
                        "shape {requested:?} overflows the element count"
                    ))
                })?;
                known *= s;
            }
        }
    }

    let mismatch = || TensorError::ShapeMismatch {
        message: "shape is invalid for the number of elements".to_string(),
        expected: format!("{numel} elements"),
        actual: format!("{:?}", requested),
    };

    let mut sizes: Vec<usize> = requested.iter().map(|&s| s.max(0) as usize).collect();
    match infer_at {
        Some(i) => {
            // with a zero-sized known part the placeholder could take any value
            if known == 0 || numel % known != 0 {
                return Err(mismatch());
            }
            sizes[i] = numel / known;
        }
        None => {
            if known != numel {
                return Err(mismatch());
            }
        }
    }
    Ok(sizes)
}

/// Computes strides that let `new_sizes` address the same elements as an existing
/// layout, in the same logical order.
///
/// Returns `None` when no such strides exist, meaning the new shape would need a copy.
pub fn compute_view_strides(
    old_sizes: &[usize],
    old_strides: &[usize],
    new_sizes: &[usize],
) -> Option<Vec<usize>> {
    if old_sizes.is_empty() {
        return Some(vec![1; new_sizes.len()]);
    }
    let numel = numel_of(old_sizes);
    if numel == 0 {
        return if old_sizes == new_sizes {
            Some(old_strides.to_vec())
        } else {
            Some(contiguous_strides(new_sizes))
        };
    }

    let mut new_strides = vec![0; new_sizes.len()];
    let mut view_d = new_sizes.len() as isize - 1;
    // stride of the innermost dimension of the current contiguous chunk
    let mut chunk_base_stride = *old_strides.last()?;
    let mut tensor_numel = 1;
    let mut view_numel = 1;

    for tensor_d in (0..old_sizes.len()).rev() {
        tensor_numel *= old_sizes[tensor_d];
        let chunk_ends = tensor_d == 0
            || (old_sizes[tensor_d - 1] != 1
                && old_strides[tensor_d - 1] != tensor_numel * chunk_base_stride);
        if !chunk_ends {
            continue;
        }
        while view_d >= 0
            && (view_numel < tensor_numel || new_sizes[view_d as usize] == 1)
        {
            new_strides[view_d as usize] = view_numel * chunk_base_stride;
            view_numel *= new_sizes[view_d as usize];
            view_d -= 1;
        }
        if view_numel != tensor_numel {
            return None;
        }
        if tensor_d > 0 {
            chunk_base_stride = old_strides[tensor_d - 1];
            tensor_numel = 1;
            view_numel = 1;
        }
    }
    if view_d != -1 {
        return None;
    }
    Some(new_strides)
}

/// Derives a view geometry with `new_sizes` sharing the source storage.
///
/// # Errors
///
/// - [`TensorError::ShapeMismatch`] if the element counts differ.
/// - [`TensorError::NonContiguous`] if the sizes cannot be expressed over the
///   current strides.
pub fn view(geometry: &Geometry, new_sizes: &[usize]) -> Result<Geometry, TensorError> {
    if checked_numel(new_sizes)? != geometry.numel() {
        return Err(TensorError::shape_mismatch(
            "view requires the same number of elements",
            geometry.sizes(),
            new_sizes,
        ));
    }
    let strides = compute_view_strides(geometry.sizes(), geometry.strides(), new_sizes)
        .ok_or_else(|| {
            TensorError::NonContiguous(format!(
                "view size {:?} is not compatible with sizes {:?} and strides {:?}; use reshape",
                new_sizes,
                geometry.sizes(),
                geometry.strides()
            ))
        })?;
    Geometry::new(new_sizes.to_vec(), strides, geometry.offset())
}

/// Removes size-1 dimensions.
///
/// With `dim == None` every size-1 dimension is dropped. With a dimension, only that
/// one is dropped, and only if its size is 1; otherwise the geometry is unchanged.
pub fn squeeze(geometry: &Geometry, dim: Option<i64>) -> Result<Geometry, TensorError> {
    let (sizes, strides): (Vec<usize>, Vec<usize>) = match dim {
        None => geometry
            .sizes()
            .iter()
            .zip(geometry.strides())
            .filter(|(size, _)| **size != 1)
            .map(|(&size, &stride)| (size, stride))
            .unzip(),
        Some(dim) => {
            let d = wrap_dim(dim, geometry.rank())?;
            if geometry.rank() == 0 || geometry.sizes()[d] != 1 {
                return Ok(geometry.clone());
            }
            let mut sizes = geometry.sizes().to_vec();
            let mut strides = geometry.strides().to_vec();
            sizes.remove(d);
            strides.remove(d);
            (sizes, strides)
        }
    };
    Geometry::new(sizes, strides, geometry.offset())
}

/// Inserts a size-1 dimension at `dim`, valid in `[-(rank + 1), rank]`.
///
/// The new dimension gets the stride that keeps a contiguous layout contiguous:
/// `size * stride` of the dimension it is inserted before, or 1 at the end.
pub fn unsqueeze(geometry: &Geometry, dim: i64) -> Result<Geometry, TensorError> {
    let rank = geometry.rank();
    let d = wrap_dim(dim, rank + 1)?;
    let new_stride = if d >= rank {
        1
    } else {
        geometry.sizes()[d] * geometry.strides()[d]
    };
    let mut sizes = geometry.sizes().to_vec();
    let mut strides = geometry.strides().to_vec();
    sizes.insert(d, 1);
    strides.insert(d, new_stride);
    Geometry::new(sizes, strides, geometry.offset())
}

/// Swaps the sizes and strides of two dimensions.
pub fn transpose(geometry: &Geometry, dim0: i64, dim1: i64) -> Result<Geometry, TensorError> {
    let rank = geometry.rank();
    let d0 = wrap_dim(dim0, rank)?;
    let d1 = wrap_dim(dim1, rank)?;
    if rank == 0 || d0 == d1 {
        return Ok(geometry.clone());
    }
    let mut sizes = geometry.sizes().to_vec();
    let mut strides = geometry.strides().to_vec();
    sizes.swap(d0, d1);
    strides.swap(d0, d1);
    Geometry::new(sizes, strides, geometry.offset())
}

/// Reorders dimensions so that output dimension `i` is input dimension `dims[i]`.
pub fn permute(geometry: &Geometry, dims: &[i64]) -> Result<Geometry, TensorError> {
    let rank = geometry.rank();
    if dims.len() != rank {
        return Err(TensorError::ShapeMismatch {
            message: "permute needs one entry per dimension".to_string(),
            expected: format!("{rank} dims"),
            actual: format!("{:?}", dims),
        });
    }
    let mut seen = vec![false; rank];
    let mut sizes = Vec::with_capacity(rank);
    let mut strides = Vec::with_capacity(rank);
    for &dim in dims {
        let d = wrap_dim(dim, rank)?;
        if std::mem::replace(&mut seen[d], true) {
            return Err(TensorError::invalid_argument(format!(
                "repeated dim {dim} in permute"
            )));
        }
        sizes.push(geometry.sizes()[d]);
        strides.push(geometry.strides()[d]);
    }
    Geometry::new(sizes, strides, geometry.offset())
}

/// Restricts one dimension to `length` entries starting at `start`.
///
/// A negative `start` counts from the end of the dimension.
pub fn narrow(
    geometry: &Geometry,
    dim: i64,
    start: i64,
    length: usize,
) -> Result<Geometry, TensorError> {
    if geometry.rank() == 0 {
        return Err(TensorError::invalid_argument(
            "narrow cannot be applied to a 0-dim tensor",
        ));
    }
    let d = wrap_dim(dim, geometry.rank())?;
    let size = geometry.sizes()[d];
    let start = if start < 0 { start + size as i64 } else { start };
    if start < 0 || start as usize > size {
        return Err(TensorError::IndexError {
            dim: start,
            min: -(size as i64),
            max: size as i64,
        });
    }
    let start = start as usize;
    if start + length > size {
        return Err(TensorError::invalid_argument(format!(
            "start ({start}) + length ({length}) exceeds dimension size ({size})"
        )));
    }
    let mut sizes = geometry.sizes().to_vec();
    sizes[d] = length;
    let offset = geometry.offset() + start * geometry.strides()[d];
    Geometry::new(sizes, geometry.strides().to_vec(), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_dim() -> Result<(), TensorError> {
        assert_eq!(wrap_dim(0, 3)?, 0);
        assert_eq!(wrap_dim(-1, 3)?, 2);
        assert_eq!(wrap_dim(-3, 3)?, 0);
        assert_eq!(wrap_dim(-1, 0)?, 0);
        assert!(matches!(wrap_dim(3, 3), Err(TensorError::IndexError { .. })));
        assert!(matches!(wrap_dim(-4, 3), Err(TensorError::IndexError { .. })));
        Ok(())
    }

    #[test]
    fn test_infer_size() -> Result<(), TensorError> {
        assert_eq!(infer_size(&[-1], 6)?, vec![6]);
        assert_eq!(infer_size(&[3, -1], 6)?, vec![3, 2]);
        assert_eq!(infer_size(&[1, 2, 3], 6)?, vec![1, 2, 3]);
        assert_eq!(infer_size(&[0, 3], 0)?, vec![0, 3]);
        Ok(())
    }

    #[test]
    fn test_infer_size_overflow() {
        let huge = i64::MAX;
        assert!(matches!(
            infer_size(&[huge, huge, 0], 0),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            infer_size(&[huge, huge, -1], 6),
            Err(TensorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_infer_size_errors() {
        assert!(matches!(
            infer_size(&[-1, -1], 6),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            infer_size(&[4, -1], 6),
            Err(TensorError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            infer_size(&[4, 2], 6),
            Err(TensorError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            infer_size(&[0, -1], 0),
            Err(TensorError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            infer_size(&[-2, 3], 6),
            Err(TensorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_view_strides_contiguous() {
        assert_eq!(
            compute_view_strides(&[2, 3], &[3, 1], &[6]),
            Some(vec![1])
        );
        assert_eq!(
            compute_view_strides(&[2, 3], &[3, 1], &[1, 2, 3]),
            Some(vec![6, 3, 1])
        );
        assert_eq!(compute_view_strides(&[], &[], &[1, 1]), Some(vec![1, 1]));
    }

    #[test]
    fn test_view_strides_transposed() {
        // transpose of a contiguous [2, 3]: splitting dims works, merging does not
        assert_eq!(compute_view_strides(&[3, 2], &[1, 3], &[6]), None);
        assert_eq!(
            compute_view_strides(&[3, 2], &[1, 3], &[3, 2, 1]),
            Some(vec![1, 3, 3])
        );
        assert_eq!(
            compute_view_strides(&[4, 2], &[1, 4], &[2, 2, 2]),
            Some(vec![2, 1, 4])
        );
    }

    #[test]
    fn test_squeeze() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[1, 3, 1, 2]);
        let all = squeeze(&g, None)?;
        assert_eq!(all.sizes(), &[3, 2]);
        assert_eq!(all.strides(), &[2, 1]);

        let one = squeeze(&g, Some(2))?;
        assert_eq!(one.sizes(), &[1, 3, 2]);

        let noop = squeeze(&g, Some(1))?;
        assert_eq!(noop, g);

        let neg = squeeze(&g, Some(-4))?;
        assert_eq!(neg.sizes(), &[3, 1, 2]);

        assert!(matches!(
            squeeze(&g, Some(4)),
            Err(TensorError::IndexError { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_unsqueeze() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[2, 3]);
        let front = unsqueeze(&g, 0)?;
        assert_eq!(front.sizes(), &[1, 2, 3]);
        assert_eq!(front.strides(), &[6, 3, 1]);
        assert!(front.is_contiguous());

        let back = unsqueeze(&g, -1)?;
        assert_eq!(back.sizes(), &[2, 3, 1]);
        assert_eq!(back.strides(), &[3, 1, 1]);

        let middle = unsqueeze(&g, 1)?;
        assert_eq!(middle.sizes(), &[2, 1, 3]);
        assert_eq!(middle.strides(), &[3, 3, 1]);

        assert!(unsqueeze(&g, 2).is_ok());
        assert!(unsqueeze(&g, -3).is_ok());
        assert!(matches!(unsqueeze(&g, 3), Err(TensorError::IndexError { .. })));
        assert!(matches!(unsqueeze(&g, -4), Err(TensorError::IndexError { .. })));
        Ok(())
    }

    #[test]
    fn test_squeeze_unsqueeze_pair() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[4, 5]);
        for d in -3..=2 {
            let back = squeeze(&unsqueeze(&g, d)?, Some(d))?;
            assert_eq!(back.sizes(), g.sizes());
        }
        Ok(())
    }

    #[test]
    fn test_transpose() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[2, 3, 4]);
        let t = transpose(&g, 0, 2)?;
        assert_eq!(t.sizes(), &[4, 3, 2]);
        assert_eq!(t.strides(), &[1, 4, 12]);
        assert!(!t.is_contiguous());
        assert_eq!(transpose(&g, -1, 2)?, g);
        assert!(matches!(transpose(&g, 0, 3), Err(TensorError::IndexError { .. })));
        Ok(())
    }

    #[test]
    fn test_permute() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[2, 3, 4]);
        let p = permute(&g, &[2, 0, 1])?;
        assert_eq!(p.sizes(), &[4, 2, 3]);
        assert_eq!(p.strides(), &[1, 12, 4]);
        assert!(matches!(
            permute(&g, &[0, 0, 1]),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            permute(&g, &[0, 1]),
            Err(TensorError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_narrow() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[4, 3]);
        let n = narrow(&g, 0, 1, 2)?;
        assert_eq!(n.sizes(), &[2, 3]);
        assert_eq!(n.offset(), 3);
        assert!(n.is_contiguous());

        let cols = narrow(&g, 1, -2, 2)?;
        assert_eq!(cols.sizes(), &[4, 2]);
        assert_eq!(cols.offset(), 1);
        assert!(!cols.is_contiguous());

        assert!(matches!(
            narrow(&g, 0, 3, 2),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(narrow(&Geometry::contiguous(&[]), 0, 0, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_view() -> Result<(), TensorError> {
        let g = Geometry::contiguous(&[2, 3]);
        let v = view(&g, &[3, 2])?;
        assert_eq!(v.strides(), &[2, 1]);

        let t = transpose(&g, 0, 1)?;
        assert!(matches!(view(&t, &[6]), Err(TensorError::NonContiguous(_))));
        assert!(matches!(
            view(&g, &[4]),
            Err(TensorError::ShapeMismatch { .. })
        ));
        Ok(())
    }
}

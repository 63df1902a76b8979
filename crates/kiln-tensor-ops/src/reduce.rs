use kiln_tensor::{geometry::contiguous_strides, shape::wrap_dim, DType, Geometry, Tensor, TensorError};

use crate::{error::TensorOpsError, kernels::Accumulator};

/// The dtype a sum produces when none is requested.
///
/// Booleans and integers widen to `Int64`; floating and complex inputs keep their dtype.
pub fn default_sum_dtype(input: DType) -> DType {
    if input.is_integral() {
        DType::Int64
    } else {
        input
    }
}

fn reduction_mask(rank: usize, dims: Option<&[i64]>) -> Result<Vec<bool>, TensorOpsError> {
    let dims = match dims {
        Some(dims) if !dims.is_empty() => dims,
        _ => return Ok(vec![true; rank]),
    };
    let mut mask = vec![false; rank];
    for &dim in dims {
        let d = wrap_dim(dim, rank)?;
        if rank == 0 {
            continue;
        }
        if std::mem::replace(&mut mask[d], true) {
            return Err(TensorError::invalid_argument(format!(
                "dim {d} appears multiple times in the list of dims"
            ))
            .into());
        }
    }
    Ok(mask)
}

/// Sums the elements of a tensor over the given dimensions.
///
/// With `dims` of `None` or an empty slice every dimension is reduced. Reduced
/// dimensions are removed from the result unless `keepdim` is set, in which case they
/// are kept with size 1. A full reduction without `keepdim` produces a 0-dim tensor.
///
/// The result dtype is `dtype` if given, else [`default_sum_dtype`] of the input.
/// Values accumulate in the widest type of the result's family: `i64` for integral
/// results, `f64` for floating results and double precision complex otherwise.
///
/// # Arguments
///
/// * `tensor` - The tensor to reduce.
/// * `dims` - The dimensions to reduce; negative values count from the end.
/// * `keepdim` - Whether reduced dimensions are kept with size 1.
/// * `dtype` - The dtype of the result.
///
/// # Errors
///
/// - [`TensorError::IndexError`] if a dimension is out of range.
/// - [`TensorError::InvalidArgument`] if a dimension is listed twice.
///
/// # Example
///
/// ```
/// use kiln_tensor::{DType, Tensor};
/// use kiln_tensor_ops::sum;
///
/// let t = Tensor::from_shape_vec(&[2, 3], vec![1_i32, 2, 3, 4, 5, 6]).unwrap();
/// let rows = sum(&t, Some(&[1]), false, None).unwrap();
/// assert_eq!(rows.dtype(), DType::Int64);
/// assert_eq!(rows.to_vec::<i64>().unwrap(), vec![6, 15]);
///
/// let total = sum(&t, None, false, None).unwrap();
/// assert_eq!(total.dim(), 0);
/// assert_eq!(total.item::<i64>().unwrap(), 21);
/// ```
pub fn sum(
    tensor: &Tensor,
    dims: Option<&[i64]>,
    keepdim: bool,
    dtype: Option<DType>,
) -> Result<Tensor, TensorOpsError> {
    let out_dtype = dtype.unwrap_or_else(|| default_sum_dtype(tensor.dtype()));
    let mask = reduction_mask(tensor.dim(), dims)?;
    log::debug!(
        "sum of {} over {:?} accumulates into {}",
        tensor.dtype(),
        mask,
        out_dtype
    );

    // keepdim sizes, with zero strides mapping every reduced index to the same slot
    let kept_sizes: Vec<usize> = tensor
        .sizes()
        .iter()
        .zip(&mask)
        .map(|(&size, &reduced)| if reduced { 1 } else { size })
        .collect();
    let slot_strides: Vec<usize> = contiguous_strides(&kept_sizes)
        .into_iter()
        .zip(&mask)
        .map(|(stride, &reduced)| if reduced { 0 } else { stride })
        .collect();
    let slots = Geometry::new(tensor.sizes().to_vec(), slot_strides, 0)?;

    let numel_out: usize = kept_sizes.iter().product();
    let mut accumulators = vec![Accumulator::zero(out_dtype); numel_out];
    for (value, slot) in tensor.iter_scalars().zip(slots.offsets()) {
        accumulators[slot].add(value);
    }

    let out_sizes: Vec<usize> = if keepdim {
        kept_sizes
    } else {
        tensor
            .sizes()
            .iter()
            .zip(&mask)
            .filter(|(_, reduced)| !**reduced)
            .map(|(&size, _)| size)
            .collect()
    };
    let values: Vec<_> = accumulators.into_iter().map(Accumulator::value).collect();
    Ok(Tensor::from_scalars(&out_sizes, &values, out_dtype)?)
}

/// Sums every element of `input` into the existing 0-dim tensor `output`.
///
/// Values accumulate as in [`sum`] with the dtype of `output`. The storage of `output`
/// is reused, so the returned handle is the same tensor that was passed in.
///
/// # Errors
///
/// Returns [`TensorOpsError::ShapeMismatch`] if `output` is not 0-dimensional.
pub fn sum_out<'a>(
    output: &'a mut Tensor,
    input: &Tensor,
) -> Result<&'a mut Tensor, TensorOpsError> {
    if output.dim() != 0 {
        return Err(TensorOpsError::ShapeMismatch {
            message: "sum_out needs a 0-dim destination for a full reduction".to_string(),
            expected: vec![],
            actual: output.sizes().to_vec(),
        });
    }
    let total = sum(input, None, false, Some(output.dtype()))?;
    output.copy_(&total)?;
    Ok(output)
}

use kiln_tensor::{dispatch_dtype, result_type, shape::wrap_dim, DType, Tensor, TensorError};

use crate::error::TensorOpsError;

// 1-D tensors with zero elements are accepted regardless of the other sizes
fn is_skippable(tensor: &Tensor) -> bool {
    tensor.dim() == 1 && tensor.numel() == 0
}

fn zero_dim_error() -> TensorOpsError {
    TensorError::invalid_argument("zero-dimensional tensor cannot be concatenated").into()
}

/// Concatenates tensors along dimension `dim`.
///
/// All inputs must have the same rank and the same sizes in every dimension except
/// `dim`; negative `dim` counts from the end. The result is freshly allocated and
/// contiguous, with the dtype promoted across all inputs. 1-D inputs with zero
/// elements are skipped.
///
/// # Arguments
///
/// * `tensors` - The tensors to concatenate, in order.
/// * `dim` - The dimension to concatenate along.
///
/// # Errors
///
/// - [`TensorOpsError::EmptyInput`] if `tensors` is empty.
/// - [`TensorOpsError::ShapeMismatch`] if ranks or sizes disagree.
/// - [`TensorError::IndexError`] if `dim` is out of range.
/// - [`TensorError::InvalidArgument`] if an input is 0-dimensional.
///
/// # Example
///
/// ```
/// use kiln_tensor::{DType, Tensor};
/// use kiln_tensor_ops::cat;
///
/// let a = Tensor::arange(6, DType::Int64).unwrap().reshape(&[2, 3]).unwrap();
/// let b = Tensor::arange_from(6, 12, DType::Int64).unwrap().reshape(&[2, 3]).unwrap();
/// let c = cat(&[a, b], 1).unwrap();
/// assert_eq!(c.sizes(), &[2, 6]);
/// assert_eq!(
///     c.to_vec::<i64>().unwrap(),
///     vec![0, 1, 2, 6, 7, 8, 3, 4, 5, 9, 10, 11]
/// );
/// ```
pub fn cat(tensors: &[Tensor], dim: i64) -> Result<Tensor, TensorOpsError> {
    if tensors.is_empty() {
        return Err(TensorOpsError::EmptyInput("cat"));
    }
    let dtypes: Vec<DType> = tensors.iter().map(Tensor::dtype).collect();
    let dtype = result_type(&dtypes)?;
    if dtypes.iter().any(|&d| d != dtype) {
        log::debug!("cat promotes inputs {:?} to {}", dtypes, dtype);
    }

    let inputs: Vec<&Tensor> = tensors.iter().filter(|t| !is_skippable(t)).collect();
    let Some(first) = inputs.first() else {
        return Ok(Tensor::empty(&[0], dtype)?);
    };
    if first.dim() == 0 {
        return Err(zero_dim_error());
    }
    let rank = first.dim();
    let d = wrap_dim(dim, rank)?;

    let mut out_sizes = first.sizes().to_vec();
    out_sizes[d] = 0;
    for t in &inputs {
        if t.dim() == 0 {
            return Err(zero_dim_error());
        }
        let compatible = t.dim() == rank
            && t
                .sizes()
                .iter()
                .zip(first.sizes())
                .enumerate()
                .all(|(i, (a, b))| i == d || a == b);
        if !compatible {
            return Err(TensorOpsError::ShapeMismatch {
                message: format!("sizes of tensors must match except in dimension {d}"),
                expected: first.sizes().to_vec(),
                actual: t.sizes().to_vec(),
            });
        }
        out_sizes[d] += t.sizes()[d];
    }

    // elements after `d` form one contiguous run per outer index
    let outer: usize = out_sizes[..d].iter().product();
    let inner: usize = out_sizes[d + 1..].iter().product();
    let out_row = out_sizes[d] * inner;

    let mut out = Tensor::empty(&out_sizes, dtype)?;
    dispatch_dtype!(dtype, |T| {
        let dst = out.as_slice_mut::<T>()?;
        let mut column = 0;
        for t in &inputs {
            let src = t.to_dtype(dtype)?.to_vec::<T>()?;
            let run = t.sizes()[d] * inner;
            if run > 0 {
                for (o, chunk) in src.chunks_exact(run).enumerate().take(outer) {
                    let start = o * out_row + column;
                    dst[start..start + run].copy_from_slice(chunk);
                }
            }
            column += run;
        }
    });
    Ok(out)
}

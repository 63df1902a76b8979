use kiln_tensor::{dispatch_dtype, Tensor};

use crate::{error::TensorOpsError, kernels::abs_kernel};

/// Computes the elementwise absolute value of a tensor.
///
/// The result is a new contiguous tensor with the same sizes. Real dtypes are kept;
/// complex dtypes produce their real counterpart holding the magnitude. `Bool` and
/// `Byte` values are returned unchanged, and the minimum value of a signed integer
/// dtype maps to itself. The input is never modified and the result never shares
/// storage with it.
///
/// # Example
///
/// ```
/// use kiln_tensor::Tensor;
/// use kiln_tensor_ops::abs;
///
/// let t = Tensor::from_shape_vec(&[4], vec![1.0_f32, -2.0, 0.0, -3.5]).unwrap();
/// let a = abs(&t).unwrap();
/// assert_eq!(a.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 0.0, 3.5]);
/// ```
pub fn abs(tensor: &Tensor) -> Result<Tensor, TensorOpsError> {
    let out = dispatch_dtype!(tensor.dtype(), |T| {
        let values = tensor.to_vec::<T>()?;
        Tensor::from_shape_vec(tensor.sizes(), abs_kernel(&values))?
    });
    Ok(out)
}

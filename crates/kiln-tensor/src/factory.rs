//! Tensor construction: options and factory functions.
//!
//! Every tensor is materialized here, either over fresh storage or over an external
//! buffer wrapped by [`Tensor::from_blob`].

use crate::{
    device::Device,
    dtype::DType,
    error::TensorError,
    geometry::{checked_numel, Geometry},
    layout::Layout,
    scalar::{Element, Scalar},
    storage::{AllocInit, TensorStorage},
    tensor::Tensor,
};

/// The dtype used by factories when none is requested.
pub const DEFAULT_DTYPE: DType = DType::Float32;

/// Options consumed by every factory function.
///
/// The dtype is optional so that each factory can apply its own default: `Float32` for
/// filled tensors, inference from the arguments for [`Tensor::arange`], and the dtype
/// of the source tensor for the `*_like` factories.
///
/// A bare [`DType`] converts into options, so `Tensor::zeros(&[2], DType::Int32)` and
/// `Tensor::zeros(&[2], TensorOptions::new().with_dtype(DType::Int32))` are equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TensorOptions {
    dtype: Option<DType>,
    device: Device,
    layout: Layout,
}

impl TensorOptions {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the element dtype.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Sets the device.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Sets the layout kind. Only [`Layout::Strided`] can be materialized.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// The requested dtype, if any.
    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    /// The requested device.
    pub fn device(&self) -> Device {
        self.device
    }

    /// The requested layout kind.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The requested dtype, or `default` when unset.
    pub fn dtype_or(&self, default: DType) -> DType {
        self.dtype.unwrap_or(default)
    }

    fn check_layout(&self) -> Result<(), TensorError> {
        if self.layout != Layout::Strided {
            return Err(TensorError::UnsupportedLayout(self.layout));
        }
        Ok(())
    }
}

impl From<DType> for TensorOptions {
    fn from(dtype: DType) -> Self {
        Self::new().with_dtype(dtype)
    }
}

impl Tensor {
    fn create(
        sizes: &[usize],
        options: TensorOptions,
        default_dtype: DType,
        init: AllocInit,
    ) -> Result<Tensor, TensorError> {
        options.check_layout()?;
        Tensor::allocate(sizes, options.dtype_or(default_dtype), init)
    }

    /// Creates a contiguous tensor filled with zeros.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_tensor::{DType, Tensor};
    ///
    /// let t = Tensor::zeros(&[2, 2], DType::Int32).unwrap();
    /// assert_eq!(t.to_vec::<i32>().unwrap(), vec![0, 0, 0, 0]);
    /// ```
    pub fn zeros(sizes: &[usize], options: impl Into<TensorOptions>) -> Result<Tensor, TensorError> {
        Self::create(sizes, options.into(), DEFAULT_DTYPE, AllocInit::Zeroed)
    }

    /// Creates a contiguous tensor filled with ones.
    pub fn ones(sizes: &[usize], options: impl Into<TensorOptions>) -> Result<Tensor, TensorError> {
        Self::full(sizes, Scalar::Int(1), options)
    }

    /// Creates a contiguous tensor with every element set to `value`, converted to the
    /// dtype.
    pub fn full(
        sizes: &[usize],
        value: impl Into<Scalar>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        let mut out = Self::create(
            sizes,
            options.into(),
            DEFAULT_DTYPE,
            AllocInit::Uninitialized,
        )?;
        out.fill_(value)?;
        Ok(out)
    }

    /// Creates a contiguous tensor whose contents callers must not rely on.
    ///
    /// The memory is zeroed so that every safe read sees valid elements, but callers
    /// should treat the values as unspecified.
    pub fn empty(sizes: &[usize], options: impl Into<TensorOptions>) -> Result<Tensor, TensorError> {
        Self::create(sizes, options.into(), DEFAULT_DTYPE, AllocInit::Zeroed)
    }

    /// Creates the 1-D tensor `[0, 1, ..., end - 1]`.
    ///
    /// See [`arange_step`](Tensor::arange_step).
    pub fn arange(
        end: impl Into<Scalar>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        Self::arange_step(Scalar::Int(0), end, Scalar::Int(1), options)
    }

    /// Creates the 1-D tensor `[start, start + 1, ...]` stopping before `end`.
    ///
    /// See [`arange_step`](Tensor::arange_step).
    pub fn arange_from(
        start: impl Into<Scalar>,
        end: impl Into<Scalar>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        Self::arange_step(start, end, Scalar::Int(1), options)
    }

    /// Creates the 1-D tensor `[start, start + step, ...]` stopping before `end`.
    ///
    /// The result has `ceil((end - start) / step)` elements. Without an explicit dtype
    /// the result is `Int64` when every argument is integral and `Float32` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::InvalidArgument`] if `step` is zero, if the sign of
    /// `step` points away from `end`, or if an argument is complex or not finite.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_tensor::{DType, Tensor};
    ///
    /// let t = Tensor::arange_step(1, 10, 2, DType::Int32).unwrap();
    /// assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 3, 5, 7, 9]);
    /// ```
    pub fn arange_step(
        start: impl Into<Scalar>,
        end: impl Into<Scalar>,
        step: impl Into<Scalar>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        let (start, end, step) = (start.into(), end.into(), step.into());
        let options = options.into();
        let args = [start, end, step];
        if args.iter().any(Scalar::is_complex) {
            return Err(TensorError::invalid_argument(
                "arange arguments must be real numbers",
            ));
        }
        let integral = args.iter().all(Scalar::is_integral);
        let dtype = options.dtype_or(if integral { DType::Int64 } else { DEFAULT_DTYPE });

        let out = if integral {
            let (start, end, step) = (start.to_i64(), end.to_i64(), step.to_i64());
            let len = arange_len_integral(start, end, step)?;
            let mut out = Self::create(&[len], options, dtype, AllocInit::Uninitialized)?;
            out.write_scalars((0..len as i64).map(|i| Scalar::Int(start + i * step)));
            out
        } else {
            let (start, end, step) = (start.to_f64(), end.to_f64(), step.to_f64());
            let len = arange_len_floating(start, end, step)?;
            let mut out = Self::create(&[len], options, dtype, AllocInit::Uninitialized)?;
            out.write_scalars((0..len).map(|i| Scalar::Float(start + i as f64 * step)));
            out
        };
        log::trace!("arange produced {} elements of {}", out.numel(), dtype);
        Ok(out)
    }

    /// Wraps externally owned memory as a tensor without copying or taking ownership.
    ///
    /// Without `strides` the row-major strides of `sizes` are used. The returned
    /// tensor's [`data_ptr`](Tensor::data_ptr) equals `data`. Without an explicit
    /// dtype the buffer is interpreted as `Float32`; the dtype is metadata only and
    /// is never checked against the buffer contents.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `data` is valid for reads and writes of every element the geometry addresses
    /// - `data` is aligned for the dtype if typed slice access is used
    /// - the buffer outlives every handle derived from the returned tensor
    ///
    /// # Errors
    ///
    /// - [`TensorError::ShapeMismatch`] if `strides` and `sizes` differ in length.
    /// - [`TensorError::InvalidArgument`] if `data` is null while elements are addressed.
    /// - [`TensorError::UnsupportedLayout`] for a non-strided layout.
    pub unsafe fn from_blob(
        data: *mut u8,
        sizes: &[usize],
        strides: Option<&[usize]>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        let options = options.into();
        options.check_layout()?;
        let dtype = options.dtype_or(DEFAULT_DTYPE);
        let geometry = match strides {
            Some(strides) => Geometry::new(sizes.to_vec(), strides.to_vec(), 0)?,
            None => {
                checked_numel(sizes)?;
                Geometry::contiguous(sizes)
            }
        };
        let storage =
            TensorStorage::wrap_external(data, geometry.storage_extent(), dtype.itemsize())?;
        Tensor::from_storage(storage, geometry, dtype)
    }

    /// Creates a contiguous tensor from a vector of elements in row-major order.
    ///
    /// The dtype is taken from the element type.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the number of elements does not match
    /// the sizes.
    pub fn from_shape_vec<T: Element>(sizes: &[usize], data: Vec<T>) -> Result<Tensor, TensorError> {
        Self::from_shape_slice(sizes, &data)
    }

    /// Creates a contiguous tensor by copying a slice of elements in row-major order.
    pub fn from_shape_slice<T: Element>(sizes: &[usize], data: &[T]) -> Result<Tensor, TensorError> {
        let numel = checked_numel(sizes)?;
        if numel != data.len() {
            return Err(TensorError::ShapeMismatch {
                message: "data length does not match the sizes".to_string(),
                expected: format!("{numel} elements"),
                actual: format!("{} elements", data.len()),
            });
        }
        let out = Tensor::allocate(sizes, T::DTYPE, AllocInit::Uninitialized)?;
        // SAFETY: the storage was just allocated for `numel` elements of `T` and is
        // aligned for every element type; the source is a distinct allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), out.data_ptr() as *mut T, numel);
        }
        Ok(out)
    }

    /// Creates a contiguous tensor from dtype-erased scalars in row-major order.
    ///
    /// Each value is converted to the dtype, which defaults to `Float32`.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the number of values does not match
    /// the sizes.
    pub fn from_scalars(
        sizes: &[usize],
        values: &[Scalar],
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        let numel = checked_numel(sizes)?;
        if numel != values.len() {
            return Err(TensorError::ShapeMismatch {
                message: "value count does not match the sizes".to_string(),
                expected: format!("{numel} elements"),
                actual: format!("{} elements", values.len()),
            });
        }
        let mut out = Self::create(
            sizes,
            options.into(),
            DEFAULT_DTYPE,
            AllocInit::Uninitialized,
        )?;
        out.write_scalars(values.iter().copied());
        Ok(out)
    }

    fn like(
        other: &Tensor,
        options: TensorOptions,
        init: AllocInit,
    ) -> Result<Tensor, TensorError> {
        Self::create(other.sizes(), options, other.dtype(), init)
    }

    /// Creates a zero-filled tensor with the sizes of `other`.
    ///
    /// An unset dtype in `options` falls back to the dtype of `other`.
    pub fn zeros_like(
        other: &Tensor,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        Self::like(other, options.into(), AllocInit::Zeroed)
    }

    /// Creates a tensor of ones with the sizes of `other`.
    pub fn ones_like(
        other: &Tensor,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        Self::full_like(other, Scalar::Int(1), options)
    }

    /// Creates a tensor with the sizes of `other` and unspecified contents, as
    /// [`empty`](Tensor::empty).
    pub fn empty_like(
        other: &Tensor,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        Self::like(other, options.into(), AllocInit::Zeroed)
    }

    /// Creates a tensor with the sizes of `other` and every element set to `value`.
    pub fn full_like(
        other: &Tensor,
        value: impl Into<Scalar>,
        options: impl Into<TensorOptions>,
    ) -> Result<Tensor, TensorError> {
        let mut out = Self::like(other, options.into(), AllocInit::Uninitialized)?;
        out.fill_(value)?;
        Ok(out)
    }
}

fn non_monotonic() -> TensorError {
    TensorError::invalid_argument("upper bound and lower bound are inconsistent with the step sign")
}

fn arange_len_integral(start: i64, end: i64, step: i64) -> Result<usize, TensorError> {
    if step == 0 {
        return Err(TensorError::invalid_argument("arange step must be nonzero"));
    }
    let span = i128::from(end) - i128::from(start);
    let step = i128::from(step);
    if span != 0 && (span > 0) != (step > 0) {
        return Err(non_monotonic());
    }
    // ceil division for same-sign operands
    let len = (span + step - step.signum()) / step;
    usize::try_from(len).map_err(|_| non_monotonic())
}

fn arange_len_floating(start: f64, end: f64, step: f64) -> Result<usize, TensorError> {
    if step == 0.0 {
        return Err(TensorError::invalid_argument("arange step must be nonzero"));
    }
    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return Err(TensorError::invalid_argument(
            "arange arguments must be finite",
        ));
    }
    let span = end - start;
    if span != 0.0 && (span > 0.0) != (step > 0.0) {
        return Err(non_monotonic());
    }
    Ok((span / step).ceil() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let options = TensorOptions::default();
        assert_eq!(options.dtype(), None);
        assert_eq!(options.device(), Device::Cpu);
        assert_eq!(options.layout(), Layout::Strided);
        assert_eq!(options.dtype_or(DType::Int32), DType::Int32);

        let options: TensorOptions = DType::Float64.into();
        assert_eq!(options.dtype(), Some(DType::Float64));
    }

    #[test]
    fn zeros_ones_full() -> Result<(), TensorError> {
        let z = Tensor::zeros(&[2, 3], TensorOptions::default())?;
        assert_eq!(z.dtype(), DType::Float32);
        assert_eq!(z.to_vec::<f32>()?, vec![0.0; 6]);

        let o = Tensor::ones(&[3], DType::Int64)?;
        assert_eq!(o.to_vec::<i64>()?, vec![1, 1, 1]);

        let b = Tensor::ones(&[2], DType::Bool)?;
        assert_eq!(b.to_vec::<bool>()?, vec![true, true]);

        let f = Tensor::full(&[2, 2], 2.5, DType::Float64)?;
        assert_eq!(f.to_vec::<f64>()?, vec![2.5; 4]);

        let truncated = Tensor::full(&[2], 2.5, DType::Int32)?;
        assert_eq!(truncated.to_vec::<i32>()?, vec![2, 2]);
        Ok(())
    }

    #[test]
    fn empty_metadata() -> Result<(), TensorError> {
        let t = Tensor::empty(&[2, 3, 4], DType::Float32)?;
        assert_eq!(t.sizes(), &[2, 3, 4]);
        assert_eq!(t.strides(), &[12, 4, 1]);
        assert_eq!(t.numel(), 24);
        assert!(t.is_contiguous());

        let e = Tensor::empty(&[0, 4], TensorOptions::default())?;
        assert_eq!(e.numel(), 0);
        assert!(e.to_vec::<f32>()?.is_empty());

        // reads are always of valid elements, whatever the values are
        let b = Tensor::empty(&[64], DType::Bool)?;
        let bytes = unsafe { std::slice::from_raw_parts(b.data_ptr(), b.nbytes()) };
        assert!(bytes.iter().all(|&v| v <= 1));
        let like = Tensor::empty_like(&b, TensorOptions::default())?;
        assert_eq!(like.dtype(), DType::Bool);
        assert_eq!(like.to_vec::<bool>()?.len(), 64);
        Ok(())
    }

    #[test]
    fn unsupported_layout() {
        let options = TensorOptions::new().with_layout(Layout::Sparse);
        assert!(matches!(
            Tensor::zeros(&[2], options),
            Err(TensorError::UnsupportedLayout(Layout::Sparse))
        ));
    }

    #[test]
    fn arange_forms() -> Result<(), TensorError> {
        let t = Tensor::arange(5, TensorOptions::default())?;
        assert_eq!(t.dtype(), DType::Int64);
        assert_eq!(t.to_vec::<i64>()?, vec![0, 1, 2, 3, 4]);

        let t = Tensor::arange_from(2, 5, DType::Int32)?;
        assert_eq!(t.to_vec::<i32>()?, vec![2, 3, 4]);

        let t = Tensor::arange_step(1, 10, 2, DType::Int32)?;
        assert_eq!(t.to_vec::<i32>()?, vec![1, 3, 5, 7, 9]);

        let t = Tensor::arange_step(5, 0, -2, TensorOptions::default())?;
        assert_eq!(t.to_vec::<i64>()?, vec![5, 3, 1]);
        Ok(())
    }

    #[test]
    fn arange_floating() -> Result<(), TensorError> {
        let t = Tensor::arange_step(0.0, 1.0, 0.25, TensorOptions::default())?;
        assert_eq!(t.dtype(), DType::Float32);
        assert_eq!(t.to_vec::<f32>()?, vec![0.0, 0.25, 0.5, 0.75]);

        let t = Tensor::arange_step(0, 1, 0.3, DType::Float64)?;
        assert_eq!(t.numel(), 4);

        let empty = Tensor::arange_from(3, 3, TensorOptions::default())?;
        assert_eq!(empty.sizes(), &[0]);
        Ok(())
    }

    #[test]
    fn arange_errors() {
        assert!(matches!(
            Tensor::arange_step(0, 10, 0, TensorOptions::default()),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            Tensor::arange_step(0.0, 1.0, 0.0, TensorOptions::default()),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            Tensor::arange_step(0, 10, -1, TensorOptions::default()),
            Err(TensorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_blob_contiguous() -> Result<(), TensorError> {
        let mut data = vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ptr = data.as_mut_ptr() as *mut u8;
        let t = unsafe { Tensor::from_blob(ptr, &[2, 3], None, DType::Float32)? };
        assert_eq!(t.data_ptr(), ptr);
        assert_eq!(t.strides(), &[3, 1]);
        assert!(t.storage().is_borrowed());
        assert_eq!(t.to_vec::<f32>()?, data);
        Ok(())
    }

    #[test]
    fn from_blob_strided() -> Result<(), TensorError> {
        let mut data = vec![1_i32, 2, 3, 4, 5, 6];
        let ptr = data.as_mut_ptr() as *mut u8;
        // column-major view of a 2x3 buffer
        let t = unsafe { Tensor::from_blob(ptr, &[3, 2], Some(&[1, 3]), DType::Int32)? };
        assert!(!t.is_contiguous());
        assert_eq!(t.to_vec::<i32>()?, vec![1, 4, 2, 5, 3, 6]);

        let bad = unsafe { Tensor::from_blob(ptr, &[3, 2], Some(&[1]), DType::Int32) };
        assert!(matches!(bad, Err(TensorError::ShapeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn oversized_shapes_fail() {
        let huge = [usize::MAX, 2];
        assert!(matches!(
            Tensor::zeros(&huge, DType::Byte),
            Err(TensorError::InvalidArgument(_))
        ));
        assert!(Tensor::empty(&huge, DType::Byte).is_err());
        assert!(Tensor::from_shape_vec(&huge, vec![0_u8; 4]).is_err());
        assert!(Tensor::from_scalars(&huge, &[], DType::Byte).is_err());
        let res = unsafe {
            Tensor::from_blob(std::ptr::null_mut(), &[0, usize::MAX, 2], None, DType::Byte)
        };
        assert!(matches!(res, Err(TensorError::InvalidArgument(_))));
    }

    #[test]
    fn from_blob_null() {
        let res = unsafe {
            Tensor::from_blob(std::ptr::null_mut(), &[2], None, TensorOptions::default())
        };
        assert!(matches!(res, Err(TensorError::InvalidArgument(_))));
    }

    #[test]
    fn from_shape_vec_checks_length() -> Result<(), TensorError> {
        let t = Tensor::from_shape_vec(&[2, 2], vec![1_u8, 2, 3, 4])?;
        assert_eq!(t.dtype(), DType::Byte);
        assert!(matches!(
            Tensor::from_shape_vec(&[2, 3], vec![1_u8, 2, 3, 4]),
            Err(TensorError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn from_scalars_converts() -> Result<(), TensorError> {
        let values = [Scalar::Int(3), Scalar::Float(-1.5), Scalar::Bool(true)];
        let t = Tensor::from_scalars(&[3], &values, DType::Float64)?;
        assert_eq!(t.to_vec::<f64>()?, vec![3.0, -1.5, 1.0]);
        assert!(matches!(
            Tensor::from_scalars(&[2], &values, TensorOptions::default()),
            Err(TensorError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn like_factories() -> Result<(), TensorError> {
        let src = Tensor::from_shape_vec(&[2, 2], vec![1_i32, 2, 3, 4])?;
        let z = Tensor::zeros_like(&src, TensorOptions::default())?;
        assert_eq!(z.dtype(), DType::Int32);
        assert_eq!(z.sizes(), &[2, 2]);
        assert_eq!(z.to_vec::<i32>()?, vec![0; 4]);

        let o = Tensor::ones_like(&src, DType::Float64)?;
        assert_eq!(o.to_vec::<f64>()?, vec![1.0; 4]);

        let f = Tensor::full_like(&src, 7, TensorOptions::default())?;
        assert_eq!(f.to_vec::<i32>()?, vec![7; 4]);

        let e = Tensor::empty_like(&src, TensorOptions::default())?;
        assert_eq!(e.sizes(), src.sizes());
        assert!(!e.storage().ptr_eq(src.storage()));
        Ok(())
    }
}

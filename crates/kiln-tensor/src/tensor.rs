use crate::{
    device::Device,
    dispatch_dtype,
    dtype::DType,
    error::TensorError,
    geometry::{checked_numel, Geometry},
    layout::Layout,
    scalar::{Element, Scalar},
    shape,
    storage::{AllocInit, TensorStorage, WeakStorage},
};

/// A multi-dimensional array handle over shared, reference-counted storage.
///
/// `Tensor` combines a [`TensorStorage`], a [`Geometry`] (sizes, strides and offset),
/// a [`DType`] tag, a [`Device`] tag and a [`Layout`] kind. Cloning a tensor is a cheap
/// metadata copy that increments the storage strong count; it never copies elements.
///
/// # Views and copies
///
/// View operations ([`view`](Tensor::view), [`transpose`](Tensor::transpose),
/// [`squeeze`](Tensor::squeeze), [`unsqueeze`](Tensor::unsqueeze),
/// [`narrow`](Tensor::narrow), [`permute`](Tensor::permute)) return a new handle over
/// the same storage with a derived geometry. [`reshape`](Tensor::reshape) returns a
/// view when the strides allow it and a fresh contiguous copy otherwise.
///
/// # In-place operations
///
/// `fill_`, `zero_`, `copy_`, `squeeze_` and `unsqueeze_` take `&mut self` and keep the
/// storage identity: [`data_ptr`](Tensor::data_ptr) is the same before and after. Writes
/// are visible through every view of the same storage; callers must not race them
/// against reads of that storage on other threads.
///
/// # Examples
///
/// ```
/// use kiln_tensor::{DType, Tensor};
///
/// let t = Tensor::from_shape_vec(&[2, 3], vec![0.0_f32, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
/// let tt = t.transpose(0, 1).unwrap();
/// assert_eq!(tt.sizes(), &[3, 2]);
/// assert_eq!(tt.strides(), &[1, 3]);
/// assert!(!tt.is_contiguous());
/// assert_eq!(tt.to_vec::<f32>().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
/// assert_eq!(t.dtype(), DType::Float32);
/// ```
///
/// Tensors are only materialized by the factory functions and `from_blob`; raw
/// storage cannot be attached to an arbitrary geometry from outside the crate:
///
/// ```compile_fail
/// use kiln_tensor::{AllocInit, DType, Geometry, Tensor, TensorStorage};
///
/// let storage = TensorStorage::allocate(4, 4, AllocInit::Zeroed).unwrap();
/// let _ = Tensor::from_storage(storage, Geometry::contiguous(&[4]), DType::Float32);
/// ```
#[derive(Clone)]
pub struct Tensor {
    storage: TensorStorage,
    geometry: Geometry,
    dtype: DType,
    device: Device,
    layout: Layout,
}

impl Tensor {
    pub(crate) fn from_parts(storage: TensorStorage, geometry: Geometry, dtype: DType) -> Self {
        Self {
            storage,
            geometry,
            dtype,
            device: Device::Cpu,
            layout: Layout::Strided,
        }
    }

    /// Creates a tensor over existing storage with an explicit geometry.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the geometry addresses bytes beyond
    /// the end of the storage.
    pub(crate) fn from_storage(
        storage: TensorStorage,
        geometry: Geometry,
        dtype: DType,
    ) -> Result<Self, TensorError> {
        let needed = geometry.storage_extent() * dtype.itemsize();
        if needed > storage.nbytes() {
            return Err(TensorError::ShapeMismatch {
                message: "geometry addresses bytes beyond the storage".to_string(),
                expected: format!("at most {} bytes", storage.nbytes()),
                actual: format!("{needed} bytes"),
            });
        }
        Ok(Self::from_parts(storage, geometry, dtype))
    }

    /// Allocates a contiguous tensor with the given sizes.
    pub(crate) fn allocate(
        sizes: &[usize],
        dtype: DType,
        init: AllocInit,
    ) -> Result<Self, TensorError> {
        let numel = checked_numel(sizes)?;
        let geometry = Geometry::contiguous(sizes);
        let storage = TensorStorage::allocate(numel, dtype.itemsize(), init)?;
        Ok(Self::from_parts(storage, geometry, dtype))
    }

    fn with_geometry(&self, geometry: Geometry) -> Self {
        Self {
            storage: self.storage.clone(),
            geometry,
            dtype: self.dtype,
            device: self.device,
            layout: self.layout,
        }
    }

    fn check_dtype<T: Element>(&self) -> Result<(), TensorError> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DTypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(())
    }

    /// Pointer to the element at storage offset `offset` (in elements).
    #[inline]
    fn element_ptr<T>(&self, offset: usize) -> *mut T {
        (self.storage.data_ptr() as *mut T).wrapping_add(offset)
    }

    // --- metadata ---

    /// The storage shared by this handle.
    #[inline]
    pub fn storage(&self) -> &TensorStorage {
        &self.storage
    }

    /// The layout descriptor of this handle.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The size of each dimension.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        self.geometry.sizes()
    }

    /// The stride of each dimension, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        self.geometry.strides()
    }

    /// The offset of the first element in storage, in elements.
    #[inline]
    pub fn storage_offset(&self) -> usize {
        self.geometry.offset()
    }

    /// The number of elements.
    #[inline]
    pub fn numel(&self) -> usize {
        self.geometry.numel()
    }

    /// The number of dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.geometry.rank()
    }

    /// Alias of [`dim`](Tensor::dim).
    #[inline]
    pub fn ndimension(&self) -> usize {
        self.dim()
    }

    /// The size of one dimension; negative indices count from the end.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::IndexError`] if `dim` is out of range, which is always
    /// the case for a rank-0 tensor.
    pub fn size(&self, dim: i64) -> Result<usize, TensorError> {
        if self.dim() == 0 {
            return Err(TensorError::index_error(dim, 0));
        }
        Ok(self.sizes()[shape::wrap_dim(dim, self.dim())?])
    }

    /// Alias of [`size`](Tensor::size).
    pub fn sym_size(&self, dim: i64) -> Result<usize, TensorError> {
        self.size(dim)
    }

    /// The stride of one dimension; negative indices count from the end.
    pub fn stride(&self, dim: i64) -> Result<usize, TensorError> {
        if self.dim() == 0 {
            return Err(TensorError::index_error(dim, 0));
        }
        Ok(self.strides()[shape::wrap_dim(dim, self.dim())?])
    }

    /// The element dtype.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Alias of [`dtype`](Tensor::dtype).
    #[inline]
    pub fn scalar_type(&self) -> DType {
        self.dtype
    }

    /// The device holding the storage.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// The device ordinal, `-1` for the CPU.
    pub fn get_device(&self) -> i64 {
        self.device.index().map_or(-1, |i| i as i64)
    }

    /// Returns true if the tensor lives on the CPU.
    #[inline]
    pub fn is_cpu(&self) -> bool {
        self.device.is_cpu()
    }

    /// Returns true if the tensor lives on a CUDA device. Always false here.
    #[inline]
    pub fn is_cuda(&self) -> bool {
        !self.device.is_cpu()
    }

    /// The layout kind.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns true if the strides are the row-major strides of the sizes.
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.geometry.is_contiguous()
    }

    /// Size in bytes of one element.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.dtype.itemsize()
    }

    /// Size in bytes of the elements addressed by this handle.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.numel() * self.element_size()
    }

    /// Returns true for real floating point dtypes.
    pub fn is_floating_point(&self) -> bool {
        self.dtype.is_floating_point()
    }

    /// Returns true for dtypes that can hold negative values.
    pub fn is_signed(&self) -> bool {
        self.dtype.is_signed()
    }

    /// Returns true for complex dtypes.
    pub fn is_complex(&self) -> bool {
        self.dtype.is_complex()
    }

    // --- identity and lifetime ---

    /// Returns true if both handles address the same storage with the same geometry
    /// and dtype.
    ///
    /// Clones of a handle are the same tensor. A view with a different geometry, or a
    /// deep copy with equal values, is not.
    pub fn is_same(&self, other: &Tensor) -> bool {
        self.storage.ptr_eq(&other.storage)
            && self.geometry == other.geometry
            && self.dtype == other.dtype
    }

    /// Number of strong handles sharing the storage, views included.
    pub fn use_count(&self) -> usize {
        self.storage.use_count()
    }

    /// Number of [`WeakTensor`] handles referring to the storage.
    pub fn weak_use_count(&self) -> usize {
        self.storage.weak_use_count()
    }

    /// Creates a weak handle that does not keep the storage alive.
    pub fn downgrade(&self) -> WeakTensor {
        WeakTensor {
            storage: self.storage.downgrade(),
            geometry: self.geometry.clone(),
            dtype: self.dtype,
        }
    }

    // --- data access ---

    /// Pointer to the first element addressed by this handle.
    ///
    /// For tensors created by [`Tensor::from_blob`] this is the wrapped pointer. The
    /// pointer stays valid while any strong handle over the storage is alive.
    #[inline]
    pub fn data_ptr(&self) -> *mut u8 {
        self.storage
            .data_ptr()
            .wrapping_add(self.storage_offset() * self.element_size())
    }

    /// Typed pointer to the first element addressed by this handle.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::DTypeMismatch`] if `T` does not match the dtype.
    pub fn data_ptr_as<T: Element>(&self) -> Result<*mut T, TensorError> {
        self.check_dtype::<T>()?;
        Ok(self.data_ptr() as *mut T)
    }

    fn check_slice_access<T: Element>(&self) -> Result<(), TensorError> {
        self.check_dtype::<T>()?;
        if !self.is_contiguous() {
            return Err(TensorError::NonContiguous(
                "slice access needs a contiguous tensor; call contiguous() first".to_string(),
            ));
        }
        if self.numel() > 0 && self.data_ptr() as usize % std::mem::align_of::<T>() != 0 {
            return Err(TensorError::invalid_argument(format!(
                "data pointer is not aligned for {}",
                self.dtype
            )));
        }
        Ok(())
    }

    /// Returns the elements of a contiguous tensor as a slice.
    ///
    /// # Errors
    ///
    /// - [`TensorError::DTypeMismatch`] if `T` does not match the dtype.
    /// - [`TensorError::NonContiguous`] if the tensor is not contiguous.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], TensorError> {
        self.check_slice_access::<T>()?;
        if self.numel() == 0 {
            return Ok(&[]);
        }
        // SAFETY: the geometry is contiguous and lies within the storage, the pointer
        // is aligned and non-null for a non-empty tensor.
        Ok(unsafe { std::slice::from_raw_parts(self.data_ptr() as *const T, self.numel()) })
    }

    /// Returns the elements of a contiguous tensor as a mutable slice.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`as_slice`](Tensor::as_slice), returns
    /// [`TensorError::SharedStorage`] if any other handle refers to the storage.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T], TensorError> {
        self.check_slice_access::<T>()?;
        if !self.storage.is_unique() {
            return Err(TensorError::SharedStorage(self.use_count()));
        }
        if self.numel() == 0 {
            return Ok(&mut []);
        }
        // SAFETY: as in as_slice, plus this handle is the only one over the storage.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.data_ptr() as *mut T, self.numel()) })
    }

    /// Copies the elements into a vector in row-major logical order.
    ///
    /// Works for any geometry, following the strides of views.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        self.check_dtype::<T>()?;
        Ok(self
            .geometry
            .offsets()
            // SAFETY: every offset produced by the geometry lies within the storage
            .map(|offset| unsafe { self.element_ptr::<T>(offset).read_unaligned() })
            .collect())
    }

    /// Iterates over the elements as dtype-erased scalars in row-major logical order.
    pub fn iter_scalars(&self) -> Box<dyn Iterator<Item = Scalar> + '_> {
        dispatch_dtype!(self.dtype, |T| Box::new(
            self.geometry
                .offsets()
                // SAFETY: every offset produced by the geometry lies within the storage
                .map(move |offset| unsafe { self.element_ptr::<T>(offset).read_unaligned() }
                    .to_scalar())
        ) as Box<dyn Iterator<Item = Scalar> + '_>)
    }

    /// Copies the elements into dtype-erased scalars in row-major logical order.
    pub fn to_scalars(&self) -> Vec<Scalar> {
        self.iter_scalars().collect()
    }

    /// Reads the element at a multi-dimensional index.
    ///
    /// # Errors
    ///
    /// - [`TensorError::DTypeMismatch`] if `T` does not match the dtype.
    /// - [`TensorError::IndexError`] if the index is out of bounds.
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T, TensorError> {
        self.check_dtype::<T>()?;
        let offset = self.geometry.offset_of(index).ok_or_else(|| {
            let position = index
                .iter()
                .zip(self.sizes())
                .position(|(i, size)| i >= size)
                .unwrap_or(0);
            TensorError::index_error(
                index.get(position).map_or(0, |&i| i as i64),
                self.sizes().get(position).copied().unwrap_or(0),
            )
        })?;
        // SAFETY: offset_of only returns offsets inside the geometry
        Ok(unsafe { self.element_ptr::<T>(offset).read_unaligned() })
    }

    /// Returns the single element of a one-element tensor converted to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the tensor does not hold exactly one
    /// element.
    pub fn item<T: Element>(&self) -> Result<T, TensorError> {
        if self.numel() != 1 {
            return Err(TensorError::shape_mismatch(
                "item() needs a tensor with one element",
                &[1],
                self.sizes(),
            ));
        }
        let offset = self.storage_offset();
        let value = dispatch_dtype!(self.dtype, |S| {
            // SAFETY: a one-element tensor addresses exactly its offset
            unsafe { self.element_ptr::<S>(offset).read_unaligned() }.to_scalar()
        });
        Ok(T::from_scalar(value))
    }

    /// Returns true if both tensors have the same sizes and equal elements.
    ///
    /// Elements are compared after conversion to [`Scalar`], so tensors of different
    /// dtypes compare by value.
    pub fn equal(&self, other: &Tensor) -> bool {
        self.sizes() == other.sizes() && self.iter_scalars().eq(other.iter_scalars())
    }

    // --- in-place operations ---

    pub(crate) fn write_scalars(&mut self, values: impl Iterator<Item = Scalar>) {
        let offsets = self.geometry.offsets();
        dispatch_dtype!(self.dtype, |T| {
            for (offset, value) in offsets.zip(values) {
                // SAFETY: every offset produced by the geometry lies within the storage;
                // the caller holds the handle mutably.
                unsafe { self.element_ptr::<T>(offset).write_unaligned(T::from_scalar(value)) };
            }
        })
    }

    /// Sets every element addressed by this handle to `value`, converted to the dtype.
    pub fn fill_(&mut self, value: impl Into<Scalar>) -> Result<&mut Self, TensorError> {
        let value = value.into();
        let numel = self.numel();
        self.write_scalars(std::iter::repeat(value).take(numel));
        Ok(self)
    }

    /// Sets every element addressed by this handle to zero.
    pub fn zero_(&mut self) -> Result<&mut Self, TensorError> {
        self.fill_(Scalar::Int(0))
    }

    /// Copies the elements of `src` into this handle, converting dtypes.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the sizes differ.
    pub fn copy_(&mut self, src: &Tensor) -> Result<&mut Self, TensorError> {
        if self.sizes() != src.sizes() {
            return Err(TensorError::shape_mismatch(
                "copy_ requires equal sizes",
                self.sizes(),
                src.sizes(),
            ));
        }
        // gathered first so overlapping source and destination are safe
        let values = src.to_scalars();
        self.write_scalars(values.into_iter());
        Ok(self)
    }

    /// Removes size-1 dimensions from this handle in place. See [`Tensor::squeeze`].
    pub fn squeeze_(&mut self, dim: Option<i64>) -> Result<&mut Self, TensorError> {
        self.geometry = shape::squeeze(&self.geometry, dim)?;
        Ok(self)
    }

    /// Inserts a size-1 dimension into this handle in place. See [`Tensor::unsqueeze`].
    pub fn unsqueeze_(&mut self, dim: i64) -> Result<&mut Self, TensorError> {
        self.geometry = shape::unsqueeze(&self.geometry, dim)?;
        Ok(self)
    }

    // --- views ---

    /// Returns a view with new sizes, failing if the strides cannot express it.
    ///
    /// At most one entry may be `-1`; it is inferred from the element count.
    ///
    /// # Errors
    ///
    /// - [`TensorError::ShapeMismatch`] if the element count does not match.
    /// - [`TensorError::NonContiguous`] if the sizes are not expressible as a view.
    pub fn view(&self, sizes: &[i64]) -> Result<Tensor, TensorError> {
        let sizes = shape::infer_size(sizes, self.numel())?;
        Ok(self.with_geometry(shape::view(&self.geometry, &sizes)?))
    }

    /// Returns a tensor with new sizes and the same elements in row-major order.
    ///
    /// The result shares storage when the strides allow it and is a fresh contiguous
    /// copy otherwise; callers must not rely on either. Use [`view`](Tensor::view) when
    /// aliasing is required.
    pub fn reshape(&self, sizes: &[i64]) -> Result<Tensor, TensorError> {
        let sizes = shape::infer_size(sizes, self.numel())?;
        if let Some(strides) =
            shape::compute_view_strides(self.sizes(), self.strides(), &sizes)
        {
            let geometry = Geometry::new(sizes, strides, self.storage_offset())?;
            return Ok(self.with_geometry(geometry));
        }
        log::debug!(
            "reshape {:?} -> {:?} is not expressible as a view, copying",
            self.sizes(),
            sizes
        );
        let contiguous = self.contiguous()?;
        Ok(contiguous.with_geometry(Geometry::contiguous(&sizes)))
    }

    /// Returns a view flattened to one dimension, or a copy if the strides require it.
    pub fn flatten(&self) -> Result<Tensor, TensorError> {
        self.reshape(&[-1])
    }

    /// Returns a view without size-1 dimensions.
    ///
    /// With `dim == None` every size-1 dimension is removed; with a dimension only that
    /// one is removed, and the view is unchanged if its size is not 1.
    pub fn squeeze(&self, dim: Option<i64>) -> Result<Tensor, TensorError> {
        Ok(self.with_geometry(shape::squeeze(&self.geometry, dim)?))
    }

    /// Returns a view with a size-1 dimension inserted at `dim`.
    pub fn unsqueeze(&self, dim: i64) -> Result<Tensor, TensorError> {
        Ok(self.with_geometry(shape::unsqueeze(&self.geometry, dim)?))
    }

    /// Returns a view with two dimensions swapped.
    pub fn transpose(&self, dim0: i64, dim1: i64) -> Result<Tensor, TensorError> {
        Ok(self.with_geometry(shape::transpose(&self.geometry, dim0, dim1)?))
    }

    /// Returns a view with dimensions reordered.
    pub fn permute(&self, dims: &[i64]) -> Result<Tensor, TensorError> {
        Ok(self.with_geometry(shape::permute(&self.geometry, dims)?))
    }

    /// Returns a view of `length` entries along `dim` starting at `start`.
    pub fn narrow(&self, dim: i64, start: i64, length: usize) -> Result<Tensor, TensorError> {
        Ok(self.with_geometry(shape::narrow(&self.geometry, dim, start, length)?))
    }

    // --- copies ---

    /// Returns this handle if contiguous, otherwise a contiguous copy.
    pub fn contiguous(&self) -> Result<Tensor, TensorError> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        self.deep_copy()
    }

    /// Copies the elements into new contiguous storage.
    ///
    /// The result never aliases this handle, so [`is_same`](Tensor::is_same) is false
    /// even though the values are equal.
    pub fn deep_copy(&self) -> Result<Tensor, TensorError> {
        let out = Tensor::allocate(self.sizes(), self.dtype, AllocInit::Uninitialized)?;
        let itemsize = self.element_size();
        let src = self.storage.data_ptr();
        let dst = out.storage.data_ptr();
        for (i, offset) in self.geometry.offsets().enumerate() {
            // SAFETY: source offsets lie within this storage, destination indices within
            // the freshly allocated one; the two allocations are distinct.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    src.add(offset * itemsize),
                    dst.add(i * itemsize),
                    itemsize,
                );
            }
        }
        Ok(out)
    }

    /// Converts the elements to another dtype.
    ///
    /// Returns this handle unchanged when the dtype already matches.
    pub fn to_dtype(&self, dtype: DType) -> Result<Tensor, TensorError> {
        if dtype == self.dtype {
            return Ok(self.clone());
        }
        let mut out = Tensor::allocate(self.sizes(), dtype, AllocInit::Uninitialized)?;
        out.copy_(self)?;
        Ok(out)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("sizes", &self.sizes())
            .field("strides", &self.strides())
            .field("offset", &self.storage_offset())
            .field("dtype", &self.dtype)
            .field("device", &self.device)
            .field("layout", &self.layout)
            .field("storage", &self.storage)
            .finish()
    }
}

/// A handle that refers to a tensor's storage without keeping it alive.
#[derive(Clone, Debug)]
pub struct WeakTensor {
    storage: WeakStorage,
    geometry: Geometry,
    dtype: DType,
}

impl WeakTensor {
    /// Returns a strong handle if the storage is still alive.
    pub fn upgrade(&self) -> Option<Tensor> {
        self.storage
            .upgrade()
            .map(|storage| Tensor::from_parts(storage, self.geometry.clone(), self.dtype))
    }

    /// Number of strong handles over the storage, zero once released.
    pub fn use_count(&self) -> usize {
        self.storage.use_count()
    }

    /// Returns true once the storage has been released.
    pub fn expired(&self) -> bool {
        self.storage.expired()
    }
}

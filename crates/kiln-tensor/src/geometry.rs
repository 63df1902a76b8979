use crate::error::TensorError;

/// Computes the strides for a row-major (C-contiguous) tensor layout.
///
/// Strides define how many elements to skip in memory to move along each dimension.
/// For row-major layout, the rightmost dimension has stride 1, and each dimension's
/// stride is the product of all dimensions to its right.
///
/// # Examples
///
/// ```rust
/// use kiln_tensor::geometry::contiguous_strides;
///
/// // For a 2x3 matrix: [[a, b, c], [d, e, f]]
/// assert_eq!(contiguous_strides(&[2, 3]), vec![3, 1]);
///
/// // For a 2x3x4 tensor
/// assert_eq!(contiguous_strides(&[2, 3, 4]), vec![12, 4, 1]);
/// ```
pub fn contiguous_strides(sizes: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; sizes.len()];
    let mut stride: usize = 1;
    for i in (0..sizes.len()).rev() {
        strides[i] = stride;
        stride = stride.saturating_mul(sizes[i].max(1));
    }
    strides
}

/// Product of the sizes, 0 if any size is 0 and 1 for rank 0.
///
/// The sizes must already be known to fit, see [`checked_numel`].
pub fn numel_of(sizes: &[usize]) -> usize {
    sizes.iter().product()
}

/// Product of the sizes, checking that a contiguous layout of them is addressable.
///
/// Zero sizes count as 1 in the check, since row-major strides skip over them.
///
/// # Errors
///
/// Returns [`TensorError::InvalidArgument`] if the sizes overflow `usize`.
pub fn checked_numel(sizes: &[usize]) -> Result<usize, TensorError> {
    sizes
        .iter()
        .try_fold(1_usize, |acc, &size| acc.checked_mul(size.max(1)))
        .ok_or_else(|| {
            TensorError::invalid_argument(format!("sizes {sizes:?} overflow the element count"))
        })?;
    Ok(numel_of(sizes))
}

/// The layout descriptor of a tensor: sizes, strides and a base offset into storage.
///
/// Strides and the offset are measured in elements, not bytes. A geometry is
/// immutable once built; shape operations derive new geometries from old ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Geometry {
    sizes: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
}

impl Geometry {
    /// Creates a geometry from explicit sizes, strides and offset.
    ///
    /// # Errors
    ///
    /// - [`TensorError::ShapeMismatch`] if sizes and strides differ in length.
    /// - [`TensorError::InvalidArgument`] if the element count or the addressed extent
    ///   overflows `usize`.
    pub fn new(sizes: Vec<usize>, strides: Vec<usize>, offset: usize) -> Result<Self, TensorError> {
        if sizes.len() != strides.len() {
            return Err(TensorError::ShapeMismatch {
                message: "sizes and strides must have the same length".to_string(),
                expected: format!("{} strides", sizes.len()),
                actual: format!("{} strides", strides.len()),
            });
        }
        checked_numel(&sizes)?;
        let last = sizes
            .iter()
            .zip(&strides)
            .try_fold(offset, |acc, (&size, &stride)| {
                size.saturating_sub(1)
                    .checked_mul(stride)
                    .and_then(|span| acc.checked_add(span))
            });
        if last.and_then(|last| last.checked_add(1)).is_none() {
            return Err(TensorError::invalid_argument(format!(
                "sizes {sizes:?} with strides {strides:?} overflow the storage extent"
            )));
        }
        Ok(Self {
            sizes,
            strides,
            offset,
        })
    }

    /// Creates a row-major geometry with offset 0.
    pub fn contiguous(sizes: &[usize]) -> Self {
        Self {
            strides: contiguous_strides(sizes),
            sizes: sizes.to_vec(),
            offset: 0,
        }
    }

    /// The size of each dimension.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// The stride of each dimension in elements.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// The offset of the first element in storage, in elements.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    /// The total number of elements.
    #[inline]
    pub fn numel(&self) -> usize {
        numel_of(&self.sizes)
    }

    /// Returns true if the strides equal the row-major strides of the sizes.
    pub fn is_contiguous(&self) -> bool {
        let mut expected_stride: usize = 1;
        for (&dim, &stride) in self.sizes.iter().rev().zip(self.strides.iter().rev()) {
            if stride != expected_stride {
                return false;
            }
            expected_stride = expected_stride.saturating_mul(dim.max(1));
        }
        true
    }

    /// Number of storage elements needed to address every element, offset included.
    ///
    /// Zero for empty tensors.
    pub fn storage_extent(&self) -> usize {
        if self.numel() == 0 {
            return 0;
        }
        let last = self
            .sizes
            .iter()
            .zip(self.strides.iter())
            .map(|(&size, &stride)| (size - 1) * stride)
            .sum::<usize>();
        self.offset + last + 1
    }

    /// Storage offset of the element at a multi-dimensional index.
    ///
    /// Returns `None` if the index rank or any coordinate is out of bounds.
    pub fn offset_of(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.rank() {
            return None;
        }
        let mut offset = self.offset;
        for ((&i, &size), &stride) in index.iter().zip(&self.sizes).zip(&self.strides) {
            if i >= size {
                return None;
            }
            offset += i * stride;
        }
        Some(offset)
    }

    /// Iterates over the storage offsets of all elements in row-major logical order.
    pub fn offsets(&self) -> OffsetIter<'_> {
        OffsetIter {
            geometry: self,
            index: vec![0; self.rank()],
            current: self.offset,
            remaining: self.numel(),
        }
    }
}

/// Iterator over storage offsets produced by [`Geometry::offsets`].
pub struct OffsetIter<'a> {
    geometry: &'a Geometry,
    index: Vec<usize>,
    current: usize,
    remaining: usize,
}

impl Iterator for OffsetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        self.remaining -= 1;

        // increment index, carrying into outer dimensions
        for dim in (0..self.index.len()).rev() {
            self.index[dim] += 1;
            self.current += self.geometry.strides[dim];
            if self.index[dim] < self.geometry.sizes[dim] {
                break;
            }
            self.current -= self.index[dim] * self.geometry.strides[dim];
            self.index[dim] = 0;
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for OffsetIter<'_> {}

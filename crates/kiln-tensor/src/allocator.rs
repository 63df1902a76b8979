use std::alloc;
use std::alloc::Layout;

use thiserror::Error;

/// Alignment in bytes used for every buffer handed out by [`CpuAllocator`].
pub const DEFAULT_ALIGNMENT: usize = 64;

/// An error type for tensor allocator operations.
#[derive(Debug, Error, PartialEq)]
pub enum TensorAllocatorError {
    /// The requested size and alignment do not form a valid layout.
    #[error("Invalid tensor layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The system allocator returned a null pointer.
    #[error("Null pointer")]
    NullPointer,
}

impl TensorAllocatorError {
    /// Returns true if the error means the allocator ran out of memory.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::NullPointer)
    }
}

/// A trait for allocating and deallocating memory for tensors.
///
/// # Safety
///
/// The tensor allocator must be thread-safe.
///
/// # Methods
///
/// * `alloc` - Allocates uninitialized memory for a tensor with the given layout.
/// * `alloc_zeroed` - Allocates zero-filled memory for a tensor with the given layout.
/// * `dealloc` - Deallocates memory for a tensor with the given layout.
pub trait TensorAllocator: Clone + Send + Sync {
    /// Allocates uninitialized memory for a tensor with the given layout.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError>;

    /// Allocates zero-filled memory for a tensor with the given layout.
    fn alloc_zeroed(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError>;

    /// Deallocates memory for a tensor with the given layout.
    fn dealloc(&self, ptr: *mut u8, layout: Layout);
}

#[derive(Clone, Copy, Debug, Default)]
/// A tensor allocator that uses the system allocator.
pub struct CpuAllocator;

impl CpuAllocator {
    /// Builds the layout used for a buffer of `nbytes` bytes.
    ///
    /// Zero-sized requests are rounded up to one byte so the system allocator is never
    /// asked for an empty block.
    pub fn layout_for(nbytes: usize) -> Result<Layout, TensorAllocatorError> {
        Layout::from_size_align(nbytes.max(1), DEFAULT_ALIGNMENT)
            .map_err(TensorAllocatorError::LayoutError)
    }
}

impl TensorAllocator for CpuAllocator {
    /// Allocates memory for a tensor with the given layout.
    ///
    /// # Arguments
    ///
    /// * `layout` - The layout of the tensor.
    ///
    /// # Returns
    ///
    /// A non-null pointer to the allocated memory if successful, otherwise an error.
    fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError> {
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            Err(TensorAllocatorError::NullPointer)?
        }
        Ok(ptr)
    }

    fn alloc_zeroed(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError> {
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            Err(TensorAllocatorError::NullPointer)?
        }
        Ok(ptr)
    }

    /// Deallocates memory for a tensor with the given layout.
    ///
    /// # Arguments
    ///
    /// * `ptr` - A non-null pointer to the allocated memory.
    /// * `layout` - The layout of the tensor.
    ///
    /// # Safety
    ///
    /// The pointer must be non-null and the layout must be correct.
    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if !ptr.is_null() {
            unsafe { alloc::dealloc(ptr, layout) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_allocator() -> Result<(), TensorAllocatorError> {
        let allocator = CpuAllocator;
        let layout = CpuAllocator::layout_for(1024)?;
        let ptr = allocator.alloc(layout)?;
        assert_eq!(ptr as usize % DEFAULT_ALIGNMENT, 0);
        allocator.dealloc(ptr, layout);
        Ok(())
    }

    #[test]
    fn test_cpu_allocator_zeroed() -> Result<(), TensorAllocatorError> {
        let allocator = CpuAllocator;
        let layout = CpuAllocator::layout_for(256)?;
        let ptr = allocator.alloc_zeroed(layout)?;
        let bytes = unsafe { std::slice::from_raw_parts(ptr, 256) };
        assert!(bytes.iter().all(|&b| b == 0));
        allocator.dealloc(ptr, layout);
        Ok(())
    }

    #[test]
    fn test_layout_for_empty_request() -> Result<(), TensorAllocatorError> {
        let layout = CpuAllocator::layout_for(0)?;
        assert_eq!(layout.size(), 1);
        assert_eq!(layout.align(), DEFAULT_ALIGNMENT);
        Ok(())
    }
}

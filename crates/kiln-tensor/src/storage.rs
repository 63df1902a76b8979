//! Arc-based storage management for zero-copy views and efficient sharing.
//!
//! A [`TensorStorage`] is a reference-counted, type-erased byte buffer. Every tensor
//! that views the same allocation holds a clone of the same storage, so the strong
//! count of the inner `Arc` is the number of live handles over that memory.

use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::{Arc, Weak},
};

use crate::{
    allocator::{CpuAllocator, TensorAllocator},
    error::TensorError,
};

/// How the storage initializes freshly allocated memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocInit {
    /// Every byte is set to zero.
    Zeroed,
    /// Contents are left unspecified.
    Uninitialized,
}

/// Where the bytes of a storage come from.
enum Buffer {
    /// Memory obtained from the allocator and released on drop.
    Owned {
        ptr: NonNull<u8>,
        layout: Layout,
        alloc: CpuAllocator,
    },
    /// Memory owned by someone else, never released by the storage.
    Borrowed { ptr: *mut u8 },
}

/// Inner storage implementation that holds the actual memory.
struct StorageImpl {
    buffer: Buffer,
    /// The number of addressable bytes.
    nbytes: usize,
}

impl StorageImpl {
    fn ptr(&self) -> *mut u8 {
        match &self.buffer {
            Buffer::Owned { ptr, .. } => ptr.as_ptr(),
            Buffer::Borrowed { ptr } => *ptr,
        }
    }
}

impl Drop for StorageImpl {
    fn drop(&mut self) {
        // borrowed memory stays with its external owner
        if let Buffer::Owned { ptr, layout, alloc } = &self.buffer {
            log::trace!("releasing {} bytes at {:p}", self.nbytes, ptr.as_ptr());
            alloc.dealloc(ptr.as_ptr(), *layout);
        }
    }
}

impl std::fmt::Debug for StorageImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageImpl")
            .field("ptr", &self.ptr())
            .field("nbytes", &self.nbytes)
            .field("borrowed", &matches!(self.buffer, Buffer::Borrowed { .. }))
            .finish()
    }
}

/// Arc-based tensor storage enabling zero-copy views and efficient sharing.
///
/// Clones are cheap (one atomic increment) and every clone points at the same bytes.
///
/// # Thread Safety
///
/// `TensorStorage` is `Send + Sync`: the reference counts are atomic, so handles can be
/// moved to and dropped on any thread. Reads and writes of the bytes themselves are not
/// synchronized; callers must not write through one handle while another thread reads
/// the same storage.
///
/// # Memory Management
///
/// Owned memory is released exactly once, when the last strong reference is dropped.
/// Borrowed memory (see [`TensorStorage::wrap_external`]) is never released.
pub struct TensorStorage {
    inner: Arc<StorageImpl>,
}

impl TensorStorage {
    /// Allocates storage for `element_count` elements of `element_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte size overflows or memory allocation fails.
    pub fn allocate(
        element_count: usize,
        element_size: usize,
        init: AllocInit,
    ) -> Result<Self, TensorError> {
        let nbytes = element_count.checked_mul(element_size).ok_or_else(|| {
            TensorError::invalid_argument(format!(
                "storage of {element_count} elements of {element_size} bytes overflows"
            ))
        })?;
        let alloc = CpuAllocator;
        let layout = CpuAllocator::layout_for(nbytes)?;
        let raw_ptr = match init {
            AllocInit::Zeroed => alloc.alloc_zeroed(layout)?,
            AllocInit::Uninitialized => alloc.alloc(layout)?,
        };
        let ptr = NonNull::new(raw_ptr).ok_or(TensorError::StorageError(
            crate::allocator::TensorAllocatorError::NullPointer,
        ))?;
        log::trace!("allocated {nbytes} bytes at {raw_ptr:p} ({init:?})");

        Ok(Self {
            inner: Arc::new(StorageImpl {
                buffer: Buffer::Owned { ptr, layout, alloc },
                nbytes,
            }),
        })
    }

    /// Allocates storage and copies `bytes` into it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TensorError> {
        let storage = Self::allocate(bytes.len(), 1, AllocInit::Uninitialized)?;
        // SAFETY: the destination was just allocated with room for bytes.len() bytes
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), storage.data_ptr(), bytes.len());
        }
        Ok(storage)
    }

    /// Wraps externally owned memory without taking ownership of it.
    ///
    /// The storage never frees `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` is valid for reads and writes of `element_count * element_size` bytes
    /// - the memory outlives every handle derived from the returned storage
    /// - nothing else frees or moves the memory while such handles exist
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::InvalidArgument`] if `ptr` is null while
    /// `element_count > 0`.
    pub unsafe fn wrap_external(
        ptr: *mut u8,
        element_count: usize,
        element_size: usize,
    ) -> Result<Self, TensorError> {
        if ptr.is_null() && element_count > 0 {
            return Err(TensorError::invalid_argument(
                "cannot wrap a null external buffer holding elements",
            ));
        }
        let nbytes = element_count.checked_mul(element_size).ok_or_else(|| {
            TensorError::invalid_argument("external buffer byte size overflows")
        })?;
        log::debug!("wrapping external buffer at {ptr:p} ({nbytes} bytes)");
        Ok(Self {
            inner: Arc::new(StorageImpl {
                buffer: Buffer::Borrowed { ptr },
                nbytes,
            }),
        })
    }

    /// Returns the pointer to the first byte of the storage.
    ///
    /// The pointer is valid while at least one strong reference exists. Writing through
    /// it requires that no other handle is reading the same bytes concurrently.
    #[inline]
    pub fn data_ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the number of bytes in the storage.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.inner.nbytes
    }

    /// Returns true if the storage holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.nbytes == 0
    }

    /// Returns true if the memory is owned by someone else.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.inner.buffer, Buffer::Borrowed { .. })
    }

    /// Number of strong references to this storage.
    #[inline]
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Number of weak references to this storage.
    #[inline]
    pub fn weak_use_count(&self) -> usize {
        Arc::weak_count(&self.inner)
    }

    /// Returns true if this storage is uniquely owned (no other strong or weak references).
    ///
    /// This is the condition under which handing out a mutable slice is sound.
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1 && Arc::weak_count(&self.inner) == 0
    }

    /// Returns true if both storages refer to the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a weak reference that does not keep the memory alive.
    pub fn downgrade(&self) -> WeakStorage {
        WeakStorage {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

// SAFETY: the raw pointers inside are only dereferenced through tensor accessors whose
// contracts require the caller to coordinate writes; reference counting is atomic.
unsafe impl Send for StorageImpl {}
// SAFETY: see the Send impl above.
unsafe impl Sync for StorageImpl {}

impl Clone for TensorStorage {
    /// Creates a cheap clone by incrementing the Arc reference count.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for TensorStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorStorage")
            .field("inner", &self.inner)
            .field("use_count", &self.use_count())
            .field("weak_use_count", &self.weak_use_count())
            .finish()
    }
}

/// A non-owning reference to a [`TensorStorage`].
#[derive(Clone, Debug)]
pub struct WeakStorage {
    inner: Weak<StorageImpl>,
}

impl WeakStorage {
    /// Returns the storage if at least one strong reference is still alive.
    pub fn upgrade(&self) -> Option<TensorStorage> {
        self.inner.upgrade().map(|inner| TensorStorage { inner })
    }

    /// Number of strong references to the storage, zero once it has been released.
    pub fn use_count(&self) -> usize {
        self.inner.strong_count()
    }

    /// Returns true once the storage has been released.
    pub fn expired(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_allocate_zeroed() -> Result<(), TensorError> {
        let storage = TensorStorage::allocate(10, 4, AllocInit::Zeroed)?;
        assert_eq!(storage.nbytes(), 40);
        assert!(!storage.is_empty());
        assert!(!storage.is_borrowed());
        let bytes = unsafe { std::slice::from_raw_parts(storage.data_ptr(), 40) };
        assert!(bytes.iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_storage_allocate_empty() -> Result<(), TensorError> {
        let storage = TensorStorage::allocate(0, 8, AllocInit::Uninitialized)?;
        assert!(storage.is_empty());
        assert!(!storage.data_ptr().is_null());
        Ok(())
    }

    #[test]
    fn test_storage_overflow() {
        let res = TensorStorage::allocate(usize::MAX, 2, AllocInit::Zeroed);
        assert!(matches!(res, Err(TensorError::InvalidArgument(_))));
    }

    #[test]
    fn test_storage_from_bytes() -> Result<(), TensorError> {
        let storage = TensorStorage::from_bytes(&[1, 2, 3, 4])?;
        let bytes = unsafe { std::slice::from_raw_parts(storage.data_ptr(), 4) };
        assert_eq!(bytes, &[1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_storage_cheap_clone() -> Result<(), TensorError> {
        let storage1 = TensorStorage::allocate(4, 1, AllocInit::Zeroed)?;
        assert!(storage1.is_unique());
        assert_eq!(storage1.use_count(), 1);

        let storage2 = storage1.clone();
        assert_eq!(storage1.use_count(), 2);
        assert!(storage1.ptr_eq(&storage2));
        assert_eq!(storage1.data_ptr(), storage2.data_ptr());
        assert!(!storage1.is_unique());

        drop(storage2);
        assert_eq!(storage1.use_count(), 1);
        Ok(())
    }

    #[test]
    fn test_storage_weak_counts() -> Result<(), TensorError> {
        let storage = TensorStorage::allocate(4, 1, AllocInit::Zeroed)?;
        let weak = storage.downgrade();
        assert_eq!(storage.use_count(), 1);
        assert_eq!(storage.weak_use_count(), 1);
        assert!(!storage.is_unique());

        let upgraded = weak.upgrade().ok_or(TensorError::invalid_argument("expired"))?;
        assert_eq!(storage.use_count(), 2);
        drop(upgraded);
        drop(storage);

        assert!(weak.expired());
        assert!(weak.upgrade().is_none());
        Ok(())
    }

    #[test]
    fn test_storage_wrap_external() -> Result<(), TensorError> {
        let mut data = vec![1_u8, 2, 3, 4];
        {
            let storage = unsafe { TensorStorage::wrap_external(data.as_mut_ptr(), 4, 1)? };
            assert!(storage.is_borrowed());
            assert_eq!(storage.data_ptr(), data.as_mut_ptr());
            unsafe { *storage.data_ptr() = 9 };
        }
        // dropping the storage left the vector intact
        assert_eq!(data, vec![9, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_storage_wrap_null() {
        let res = unsafe { TensorStorage::wrap_external(std::ptr::null_mut(), 3, 4) };
        assert!(matches!(res, Err(TensorError::InvalidArgument(_))));

        let empty = unsafe { TensorStorage::wrap_external(std::ptr::null_mut(), 0, 4) };
        assert!(empty.is_ok());
    }
}

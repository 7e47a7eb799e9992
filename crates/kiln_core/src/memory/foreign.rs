//! # Foreign Buffer
//!
//! A scoped allocation on the native engine's heap.

#![allow(unsafe_code)]

use bytemuck::Pod;
use std::ptr::NonNull;

use crate::error::{KilnError, KilnResult};
use crate::native::PhysicsNative;

/// A native-heap copy of a slice, freed when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let points = ForeignBuffer::copy_from(native, &positions)?;
/// let tris = ForeignBuffer::copy_from(native, &indices)?; // `points` freed if this fails
/// native.cook(mode, &desc, &params);
/// // both freed here
/// ```
pub struct ForeignBuffer<'n> {
    /// Engine that owns the heap.
    native: &'n dyn PhysicsNative,
    /// Start of the allocation.
    ptr: NonNull<u8>,
    /// Allocated size in bytes (never zero).
    size: usize,
    /// Alignment the allocation was made with.
    align: usize,
    /// Number of `T` elements copied in.
    len: usize,
}

impl<'n> ForeignBuffer<'n> {
    /// Allocates native memory and copies `src` into it.
    ///
    /// Empty slices still get a minimal allocation so the pointer is always valid.
    ///
    /// # Errors
    ///
    /// [`KilnError::AllocationFailure`] when the engine returns null.
    pub fn copy_from<T: Pod>(native: &'n dyn PhysicsNative, src: &[T]) -> KilnResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(src);
        let align = std::mem::align_of::<T>();
        let size = bytes.len().max(align);

        let ptr = NonNull::new(native.alloc(size, align))
            .ok_or(KilnError::AllocationFailure { bytes: size })?;
        debug_assert_eq!(
            ptr.as_ptr() as usize % align,
            0,
            "native heap returned a misaligned block"
        );

        // SAFETY: `ptr` is a fresh allocation of `size >= bytes.len()` bytes that
        // cannot overlap `src`, which lives on the Rust heap or stack.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        }

        Ok(Self {
            native,
            ptr,
            size,
            align,
            len: src.len(),
        })
    }

    /// Start of the buffer in native memory.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Number of elements copied in.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no elements were copied in.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes allocated on the native heap.
    #[inline]
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size
    }
}

impl Drop for ForeignBuffer<'_> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `alloc(size, align)` on this engine and is
        // freed exactly once, here.
        unsafe {
            self.native.free(self.ptr.as_ptr(), self.size, self.align);
        }
    }
}

impl std::fmt::Debug for ForeignBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignBuffer")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNative;

    #[test]
    fn test_copy_and_free() {
        let native = MockNative::new();
        {
            let data = [1.0f32, 2.0, 3.0];
            let buffer = ForeignBuffer::copy_from(&native, &data).unwrap();
            assert_eq!(buffer.len(), 3);
            assert_eq!(buffer.size_bytes(), 12);
            assert_eq!(native.live_allocations(), 1);

            // SAFETY: the buffer holds exactly three f32s.
            let copied = unsafe { std::slice::from_raw_parts(buffer.as_ptr().cast::<f32>(), 3) };
            assert_eq!(copied, &data);
        }
        assert_eq!(native.live_allocations(), 0);
    }

    #[test]
    fn test_empty_slice_still_allocates() {
        let native = MockNative::new();
        let buffer = ForeignBuffer::copy_from::<u32>(&native, &[]).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 4);
        drop(buffer);
        assert_eq!(native.live_allocations(), 0);
    }

    #[test]
    fn test_exhausted_heap() {
        let native = MockNative::new().with_allocation_budget(0);
        let err = ForeignBuffer::copy_from(&native, &[1u16, 2, 3]).unwrap_err();
        assert_eq!(err, KilnError::AllocationFailure { bytes: 6 });
        assert_eq!(native.live_allocations(), 0);
    }
}

//! # Native Engine Interface
//!
//! The seam between the cache and the physics engine that owns cooked meshes.
//!
//! ```text
//! kiln_core defines:        engine implements:
//! ┌────────────────────┐    ┌────────────────────┐
//! │ trait PhysicsNative│ ←─ │ impl PhysicsNative │
//! └────────────────────┘    └────────────────────┘
//! ```
//!
//! The engine has its own heap. Buffers passed to [`PhysicsNative::cook`] must
//! live on that heap, which is why allocation is part of the interface.
//!
//! [`read_points`] and [`read_triangles`] decode a [`MeshDesc`] on the engine
//! side. Every engine reads the descriptor through them.

#![allow(unsafe_code)]

use kiln_shared::{CookMode, CookingParams, IndexWidth, MeshDesc};
use std::ffi::c_void;
use std::ptr::NonNull;

/// Opaque pointer to a cooked mesh owned by the native engine.
///
/// Copying the pointer does not copy ownership: the cache that cooked it is the
/// only place that may hand it back to [`PhysicsNative::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeMesh(NonNull<c_void>);

// SAFETY: the pointer is an opaque token. The cache serializes its release
// behind a mutex, and engines are required to be `Send + Sync`.
unsafe impl Send for NativeMesh {}
// SAFETY: see above; shared access never dereferences the pointer.
unsafe impl Sync for NativeMesh {}

impl NativeMesh {
    /// Wraps a pointer returned by the engine. `None` for null.
    #[inline]
    #[must_use]
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The raw pointer, for passing back to the engine.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// A physics engine that can cook meshes from its own heap.
pub trait PhysicsNative: Send + Sync {
    /// Allocates `size` bytes aligned to `align` on the native heap.
    ///
    /// Returns null when the heap is exhausted.
    fn alloc(&self, size: usize, align: usize) -> *mut u8;

    /// Frees a native allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`alloc`](PhysicsNative::alloc) on this engine with
    /// the same `size` and `align`, and must not have been freed already.
    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize);

    /// Cooks the described mesh. Returns `None` when the engine rejects it.
    ///
    /// # Safety
    ///
    /// Every pointer in `desc` must be readable for the extent it describes
    /// until this call returns.
    unsafe fn cook(
        &self,
        mode: CookMode,
        desc: &MeshDesc,
        params: &CookingParams,
    ) -> Option<NativeMesh>;

    /// Releases a cooked mesh.
    ///
    /// # Safety
    ///
    /// `mesh` must come from [`cook`](PhysicsNative::cook) on this engine and
    /// must not have been released already.
    unsafe fn release(&self, mesh: NativeMesh);
}

// ============================================================================
// DESCRIPTOR DECODING
// ============================================================================

/// Reads the points of `desc`. Empty when `desc.points` is null.
///
/// # Safety
///
/// `desc.points` must be null or readable for `point_count` entries of
/// `point_stride` bytes.
#[must_use]
pub unsafe fn read_points(desc: &MeshDesc) -> Vec<[f32; 3]> {
    if desc.points.is_null() {
        return Vec::new();
    }
    let base = desc.points.cast::<u8>();
    let stride = desc.point_stride as usize;
    (0..desc.point_count as usize)
        .map(|i| unsafe { base.add(i * stride).cast::<[f32; 3]>().read_unaligned() })
        .collect()
}

/// Reads the triangles of `desc`, widened to `u32`. Empty when
/// `desc.triangles` is null.
///
/// # Safety
///
/// `desc.triangles` must be null or readable for `triangle_count` entries of
/// `triangle_stride` bytes.
#[must_use]
pub unsafe fn read_triangles(desc: &MeshDesc) -> Vec<[u32; 3]> {
    if desc.triangles.is_null() {
        return Vec::new();
    }
    let base = desc.triangles.cast::<u8>();
    let stride = desc.triangle_stride as usize;
    (0..desc.triangle_count as usize)
        .map(|t| {
            let tri = unsafe { base.add(t * stride) };
            match desc.index_width {
                IndexWidth::U16 => {
                    unsafe { tri.cast::<[u16; 3]>().read_unaligned() }.map(u32::from)
                }
                IndexWidth::U32 => unsafe { tri.cast::<[u32; 3]>().read_unaligned() },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_points_honours_stride() {
        // 16-byte stride: each point is followed by one float of padding
        let data = [1.0f32, 2.0, 3.0, -1.0, 4.0, 5.0, 6.0, -1.0];
        let mut desc = MeshDesc::points_only(data.as_ptr(), 2);
        desc.point_stride = 16;
        // SAFETY: `desc` describes `data`.
        let points = unsafe { read_points(&desc) };
        assert_eq!(points, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_read_triangles_widens_u16() {
        let points = [0.0f32; 9];
        let indices: [u16; 6] = [0, 1, 2, 2, 1, 0];
        let desc = MeshDesc::points_only(points.as_ptr(), 3).with_triangles(
            indices.as_ptr().cast(),
            2,
            IndexWidth::U16,
        );
        // SAFETY: `desc` describes `points` and `indices`.
        let triangles = unsafe { read_triangles(&desc) };
        assert_eq!(triangles, vec![[0, 1, 2], [2, 1, 0]]);
    }

    #[test]
    fn test_null_buffers_read_empty() {
        let desc = MeshDesc::points_only(std::ptr::null(), 4);
        // SAFETY: null pointers are never dereferenced.
        assert!(unsafe { read_points(&desc) }.is_empty());
        assert!(unsafe { read_triangles(&desc) }.is_empty());
    }

    #[test]
    fn test_null_is_not_a_mesh() {
        assert!(NativeMesh::from_raw(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_pointer_round_trip() {
        let mut slot = 0u8;
        let raw = std::ptr::addr_of_mut!(slot).cast::<c_void>();
        let mesh = NativeMesh::from_raw(raw).unwrap();
        assert_eq!(mesh.as_ptr(), raw);
    }
}

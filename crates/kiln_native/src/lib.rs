//! # KILN Native
//!
//! The physics-engine side of the cooking boundary, backed by parry (through
//! `rapier3d`).
//!
//! ```text
//! kiln_core::MeshCache ──PhysicsNative──> ParryNative ──C ABI──> kn_alloc / kn_free
//!                                                               kn_cook_mesh
//!                                                               kn_mesh_release
//! ```
//!
//! [`ParryNative`] is the in-process engine handed to the cache. The `kn_*`
//! functions in [`ffi`] are the same engine exported for non-Rust hosts.
//!
//! ## Example
//!
//! ```rust,ignore
//! let cache = MeshCache::new(Arc::new(ParryNative::new()), CookingParams::default());
//! let mut handle = cache.acquire(&geometry, CookMode::Convex)?;
//!
//! let shape = unsafe { kiln_native::shared_shape(handle.mesh().unwrap()) };
//! let collider = ColliderBuilder::new(shape).build();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod cook;
pub mod ffi;

use kiln_core::{CookMode, CookingParams, NativeMesh, PhysicsNative};
use kiln_shared::MeshDesc;
use rapier3d::parry::shape::SharedShape;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub use cook::CookedMesh;

/// Counters of one [`ParryNative`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NativeStats {
    /// Foreign buffers currently allocated.
    pub live_allocations: usize,
    /// Cooked meshes not yet released.
    pub live_meshes: usize,
    /// Cook calls made.
    pub cooks: u64,
    /// Cook calls that produced no mesh.
    pub rejected: u64,
}

/// Parry-backed [`PhysicsNative`].
#[derive(Debug, Default)]
pub struct ParryNative {
    live_allocations: AtomicUsize,
    live_meshes: AtomicUsize,
    cooks: AtomicU64,
    rejected: AtomicU64,
}

impl ParryNative {
    /// Creates an engine with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> NativeStats {
        NativeStats {
            live_allocations: self.live_allocations.load(Ordering::Acquire),
            live_meshes: self.live_meshes.load(Ordering::Acquire),
            cooks: self.cooks.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
        }
    }
}

#[allow(unsafe_code)]
impl PhysicsNative for ParryNative {
    fn alloc(&self, size: usize, align: usize) -> *mut u8 {
        let ptr = ffi::kn_alloc(size, align);
        if !ptr.is_null() {
            self.live_allocations.fetch_add(1, Ordering::AcqRel);
        }
        ptr
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize) {
        self.live_allocations.fetch_sub(1, Ordering::AcqRel);
        unsafe { ffi::kn_free(ptr, size, align) };
    }

    unsafe fn cook(
        &self,
        mode: CookMode,
        desc: &MeshDesc,
        params: &CookingParams,
    ) -> Option<NativeMesh> {
        self.cooks.fetch_add(1, Ordering::AcqRel);
        let raw = unsafe { ffi::kn_cook_mesh(mode.as_raw(), desc, params) };
        match NativeMesh::from_raw(raw) {
            Some(mesh) => {
                self.live_meshes.fetch_add(1, Ordering::AcqRel);
                Some(mesh)
            }
            None => {
                self.rejected.fetch_add(1, Ordering::AcqRel);
                None
            }
        }
    }

    unsafe fn release(&self, mesh: NativeMesh) {
        self.live_meshes.fetch_sub(1, Ordering::AcqRel);
        unsafe { ffi::kn_mesh_release(mesh.as_ptr()) };
    }
}

/// The cooked mesh behind `mesh`.
///
/// # Safety
///
/// `mesh` must come from a [`ParryNative`] (or `kn_cook_mesh`) and must be
/// live for the duration of the call.
#[allow(unsafe_code)]
#[must_use]
pub unsafe fn cooked_mesh<'m>(mesh: NativeMesh) -> &'m CookedMesh {
    unsafe { &*mesh.as_ptr().cast::<CookedMesh>() }
}

/// The parry shape behind `mesh`, ready to attach to a collider.
///
/// The returned shape is reference counted and stays valid after the mesh is
/// released.
///
/// # Safety
///
/// Same contract as [`cooked_mesh`].
#[allow(unsafe_code)]
#[must_use]
pub unsafe fn shared_shape(mesh: NativeMesh) -> SharedShape {
    unsafe { cooked_mesh(mesh) }.shape().clone()
}

//! C-compatible entry points of the native cooking engine.
//!
//! Every function reports failure with a null pointer or zero; panics are
//! caught at the boundary and never unwind into the caller.

#![allow(unsafe_code)]

use kiln_shared::{CookMode, CookingParams, MeshDesc};
use std::alloc::Layout;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::cook::{self, CookedMesh};

/// Allocates `size` bytes aligned to `align` on the native heap.
///
/// Returns null for a zero size, an invalid alignment or an exhausted heap.
#[no_mangle]
pub extern "C" fn kn_alloc(size: usize, align: usize) -> *mut u8 {
    match Layout::from_size_align(size, align) {
        // SAFETY: the layout has a non-zero size.
        Ok(layout) if layout.size() > 0 => unsafe { std::alloc::alloc(layout) },
        _ => std::ptr::null_mut(),
    }
}

/// Frees a buffer from [`kn_alloc`].
///
/// # Safety
/// `ptr` must come from `kn_alloc(size, align)` and must not have been freed.
#[no_mangle]
pub unsafe extern "C" fn kn_free(ptr: *mut u8, size: usize, align: usize) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        std::alloc::dealloc(ptr, Layout::from_size_align_unchecked(size, align));
    }
}

/// Cooks a mesh. Returns an opaque mesh pointer, or null when the geometry is
/// rejected, the mode is unknown or cooking panicked.
///
/// # Safety
/// `desc` and `params` must be valid pointers, and every pointer inside `desc`
/// must be readable for the extent it describes until this call returns.
#[no_mangle]
pub unsafe extern "C" fn kn_cook_mesh(
    mode: u32,
    desc: *const MeshDesc,
    params: *const CookingParams,
) -> *mut c_void {
    let Some(mode) = CookMode::from_raw(mode) else {
        tracing::error!(mode, "unknown cook mode");
        return std::ptr::null_mut();
    };
    if desc.is_null() || params.is_null() {
        return std::ptr::null_mut();
    }
    let (desc, params) = unsafe { (&*desc, &*params) };

    match catch_unwind(AssertUnwindSafe(|| unsafe { cook::cook(mode, desc, params) })) {
        Ok(Some(mesh)) => Box::into_raw(Box::new(mesh)).cast(),
        Ok(None) => std::ptr::null_mut(),
        Err(_) => {
            tracing::error!(%mode, points = desc.point_count, "native cook panicked");
            std::ptr::null_mut()
        }
    }
}

/// Destroys a mesh from [`kn_cook_mesh`].
///
/// # Safety
/// `mesh` must come from `kn_cook_mesh` and must not have been released.
#[no_mangle]
pub unsafe extern "C" fn kn_mesh_release(mesh: *mut c_void) {
    if mesh.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(mesh.cast::<CookedMesh>()));
    }
}

/// Vertices of a cooked mesh, 0 for null.
///
/// # Safety
/// `mesh` must be null or a live pointer from `kn_cook_mesh`.
#[no_mangle]
pub unsafe extern "C" fn kn_mesh_vertex_count(mesh: *const c_void) -> u32 {
    unsafe { mesh.cast::<CookedMesh>().as_ref() }.map_or(0, CookedMesh::vertex_count)
}

/// Triangles of a cooked mesh, 0 for null.
///
/// # Safety
/// `mesh` must be null or a live pointer from `kn_cook_mesh`.
#[no_mangle]
pub unsafe extern "C" fn kn_mesh_triangle_count(mesh: *const c_void) -> u32 {
    unsafe { mesh.cast::<CookedMesh>().as_ref() }.map_or(0, CookedMesh::triangle_count)
}

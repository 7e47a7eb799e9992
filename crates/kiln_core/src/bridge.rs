//! # Cooking Bridge
//!
//! Copies normalized buffers onto the native heap and calls the cook routine.
//!
//! ```text
//! GeometryBuffers ──> contract checks ──> ForeignBuffer (points)
//!                                         ForeignBuffer (triangles, mesh mode)
//!                                                │
//!                                                ▼
//!                                  PhysicsNative::cook(mode, MeshDesc, params)
//!                                                │
//!                      guards dropped ◄──────────┘  (success or failure)
//! ```
//!
//! Contract checks run before the first allocation, so a rejected input never
//! touches the native heap.

#![allow(unsafe_code)]

use kiln_shared::{CookMode, CookingParams, MeshDesc};

use crate::error::{KilnError, KilnResult};
use crate::memory::ForeignBuffer;
use crate::native::{NativeMesh, PhysicsNative};
use crate::normalize::{GeometryBuffers, IndexBuffer};

/// Cooks `buffers` on `native`.
///
/// `params` belong to the physics world and are passed through untouched.
///
/// # Errors
///
/// - [`KilnError::InvalidGeometry`]: mesh mode without indices, an index past
///   the last vertex, or counts that overflow the ABI.
/// - [`KilnError::AllocationFailure`]: the native heap refused a buffer.
/// - [`KilnError::CookingFailed`]: the engine rejected the geometry.
pub fn cook(
    native: &dyn PhysicsNative,
    buffers: &GeometryBuffers<'_>,
    mode: CookMode,
    params: &CookingParams,
) -> KilnResult<NativeMesh> {
    let vertex_count = buffers.vertex_count();
    let point_count = abi_count(vertex_count, "vertices")?;

    let indices = if mode.uses_indices() {
        let indices = buffers
            .indices
            .as_ref()
            .ok_or_else(|| {
                KilnError::InvalidGeometry("triangle mesh cooking requires an index buffer".into())
            })?;
        check_bounds(indices, vertex_count)?;
        Some(indices)
    } else {
        None
    };

    let points = ForeignBuffer::copy_from(native, &buffers.positions)?;
    let triangles = match indices {
        Some(indices) => {
            let buffer = match indices {
                IndexBuffer::U16(data) => ForeignBuffer::copy_from(native, &**data)?,
                IndexBuffer::U32(data) => ForeignBuffer::copy_from(native, &**data)?,
            };
            Some((buffer, indices.width()))
        }
        None => None,
    };

    let mut desc = MeshDesc::points_only(points.as_ptr().cast(), point_count);
    if let Some((buffer, width)) = &triangles {
        let triangle_count = abi_count(buffer.len() / 3, "triangles")?;
        desc = desc.with_triangles(buffer.as_ptr().cast(), triangle_count, *width);
    }

    tracing::debug!(
        %mode,
        vertices = vertex_count,
        triangles = desc.triangle_count,
        foreign_bytes = points.size_bytes() + triangles.as_ref().map_or(0, |(b, _)| b.size_bytes()),
        "invoking native cook"
    );

    // SAFETY: `desc` points into `points` and `triangles`, which are alive
    // until the end of this function.
    let cooked = unsafe { native.cook(mode, &desc, params) };

    drop(triangles);
    drop(points);

    cooked.ok_or(KilnError::CookingFailed { mode, vertex_count })
}

fn check_bounds(indices: &IndexBuffer<'_>, vertex_count: usize) -> KilnResult<()> {
    match indices.max_index() {
        Some(max) if max as usize >= vertex_count => Err(KilnError::InvalidGeometry(format!(
            "index {max} out of range for {vertex_count} vertices"
        ))),
        _ => Ok(()),
    }
}

fn abi_count(count: usize, what: &str) -> KilnResult<u32> {
    u32::try_from(count)
        .map_err(|_| KilnError::InvalidGeometry(format!("{count} {what} exceed the native limit")))
}

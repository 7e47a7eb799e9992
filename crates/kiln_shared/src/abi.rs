//! # Cooking ABI
//!
//! The C-layout types handed across the foreign-memory boundary.
//!
//! ```text
//! kiln_core (bridge)                         kiln_native
//! ┌──────────────────────┐   MeshDesc*   ┌──────────────────────┐
//! │ ForeignBuffer points │ ────────────> │ kn_cook_mesh(mode,   │
//! │ ForeignBuffer tris   │ CookingParams*│   desc, params)      │
//! └──────────────────────┘ ────────────> └──────────────────────┘
//! ```
//!
//! Pointers inside a [`MeshDesc`] refer to native-heap memory that the caller
//! keeps alive for the duration of the cook call only.

use serde::{Deserialize, Serialize};
use std::ffi::c_void;

/// Which collision representation to cook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum CookMode {
    /// Convex hull of the vertices. Indices are ignored.
    Convex = 0,
    /// Triangle mesh. Indices are required.
    TriangleMesh = 1,
}

impl CookMode {
    /// Raw ABI value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Converts from the raw ABI value.
    #[inline]
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Convex),
            1 => Some(Self::TriangleMesh),
            _ => None,
        }
    }

    /// Whether this mode reads the index buffer.
    #[inline]
    #[must_use]
    pub const fn uses_indices(self) -> bool {
        matches!(self, Self::TriangleMesh)
    }
}

impl std::fmt::Display for CookMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Convex => f.write_str("convex"),
            Self::TriangleMesh => f.write_str("triangle-mesh"),
        }
    }
}

/// Width of one index element in a [`MeshDesc`] triangle buffer.
///
/// There is no 8-bit variant: narrower encodings are widened before they cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IndexWidth {
    /// `u16` indices, 6 bytes per triangle.
    U16 = 0,
    /// `u32` indices, 12 bytes per triangle.
    U32 = 1,
}

impl IndexWidth {
    /// Bytes per index element.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Bytes per triangle (three indices).
    #[inline]
    #[must_use]
    pub const fn triangle_stride(self) -> usize {
        self.bytes() * 3
    }
}

/// Description of a mesh living in native memory.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MeshDesc {
    /// First position; `point_count` packed `[f32; 3]` entries `point_stride` bytes apart.
    pub points: *const f32,
    /// Bytes between consecutive points.
    pub point_stride: u32,
    /// Number of points.
    pub point_count: u32,
    /// First triangle, or null in convex mode.
    pub triangles: *const c_void,
    /// Bytes between consecutive triangles.
    pub triangle_stride: u32,
    /// Number of triangles (0 in convex mode).
    pub triangle_count: u32,
    /// Element width of the triangle buffer.
    pub index_width: IndexWidth,
}

impl MeshDesc {
    /// Describes a point cloud only (convex cooking).
    #[must_use]
    pub fn points_only(points: *const f32, point_count: u32) -> Self {
        Self {
            points,
            point_stride: POINT_STRIDE,
            point_count,
            triangles: std::ptr::null(),
            triangle_stride: 0,
            triangle_count: 0,
            index_width: IndexWidth::U32,
        }
    }

    /// Adds a triangle buffer of the given width.
    #[must_use]
    pub fn with_triangles(
        mut self,
        triangles: *const c_void,
        triangle_count: u32,
        width: IndexWidth,
    ) -> Self {
        self.triangles = triangles;
        self.triangle_count = triangle_count;
        // 6 or 12, always fits.
        self.triangle_stride = width.triangle_stride() as u32;
        self.index_width = width;
        self
    }
}

/// Byte stride of a packed `[f32; 3]` point.
pub const POINT_STRIDE: u32 = 12;

/// Cooking parameters owned by the physics world.
///
/// The cache passes these through untouched; only the native engine reads them.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookingParams {
    /// Total triangle area at or below which a triangle mesh is rejected as degenerate.
    pub degenerate_area: f32,
    /// Hull volume at or below which a convex cook is rejected as flat.
    pub degenerate_volume: f32,
}

impl Default for CookingParams {
    fn default() -> Self {
        Self {
            degenerate_area: 1.0e-10,
            degenerate_volume: 1.0e-12,
        }
    }
}

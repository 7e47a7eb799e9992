//! # Surface Geometry
//!
//! What the rendering side hands the cache: positions (flat or interleaved with
//! other vertex attributes), an optional triangle index buffer in any of the
//! common widths, a content identity and a bounding box.
//!
//! ## Content identity
//!
//! [`GeometryId`] is a BLAKE3 digest of the vertex positions and the widened
//! index values. The encoding does not leak into the digest: a flat buffer and
//! an interleaved buffer holding the same vertices hash identically, as do
//! `u8`/`u16`/`u32` index buffers holding the same values.

use kiln_shared::Aabb;

use crate::error::{KilnError, KilnResult};

/// Domain tag for geometry fingerprints.
const GEOMETRY_DOMAIN: &[u8] = b"kiln.geometry.v1";

// ============================================================================
// POSITIONS
// ============================================================================

/// A view of vertex positions inside a float buffer.
///
/// `stride` and `offset` are measured in floats. A flat buffer has stride 3
/// and offset 0.
#[derive(Clone, Copy, Debug)]
pub struct PositionAttribute<'a> {
    data: &'a [f32],
    stride: usize,
    offset: usize,
}

impl<'a> PositionAttribute<'a> {
    /// Tightly packed `x, y, z, x, y, z, ...`.
    #[must_use]
    pub const fn flat(data: &'a [f32]) -> Self {
        Self { data, stride: 3, offset: 0 }
    }

    /// Positions interleaved with other attributes.
    ///
    /// Each vertex occupies `stride` floats; its position starts `offset` floats in.
    #[must_use]
    pub const fn interleaved(data: &'a [f32], stride: usize, offset: usize) -> Self {
        Self { data, stride, offset }
    }

    /// The underlying buffer.
    #[inline]
    #[must_use]
    pub const fn data(&self) -> &'a [f32] {
        self.data
    }

    /// Whether the buffer is already tightly packed positions.
    #[inline]
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.stride == 3 && self.offset == 0
    }

    /// Checks that the buffer describes a whole number of vertices.
    ///
    /// # Returns
    ///
    /// The vertex count.
    pub fn validate(&self) -> KilnResult<usize> {
        if self.stride < 3 || self.offset.checked_add(3).map_or(true, |end| end > self.stride) {
            return Err(KilnError::InvalidGeometry(format!(
                "position layout cannot hold 3 components (stride {}, offset {})",
                self.stride, self.offset
            )));
        }
        if self.data.len() % self.stride != 0 {
            return Err(KilnError::InvalidGeometry(format!(
                "{} floats is not a whole number of {}-float vertices",
                self.data.len(),
                self.stride
            )));
        }
        Ok(self.data.len() / self.stride)
    }

    /// Iterates whole vertices. A layout that fails [`validate`](Self::validate)
    /// yields nothing past the first malformed vertex.
    pub fn vertices(&self) -> impl Iterator<Item = [f32; 3]> + 'a {
        let offset = self.offset;
        self.data
            .chunks_exact(self.stride.max(1))
            .map_while(move |vertex| vertex.get(offset..offset.checked_add(3)?))
            .map(|p| [p[0], p[1], p[2]])
    }
}

// ============================================================================
// INDICES
// ============================================================================

/// A borrowed triangle index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexData<'a> {
    /// 8-bit indices. Widened to 16-bit before cooking.
    U8(&'a [u8]),
    /// 16-bit indices.
    U16(&'a [u16]),
    /// 32-bit indices.
    U32(&'a [u32]),
}

impl IndexData<'_> {
    /// Number of index elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::U8(data) => data.len(),
            Self::U16(data) => data.len(),
            Self::U32(data) => data.len(),
        }
    }

    /// Returns true if there are no indices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates indices widened to `u32`.
    pub fn iter_u32(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match *self {
            Self::U8(data) => Box::new(data.iter().map(|&i| u32::from(i))),
            Self::U16(data) => Box::new(data.iter().map(|&i| u32::from(i))),
            Self::U32(data) => Box::new(data.iter().copied()),
        }
    }
}

/// An owned triangle index buffer, for [`MeshGeometry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexVec {
    /// 8-bit indices.
    U8(Vec<u8>),
    /// 16-bit indices.
    U16(Vec<u16>),
    /// 32-bit indices.
    U32(Vec<u32>),
}

impl IndexVec {
    /// Borrows the buffer.
    #[must_use]
    pub fn as_data(&self) -> IndexData<'_> {
        match self {
            Self::U8(data) => IndexData::U8(data),
            Self::U16(data) => IndexData::U16(data),
            Self::U32(data) => IndexData::U32(data),
        }
    }
}

impl From<Vec<u8>> for IndexVec {
    fn from(data: Vec<u8>) -> Self {
        Self::U8(data)
    }
}

impl From<Vec<u16>> for IndexVec {
    fn from(data: Vec<u16>) -> Self {
        Self::U16(data)
    }
}

impl From<Vec<u32>> for IndexVec {
    fn from(data: Vec<u32>) -> Self {
        Self::U32(data)
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// BLAKE3 fingerprint of a geometry's content.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GeometryId(pub [u8; 32]);

impl GeometryId {
    /// Hashes positions and indices.
    ///
    /// Vertex count and index presence are hashed as well, so the boundary
    /// between the two buffers is unambiguous.
    #[must_use]
    pub fn fingerprint(positions: PositionAttribute<'_>, indices: Option<IndexData<'_>>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(GEOMETRY_DOMAIN);

        if positions.is_flat() {
            let whole = positions.data().len() / 3 * 3;
            hasher.update(&(whole as u64 / 3).to_le_bytes());
            hasher.update(bytemuck::cast_slice(&positions.data()[..whole]));
        } else {
            let count = positions.vertices().count() as u64;
            hasher.update(&count.to_le_bytes());
            for vertex in positions.vertices() {
                hasher.update(bytemuck::bytes_of(&vertex));
            }
        }

        match indices {
            None => {
                hasher.update(&[0]);
            }
            Some(indices) => {
                hasher.update(&[1]);
                hasher.update(&(indices.len() as u64).to_le_bytes());
                if let IndexData::U32(data) = indices {
                    hasher.update(bytemuck::cast_slice(data));
                } else {
                    for index in indices.iter_u32() {
                        hasher.update(&index.to_ne_bytes());
                    }
                }
            }
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// View the id as bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for GeometryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// ============================================================================
// GEOMETRY TRAIT
// ============================================================================

/// Renderable surface geometry the cache can cook.
///
/// Implemented by the rendering side for its own buffer types.
pub trait SurfaceGeometry {
    /// The vertex positions.
    fn positions(&self) -> PositionAttribute<'_>;

    /// The triangle index buffer, if the geometry is indexed.
    fn indices(&self) -> Option<IndexData<'_>>;

    /// Stable content identity used for cache keying.
    ///
    /// The default hashes the buffers on every call; implementations holding
    /// immutable buffers should compute it once.
    fn content_id(&self) -> GeometryId {
        GeometryId::fingerprint(self.positions(), self.indices())
    }

    /// Axis-aligned bounds of the positions, `None` when there are none.
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions().vertices())
    }
}

/// Owned, immutable geometry with its identity and bounds computed up front.
#[derive(Clone, Debug)]
pub struct MeshGeometry {
    positions: Vec<f32>,
    stride: usize,
    offset: usize,
    indices: Option<IndexVec>,
    id: GeometryId,
    bounds: Option<Aabb>,
}

impl MeshGeometry {
    /// Geometry from tightly packed positions.
    #[must_use]
    pub fn new(positions: Vec<f32>) -> Self {
        Self::interleaved(positions, 3, 0)
    }

    /// Geometry from an interleaved vertex buffer.
    #[must_use]
    pub fn interleaved(data: Vec<f32>, stride: usize, offset: usize) -> Self {
        let mut geometry = Self {
            positions: data,
            stride,
            offset,
            indices: None,
            id: GeometryId([0; 32]),
            bounds: None,
        };
        geometry.refresh();
        geometry
    }

    /// Attaches a triangle index buffer.
    #[must_use]
    pub fn with_indices(mut self, indices: impl Into<IndexVec>) -> Self {
        self.indices = Some(indices.into());
        self.refresh();
        self
    }

    fn refresh(&mut self) {
        let positions = PositionAttribute::interleaved(&self.positions, self.stride, self.offset);
        self.id = GeometryId::fingerprint(positions, self.indices.as_ref().map(IndexVec::as_data));
        self.bounds = Aabb::from_points(positions.vertices());
    }
}

impl SurfaceGeometry for MeshGeometry {
    fn positions(&self) -> PositionAttribute<'_> {
        PositionAttribute::interleaved(&self.positions, self.stride, self.offset)
    }

    fn indices(&self) -> Option<IndexData<'_>> {
        self.indices.as_ref().map(IndexVec::as_data)
    }

    fn content_id(&self) -> GeometryId {
        self.id
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.bounds
    }
}

//! # Geometry Normalizer
//!
//! Turns whatever the renderer holds into the two buffers the cooking bridge
//! understands: packed `f32` positions and 16/32-bit triangle indices.
//!
//! - Positions are always copied into a fresh, tightly packed buffer.
//! - 8-bit indices are widened to 16-bit; wider encodings are borrowed as-is.
//! - A trailing partial triangle in the index buffer is dropped, not rejected.

use kiln_shared::{CookMode, IndexWidth};
use std::borrow::Cow;

use crate::error::KilnResult;
use crate::geometry::{IndexData, SurfaceGeometry};

/// Triangle indices at a width the native engine accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBuffer<'a> {
    /// 16-bit indices (borrowed, or widened from 8-bit).
    U16(Cow<'a, [u16]>),
    /// 32-bit indices.
    U32(Cow<'a, [u32]>),
}

impl IndexBuffer<'_> {
    /// Element width.
    #[must_use]
    pub const fn width(&self) -> IndexWidth {
        match self {
            Self::U16(_) => IndexWidth::U16,
            Self::U32(_) => IndexWidth::U32,
        }
    }

    /// Number of index elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(data) => data.len(),
            Self::U32(data) => data.len(),
        }
    }

    /// Returns true if there are no indices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of whole triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.len() / 3
    }

    /// Largest index referenced, `None` when empty.
    #[must_use]
    pub fn max_index(&self) -> Option<u32> {
        match self {
            Self::U16(data) => data.iter().copied().max().map(u32::from),
            Self::U32(data) => data.iter().copied().max(),
        }
    }
}

/// Normalized buffers ready for scaling and cooking.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryBuffers<'a> {
    /// Packed `x, y, z` positions.
    pub positions: Vec<f32>,
    /// Triangle indices (absent in convex mode).
    pub indices: Option<IndexBuffer<'a>>,
}

impl GeometryBuffers<'_> {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Widens 8-bit indices to 16-bit, element by element.
#[must_use]
pub fn widen_u8(indices: &[u8]) -> Vec<u16> {
    indices.iter().map(|&i| u16::from(i)).collect()
}

/// Extracts cookable buffers from `geometry`.
///
/// Indices are only extracted for modes that use them. A missing index buffer
/// is not an error here; the bridge decides whether the mode requires one.
///
/// # Errors
///
/// [`KilnError::InvalidGeometry`](crate::KilnError::InvalidGeometry) if the
/// positions do not form a whole number of vertices.
pub fn normalize<G>(geometry: &G, mode: CookMode) -> KilnResult<GeometryBuffers<'_>>
where
    G: SurfaceGeometry + ?Sized,
{
    let attribute = geometry.positions();
    let vertex_count = attribute.validate()?;

    let positions = if attribute.is_flat() {
        attribute.data().to_vec()
    } else {
        let mut packed = Vec::with_capacity(vertex_count * 3);
        packed.extend(attribute.vertices().flatten());
        packed
    };

    let indices = if mode.uses_indices() {
        geometry.indices().map(normalize_indices)
    } else {
        None
    };

    Ok(GeometryBuffers { positions, indices })
}

fn normalize_indices(indices: IndexData<'_>) -> IndexBuffer<'_> {
    let whole = indices.len() / 3 * 3;
    if whole != indices.len() {
        tracing::warn!(
            indices = indices.len(),
            dropped = indices.len() - whole,
            "index buffer is not a whole number of triangles, dropping the tail"
        );
    }

    match indices {
        IndexData::U8(data) => IndexBuffer::U16(Cow::Owned(widen_u8(&data[..whole]))),
        IndexData::U16(data) => IndexBuffer::U16(Cow::Borrowed(&data[..whole])),
        IndexData::U32(data) => IndexBuffer::U32(Cow::Borrowed(&data[..whole])),
    }
}

//! # Bake Scale Policy
//!
//! Native cooking goes numerically unstable once triangle edges get long, so
//! oversized meshes are shrunk before cooking and grown back at placement:
//!
//! ```text
//! maxExtent <= TARGET_EXTENT * 5   ->  scale = 1.0          (cooked as-is)
//! maxExtent >  TARGET_EXTENT * 5   ->  scale = TARGET_EXTENT / maxExtent
//!
//! cooked shape  = original * scale
//! placed shape  = cooked * placement_scale()   (= 1 / scale)
//! ```
//!
//! The scale depends only on the bounding extent, so it is also part of the
//! cache key.

use kiln_shared::{Aabb, SCALE_TRIGGER_EXTENT, TARGET_EXTENT};

/// Uniform factor applied to positions before cooking. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct BakeScale(f32);

impl BakeScale {
    /// No rescaling.
    pub const IDENTITY: Self = Self(1.0);

    /// Scale for a mesh whose longest bounding-box edge is `max_extent`.
    ///
    /// Non-finite extents get the identity; the engine rejects such meshes itself.
    #[must_use]
    pub fn from_extent(max_extent: f32) -> Self {
        if max_extent.is_finite() && max_extent > SCALE_TRIGGER_EXTENT {
            Self(TARGET_EXTENT / max_extent)
        } else {
            Self::IDENTITY
        }
    }

    /// Scale for a bounding box. Empty geometry gets the identity.
    #[must_use]
    pub fn for_bounds(bounds: Option<Aabb>) -> Self {
        bounds.map_or(Self::IDENTITY, |aabb| Self::from_extent(aabb.max_extent()))
    }

    /// The factor.
    #[inline]
    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Factor the caller applies when placing the cooked shape.
    #[inline]
    #[must_use]
    pub fn placement_scale(self) -> f32 {
        1.0 / self.0
    }

    /// Returns true if positions pass through untouched.
    #[inline]
    #[must_use]
    pub fn is_identity(self) -> bool {
        self.0 == 1.0
    }

    /// Bit pattern, for hashing into cache keys.
    #[inline]
    #[must_use]
    pub fn to_bits(self) -> u32 {
        self.0.to_bits()
    }

    /// Scales packed positions.
    ///
    /// The identity returns the buffer as given, without touching it.
    #[must_use]
    pub fn apply(self, positions: Vec<f32>) -> Vec<f32> {
        if self.is_identity() {
            return positions;
        }

        tracing::info!(
            scale = self.0,
            vertices = positions.len() / 3,
            "oversized mesh, applying bake scale before cooking"
        );
        positions.into_iter().map(|p| p * self.0).collect()
    }
}

impl Default for BakeScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::fmt::Display for BakeScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_shared::Vec3;

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(BakeScale::from_extent(SCALE_TRIGGER_EXTENT), BakeScale::IDENTITY);

        let just_over = SCALE_TRIGGER_EXTENT + 0.01;
        let scale = BakeScale::from_extent(just_over);
        assert_eq!(scale.value(), TARGET_EXTENT / just_over);
        assert!(scale.value() < 1.0);
    }

    #[test]
    fn test_small_meshes_are_not_grown() {
        assert!(BakeScale::from_extent(0.001).is_identity());
        assert!(BakeScale::from_extent(0.0).is_identity());
    }

    #[test]
    fn test_non_finite_extent_is_identity() {
        assert!(BakeScale::from_extent(f32::INFINITY).is_identity());
        assert!(BakeScale::from_extent(f32::NAN).is_identity());
        assert!(BakeScale::for_bounds(None).is_identity());
    }

    #[test]
    fn test_scale_uses_longest_axis() {
        let aabb = Aabb::new(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 2.0, 80.0));
        assert_eq!(BakeScale::for_bounds(Some(aabb)).value(), 0.1);
    }

    #[test]
    fn test_repeated_computation_is_identical() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(123.456, 7.0, 99.0));
        let first = BakeScale::for_bounds(Some(aabb));
        let second = BakeScale::for_bounds(Some(aabb));
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_apply_scales_every_component() {
        let scale = BakeScale::from_extent(100.0);
        assert_eq!(scale.apply(vec![100.0, -50.0, 10.0]), vec![10.0, -5.0, 1.0]);
        assert_eq!(scale.placement_scale(), 10.0);
    }

    #[test]
    fn test_identity_passes_buffer_through() {
        let positions = vec![1.0, 2.0, 3.0];
        let ptr = positions.as_ptr();
        let out = BakeScale::IDENTITY.apply(positions);
        assert_eq!(out.as_ptr(), ptr);
    }
}

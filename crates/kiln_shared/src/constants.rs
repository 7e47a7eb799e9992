//! # Cooking Constants
//!
//! Values the bake-scale policy is built on.
//!
//! **CRITICAL:** Changing either value changes every cache key for oversized
//! geometry, and changes the cooked shapes themselves.

// =============================================================================
// BAKE SCALE
// =============================================================================

/// Extent (world units) an oversized mesh is shrunk to before cooking.
///
/// Cooked triangle meshes stay well-conditioned when their largest axis is in
/// the low tens of units; the caller restores true size at placement time.
pub const TARGET_EXTENT: f32 = 10.0;

/// A mesh is only rescaled when its largest extent exceeds
/// `TARGET_EXTENT * SCALE_TRIGGER_RATIO`.
///
/// The comparison is strict: an extent of exactly 50 units cooks unscaled.
pub const SCALE_TRIGGER_RATIO: f32 = 5.0;

/// Largest extent that is still cooked at its original size.
pub const SCALE_TRIGGER_EXTENT: f32 = TARGET_EXTENT * SCALE_TRIGGER_RATIO;

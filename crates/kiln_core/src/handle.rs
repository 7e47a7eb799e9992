//! # Mesh Handles
//!
//! A handle is one counted reference to a cooked cache entry. The entry, and
//! the native mesh behind it, live until the last handle is released.
//!
//! ```text
//! acquire ──> MeshHandle ──share──> MeshHandle
//!                 │                     │
//!              release               release
//!                 └──────────┬──────────┘
//!                            ▼
//!                  ref_count == 0 -> native mesh destroyed
//! ```
//!
//! Releasing is explicit. A handle dropped while still live is treated as a
//! leak: it is logged, counted in [`CacheStats`](crate::CacheStats), and then
//! released so the native mesh is not lost.

use kiln_shared::CookMode;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheShared};
use crate::error::{KilnError, KilnResult};
use crate::native::NativeMesh;
use crate::scale::BakeScale;

/// Counted reference to a cooked mesh.
#[must_use = "a mesh handle must be released; dropping it is reported as a leak"]
pub struct MeshHandle {
    shared: Arc<CacheShared>,
    key: CacheKey,
    mesh: NativeMesh,
    bake_scale: BakeScale,
    mode: CookMode,
    released: bool,
}

impl MeshHandle {
    pub(crate) fn new(
        shared: Arc<CacheShared>,
        key: CacheKey,
        mesh: NativeMesh,
        bake_scale: BakeScale,
        mode: CookMode,
    ) -> Self {
        Self {
            shared,
            key,
            mesh,
            bake_scale,
            mode,
            released: false,
        }
    }

    /// Key of the entry this handle references.
    #[inline]
    #[must_use]
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Mode the mesh was cooked in.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> CookMode {
        self.mode
    }

    /// Scale baked into the cooked mesh.
    #[inline]
    #[must_use]
    pub fn bake_scale(&self) -> BakeScale {
        self.bake_scale
    }

    /// Scale to apply when placing the shape, undoing the bake scale.
    #[inline]
    #[must_use]
    pub fn placement_scale(&self) -> f32 {
        self.bake_scale.placement_scale()
    }

    /// The cooked mesh, `None` once released.
    #[inline]
    #[must_use]
    pub fn mesh(&self) -> Option<NativeMesh> {
        (!self.released).then_some(self.mesh)
    }

    /// Returns true after [`release`](Self::release).
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Adds another reference to the same entry without touching the engine.
    ///
    /// # Errors
    ///
    /// [`KilnError::HandleReleased`] if this handle was already released.
    pub fn share(&self) -> KilnResult<Self> {
        if self.released || !self.shared.retain(&self.key) {
            return Err(KilnError::HandleReleased);
        }
        Ok(Self::new(Arc::clone(&self.shared), self.key, self.mesh, self.bake_scale, self.mode))
    }

    /// Gives the reference back to the cache.
    ///
    /// Returns false if the handle was already released; the second call
    /// changes nothing.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.shared.release(&self.key);
        true
    }
}

impl Drop for MeshHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::error!(key = %self.key, mode = %self.mode, "mesh handle dropped without release");
        self.shared.record_leak();
        self.release();
    }
}

impl std::fmt::Debug for MeshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshHandle")
            .field("key", &format_args!("{}", self.key))
            .field("mode", &self.mode)
            .field("bake_scale", &self.bake_scale)
            .field("released", &self.released)
            .finish()
    }
}

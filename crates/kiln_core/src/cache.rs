//! # Cooked-Mesh Cache
//!
//! Maps a content fingerprint to a cooked native mesh and the number of
//! handles holding it.
//!
//! ## Entry lifecycle
//!
//! ```text
//!            acquire (miss)             cook ok
//!  Vacant ───────────────────> Cooking ─────────> Ready(1) <──┐
//!    ▲                            │                  │        │ acquire / share
//!    └──────── cook failed ───────┘                  ▼        │
//!                                               Ready(n) ─────┘
//!                                                    │ last release
//!                                                    ▼
//!                                               Destroyed (native mesh released,
//!                                                          slot removed)
//! ```
//!
//! A destroyed key starts over from `Vacant`; nothing is resurrected.
//!
//! ## Locking
//!
//! One mutex guards the whole key space. Cooking runs outside it, with the key
//! parked in `Cooking` so concurrent requests for the same mesh wait on the
//! condition variable instead of cooking it a second time.

#![allow(unsafe_code)]

use kiln_shared::{CookMode, CookingParams};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

use crate::bridge;
use crate::config::KilnConfig;
use crate::error::{KilnError, KilnResult};
use crate::geometry::{GeometryId, SurfaceGeometry};
use crate::handle::MeshHandle;
use crate::native::{NativeMesh, PhysicsNative};
use crate::normalize::{normalize, GeometryBuffers};
use crate::scale::BakeScale;

/// Domain tag for cache keys.
const KEY_DOMAIN: &[u8] = b"kiln.cache-key.v1";

// ============================================================================
// KEYS
// ============================================================================

/// Identity of a cooked mesh: geometry content, mode and bake scale.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CacheKey(pub [u8; 32]);

impl CacheKey {
    /// Derives the key from its three components.
    #[must_use]
    pub fn derive(id: &GeometryId, mode: CookMode, scale: BakeScale) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(id.as_bytes());
        hasher.update(&mode.as_raw().to_le_bytes());
        hasher.update(&scale.to_bits().to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The key `MeshCache::acquire` would use for this geometry and mode.
    #[must_use]
    pub fn for_geometry<G>(geometry: &G, mode: CookMode) -> Self
    where
        G: SurfaceGeometry + ?Sized,
    {
        let scale = BakeScale::for_bounds(geometry.bounding_box());
        Self::derive(&geometry.content_id(), mode, scale)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Counters for the cache's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Acquires served from an existing entry.
    pub hits: u64,
    /// Acquires that had to cook.
    pub misses: u64,
    /// Successful cooks.
    pub cooks: u64,
    /// Cooks the native engine rejected.
    pub failed_cooks: u64,
    /// Successful cooks that needed a bake scale.
    pub scaled_cooks: u64,
    /// Acquires that waited at least once for another caller's cook of the
    /// same key. Spurious and repeated wake-ups are not counted again.
    pub contended_waits: u64,
    /// Entries destroyed by their last release.
    pub destroyed: u64,
    /// Handles dropped without an explicit release.
    pub leaked_handles: u64,
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// A cooked mesh and its reference count.
struct CacheEntry {
    mesh: NativeMesh,
    bake_scale: BakeScale,
    mode: CookMode,
    ref_count: u32,
}

/// What occupies a key.
enum Slot {
    /// Some caller is cooking this key right now.
    Cooking,
    /// Cooked and referenced by at least one handle.
    Ready(CacheEntry),
}

struct CacheState {
    slots: HashMap<CacheKey, Slot>,
    stats: CacheStats,
}

/// The part of the cache that handles point back into.
pub(crate) struct CacheShared {
    native: Arc<dyn PhysicsNative>,
    params: CookingParams,
    state: Mutex<CacheState>,
    /// Signalled whenever a `Cooking` slot resolves.
    cooked: Condvar,
}

impl CacheShared {
    /// Adds a reference to a ready entry. False if there is none.
    pub(crate) fn retain(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        match state.slots.get_mut(key) {
            Some(Slot::Ready(entry)) => {
                entry.ref_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Drops a reference; destroys the entry when it was the last one.
    pub(crate) fn release(&self, key: &CacheKey) {
        let mut state = self.state.lock();

        let Some(Slot::Ready(entry)) = state.slots.get_mut(key) else {
            tracing::error!(%key, "release of a key the cache does not hold");
            return;
        };
        if entry.ref_count == 0 {
            tracing::error!(%key, "release of an entry with no references");
            return;
        }
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            tracing::debug!(%key, refs = entry.ref_count, "handle released");
            return;
        }

        let Some(Slot::Ready(entry)) = state.slots.remove(key) else {
            return;
        };
        state.stats.destroyed += 1;
        drop(state);

        // SAFETY: the entry was just removed from the map, so this is the
        // single release of a mesh this engine cooked.
        unsafe { self.native.release(entry.mesh) };
        tracing::debug!(%key, "last handle released, cooked mesh destroyed");
    }

    /// Counts a handle dropped without release.
    pub(crate) fn record_leak(&self) {
        self.state.lock().stats.leaked_handles += 1;
    }
}

impl Drop for CacheShared {
    fn drop(&mut self) {
        for (key, slot) in self.state.get_mut().slots.drain() {
            if let Slot::Ready(entry) = slot {
                tracing::warn!(%key, refs = entry.ref_count, "cache torn down with a live entry");
                // SAFETY: the map owned the entry and is being emptied.
                unsafe { self.native.release(entry.mesh) };
            }
        }
    }
}

/// Reservation of a key for cooking. Dropping it unresolved frees the key.
struct CookClaim<'c> {
    shared: &'c Arc<CacheShared>,
    key: CacheKey,
    armed: bool,
}

impl CookClaim<'_> {
    /// Publishes the cook result and wakes every waiter.
    fn finish(
        mut self,
        cooked: KilnResult<NativeMesh>,
        bake_scale: BakeScale,
        mode: CookMode,
    ) -> KilnResult<MeshHandle> {
        self.armed = false;
        let mut state = self.shared.state.lock();

        let outcome = match cooked {
            Ok(mesh) => {
                let mut entry = CacheEntry { mesh, bake_scale, mode, ref_count: 0 };
                entry.ref_count += 1;
                state.slots.insert(self.key, Slot::Ready(entry));
                state.stats.cooks += 1;
                if !bake_scale.is_identity() {
                    state.stats.scaled_cooks += 1;
                }
                Ok(MeshHandle::new(Arc::clone(self.shared), self.key, mesh, bake_scale, mode))
            }
            Err(err) => {
                state.slots.remove(&self.key);
                if err.is_recoverable() {
                    state.stats.failed_cooks += 1;
                }
                Err(err)
            }
        };

        drop(state);
        self.shared.cooked.notify_all();
        outcome
    }
}

impl Drop for CookClaim<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock();
        if matches!(state.slots.get(&self.key), Some(Slot::Cooking)) {
            state.slots.remove(&self.key);
        }
        drop(state);
        self.shared.cooked.notify_all();
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Result of looking a key up under the lock.
enum Lookup {
    Hit(NativeMesh, BakeScale, CookMode),
    InFlight,
    Vacant,
}

/// Reference-counted cache of cooked collision meshes.
///
/// Cloning is cheap and yields another view of the same cache; pass it to
/// whatever needs to acquire meshes.
///
/// # Example
///
/// ```rust,ignore
/// let cache = MeshCache::new(Arc::new(ParryNative::new()), CookingParams::default());
///
/// let mut handle = cache.acquire(&geometry, CookMode::TriangleMesh)?;
/// attach(handle.mesh(), handle.placement_scale());
/// // ...
/// handle.release();
/// ```
#[derive(Clone)]
pub struct MeshCache {
    shared: Arc<CacheShared>,
}

impl MeshCache {
    /// Creates an empty cache cooking on `native` with `params`.
    #[must_use]
    pub fn new(native: Arc<dyn PhysicsNative>, params: CookingParams) -> Self {
        let config = KilnConfig {
            cooking: params,
            ..KilnConfig::default()
        };
        Self::with_config(native, &config)
    }

    /// Creates an empty cache from a loaded configuration.
    #[must_use]
    pub fn with_config(native: Arc<dyn PhysicsNative>, config: &KilnConfig) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                native,
                params: config.cooking,
                state: Mutex::new(CacheState {
                    slots: HashMap::with_capacity(config.cache.initial_capacity),
                    stats: CacheStats::default(),
                }),
                cooked: Condvar::new(),
            }),
        }
    }

    /// Returns a handle to the cooked form of `geometry`, cooking it on a miss.
    ///
    /// # Errors
    ///
    /// - [`KilnError::InvalidGeometry`]: malformed positions, or mesh mode without
    ///   valid indices. Nothing is cached.
    /// - [`KilnError::CookingFailed`]: the engine rejected the geometry. Nothing
    ///   is cached; the next acquire tries again.
    /// - [`KilnError::AllocationFailure`]: the native heap is exhausted.
    pub fn acquire<G>(&self, geometry: &G, mode: CookMode) -> KilnResult<MeshHandle>
    where
        G: SurfaceGeometry + ?Sized,
    {
        geometry.positions().validate()?;
        let bake_scale = BakeScale::for_bounds(geometry.bounding_box());
        let key = CacheKey::derive(&geometry.content_id(), mode, bake_scale);

        let mut state = self.shared.state.lock();
        let mut waited = false;
        loop {
            let lookup = match state.slots.get_mut(&key) {
                Some(Slot::Ready(entry)) => {
                    entry.ref_count += 1;
                    Lookup::Hit(entry.mesh, entry.bake_scale, entry.mode)
                }
                Some(Slot::Cooking) => Lookup::InFlight,
                None => Lookup::Vacant,
            };

            match lookup {
                Lookup::Hit(mesh, bake_scale, mode) => {
                    state.stats.hits += 1;
                    drop(state);
                    tracing::debug!(%key, %mode, "cache hit");
                    let shared = Arc::clone(&self.shared);
                    return Ok(MeshHandle::new(shared, key, mesh, bake_scale, mode));
                }
                Lookup::InFlight => {
                    if !waited {
                        state.stats.contended_waits += 1;
                        waited = true;
                    }
                    self.shared.cooked.wait(&mut state);
                }
                Lookup::Vacant => {
                    state.slots.insert(key, Slot::Cooking);
                    state.stats.misses += 1;
                    break;
                }
            }
        }
        drop(state);

        let claim = CookClaim {
            shared: &self.shared,
            key,
            armed: true,
        };
        let cooked = self.cook_uncached(geometry, mode, bake_scale);

        match &cooked {
            Ok(_) => tracing::info!(%key, %mode, %bake_scale, "mesh cooked"),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(%key, %mode, error = %err, "native engine rejected mesh");
            }
            Err(err) => tracing::warn!(%key, %mode, error = %err, "mesh could not be cooked"),
        }

        claim.finish(cooked, bake_scale, mode)
    }

    /// Normalizer, scale policy and bridge, in that order.
    fn cook_uncached<G>(
        &self,
        geometry: &G,
        mode: CookMode,
        bake_scale: BakeScale,
    ) -> KilnResult<NativeMesh>
    where
        G: SurfaceGeometry + ?Sized,
    {
        let normalized = normalize(geometry, mode)?;
        let buffers = GeometryBuffers {
            positions: bake_scale.apply(normalized.positions),
            indices: normalized.indices,
        };
        bridge::cook(&*self.shared.native, &buffers, mode, &self.shared.params)
    }

    /// The key [`acquire`](Self::acquire) would use, without cooking anything.
    #[must_use]
    pub fn key_for<G>(&self, geometry: &G, mode: CookMode) -> CacheKey
    where
        G: SurfaceGeometry + ?Sized,
    {
        CacheKey::for_geometry(geometry, mode)
    }

    /// Live references to a cooked entry, `None` if it is not cooked.
    #[must_use]
    pub fn ref_count(&self, key: &CacheKey) -> Option<u32> {
        match self.shared.state.lock().slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry.ref_count),
            _ => None,
        }
    }

    /// Whether a cooked entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.ref_count(key).is_some()
    }

    /// Number of cooked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared
            .state
            .lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Returns true if nothing is cooked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently being cooked.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared
            .state
            .lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Cooking))
            .count()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.shared.state.lock().stats.clone()
    }

    /// Parameters handed to the engine on every cook.
    #[must_use]
    pub fn params(&self) -> &CookingParams {
        &self.shared.params
    }
}

impl std::fmt::Debug for MeshCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshCache")
            .field("entries", &self.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshGeometry;
    use crate::testing::MockNative;

    const TETRA: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    fn cache() -> (Arc<MockNative>, MeshCache) {
        let native = Arc::new(MockNative::new());
        let cache = MeshCache::new(native.clone(), CookingParams::default());
        (native, cache)
    }

    #[test]
    fn test_second_acquire_is_a_hit() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::new(TETRA.to_vec());

        let mut a = cache.acquire(&mesh, CookMode::Convex).unwrap();
        let mut b = cache.acquire(&mesh, CookMode::Convex).unwrap();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.mesh(), b.mesh());
        assert_eq!(cache.ref_count(&a.key()), Some(2));
        assert_eq!(native.cooks(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.cooks), (1, 1, 1));

        assert!(a.release());
        assert!(b.release());
        assert!(cache.is_empty());
        assert_eq!(native.live_meshes(), 0);
        assert_eq!(cache.stats().destroyed, 1);
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::new(TETRA.to_vec()).with_indices(vec![0u8, 1, 2, 0, 2, 3]);
        let mut hull = cache.acquire(&mesh, CookMode::Convex).unwrap();
        let mut tris = cache.acquire(&mesh, CookMode::TriangleMesh).unwrap();
        assert_ne!(hull.key(), tris.key());
        assert_eq!(native.cooks(), 2);
        assert_eq!(cache.len(), 2);
        hull.release();
        tris.release();
    }

    #[test]
    fn test_key_for_matches_acquire() {
        let (_native, cache) = cache();
        let mesh = MeshGeometry::new(TETRA.iter().map(|p| p * 200.0).collect());
        let mut handle = cache.acquire(&mesh, CookMode::Convex).unwrap();
        assert_eq!(cache.key_for(&mesh, CookMode::Convex), handle.key());
        assert_eq!(CacheKey::for_geometry(&mesh, CookMode::Convex), handle.key());
        handle.release();
    }

    #[test]
    fn test_oversized_mesh_is_cooked_scaled() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::new(TETRA.iter().map(|p| p * 100.0).collect());

        let mut handle = cache.acquire(&mesh, CookMode::Convex).unwrap();
        assert_eq!(handle.bake_scale().value(), 0.1);
        assert_eq!(handle.placement_scale(), 10.0);

        let seen = native.last_cook().unwrap();
        assert_eq!(seen.points[1], [10.0, 0.0, 0.0]);
        assert_eq!(cache.stats().scaled_cooks, 1);
        handle.release();
    }

    #[test]
    fn test_invalid_positions_never_reach_the_engine() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::new(vec![0.0; 8]);
        let err = cache.acquire(&mesh, CookMode::Convex).unwrap_err();
        assert!(matches!(err, KilnError::InvalidGeometry(_)));
        assert_eq!(native.cooks(), 0);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_huge_position_offset_is_rejected() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::interleaved(vec![0.0; 6], 3, usize::MAX);
        let err = cache.acquire(&mesh, CookMode::Convex).unwrap_err();
        assert!(matches!(err, KilnError::InvalidGeometry(_)));
        assert_eq!(native.cooks(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_cook_releases_the_key() {
        let (native, cache) = cache();
        let mesh = MeshGeometry::new(vec![3.0; 12]);
        let key = CacheKey::for_geometry(&mesh, CookMode::Convex);

        let err = cache.acquire(&mesh, CookMode::Convex).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!cache.contains(&key));
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().failed_cooks, 1);

        assert!(cache.acquire(&mesh, CookMode::Convex).is_err());
        assert_eq!(native.cooks(), 2);
    }

    #[test]
    fn test_key_display_is_hex() {
        let key = CacheKey([0x0F; 32]);
        assert_eq!(key.to_string(), "0f".repeat(32));
    }
}

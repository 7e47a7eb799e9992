//! # KILN Core
//!
//! Turns renderer geometry into cooked collision meshes and shares them.
//!
//! ## Pipeline
//!
//! ```text
//! SurfaceGeometry ──> fingerprint + bounds ──> CacheKey
//!                                                 │
//!                                   hit ◄─────────┤
//!                                                 │ miss
//!                                                 ▼
//!                 normalize ──> bake scale ──> bridge::cook (foreign heap)
//!                                                 │
//!                                                 ▼
//!                                   MeshCache entry ──> MeshHandle
//! ```
//!
//! ## Rules
//!
//! 1. **One cook per key**: identical geometry requested concurrently is
//!    cooked once; later callers wait and share.
//! 2. **Counted lifetime**: a cooked mesh lives exactly as long as its handles.
//! 3. **No leaks across the boundary**: every foreign buffer is a guard, freed
//!    on success and on failure.
//! 4. **Failures are not cached**: a rejected mesh is retried on the next acquire.
//!
//! The physics engine itself sits behind [`PhysicsNative`].

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod memory;
pub mod native;
pub mod normalize;
pub mod scale;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, CacheStats, MeshCache};
pub use config::{CacheConfig, KilnConfig};
pub use error::{KilnError, KilnResult};
pub use geometry::{
    GeometryId, IndexData, IndexVec, MeshGeometry, PositionAttribute, SurfaceGeometry,
};
pub use handle::MeshHandle;
pub use memory::ForeignBuffer;
pub use native::{read_points, read_triangles, NativeMesh, PhysicsNative};
pub use normalize::{normalize, GeometryBuffers, IndexBuffer};
pub use scale::BakeScale;

pub use kiln_shared::{CookMode, CookingParams};

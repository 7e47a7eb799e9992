//! # Cooking Error Types
//!
//! All errors that can occur between `acquire` and a cooked mesh.

use kiln_shared::CookMode;
use thiserror::Error;

/// Errors that can occur in the cooking cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KilnError {
    /// The caller handed over geometry that breaks the input contract.
    ///
    /// Detected before any foreign memory is allocated. Never retried.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The native engine rejected the geometry (degenerate, zero area, flat hull).
    #[error("cooking failed: {mode} mesh with {vertex_count} vertices rejected by the native engine")]
    CookingFailed {
        /// Mode that was requested.
        mode: CookMode,
        /// Vertices handed to the engine.
        vertex_count: usize,
    },

    /// The native heap could not satisfy a transient buffer.
    #[error("foreign allocation of {bytes} bytes failed")]
    AllocationFailure {
        /// Size of the allocation that failed.
        bytes: usize,
    },

    /// Tried to share a handle that was already released.
    #[error("handle already released")]
    HandleReleased,

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KilnError {
    /// Whether the caller may carry on without a collision shape for this mesh.
    ///
    /// Only a rejected cook qualifies; everything else is a bug or an exhausted heap.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::CookingFailed { .. })
    }
}

/// Result type for cooking operations.
pub type KilnResult<T> = Result<T, KilnError>;

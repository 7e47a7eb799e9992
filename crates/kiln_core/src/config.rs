//! # Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so a partial
//! or empty file is valid:
//!
//! ```toml
//! [cooking]
//! degenerate_area = 1e-10
//! degenerate_volume = 1e-12
//!
//! [cache]
//! initial_capacity = 256
//! ```

use kiln_shared::CookingParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{KilnError, KilnResult};

/// Sizing of the cache's key map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries reserved up front.
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { initial_capacity: 64 }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Parameters passed to the native engine on every cook.
    pub cooking: CookingParams,
    /// Cache sizing.
    pub cache: CacheConfig,
}

impl KilnConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> KilnResult<Self> {
        toml::from_str(text).map_err(|e| KilnError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> KilnResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KilnError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

//! # KILN Shared
//!
//! Types used on both sides of the foreign-memory boundary:
//! the cooking cache (`kiln_core`) and the native physics engine (`kiln_native`).
//!
//! ## CRITICAL RULE
//!
//! Everything in [`abi`] is `#[repr(C)]` and is read through raw pointers by the
//! native side. Field order and widths are part of the contract.
//!
//! This crate must NEVER depend on:
//! - a physics engine
//! - anything that needs `unsafe`

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod abi;
pub mod constants;
pub mod math;

pub use abi::{CookMode, CookingParams, IndexWidth, MeshDesc};
pub use constants::{SCALE_TRIGGER_EXTENT, SCALE_TRIGGER_RATIO, TARGET_EXTENT};
pub use math::{Aabb, Vec3};

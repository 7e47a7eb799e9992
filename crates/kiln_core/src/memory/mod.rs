//! # Memory Management
//!
//! Transient buffers on the native engine's heap.
//!
//! ## Design Philosophy
//!
//! Foreign memory is never owned by anything longer-lived than a stack frame:
//! - Allocated immediately before the native call
//! - Freed when the guard goes out of scope, on every exit path
//! - Never reclaimed by "someone later"

mod foreign;

pub use foreign::ForeignBuffer;

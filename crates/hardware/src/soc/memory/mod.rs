//! Shared memory between the host and the external core.
//!
//! This module implements the buffer the instruction image is loaded into. It provides:
//! 1. **Buffer:** Word-addressed, bounds-checked storage with a stable bus address.
//! 2. **Cache maintenance:** Range invalidation so host writes reach the core's bus
//!    master and the core's writes become visible to host reads.

/// Shared word buffer (anonymous mapping or reserved physical region).
pub mod buffer;

/// Host data cache maintenance by address range.
pub mod cache;

/// Physical address windows mapped through `/dev/mem`-style devices.
#[cfg(unix)]
pub mod mapping;

pub use buffer::SharedBuffer;

//! Common types shared across the harness.
//!
//! This module provides the small building blocks every other component uses:
//! 1. **Address Types:** A strong type for addresses published to the external core.
//! 2. **Constants:** Word width, default buffer capacity, cache line size.
//! 3. **Error Handling:** The controller error taxonomy and image-source errors.

/// Address type definitions.
pub mod addr;

/// Common constants used throughout the harness.
pub mod constants;

/// Error types.
pub mod error;

pub use addr::PhysAddr;
pub use constants::{DEFAULT_CAPACITY_WORDS, WORD_BYTES};
pub use error::{ControllerError, ImageError, Result};

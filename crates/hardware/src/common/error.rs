//! Error definitions.
//!
//! This module defines the failure taxonomy of the harness. It provides:
//! 1. **Controller Errors:** Allocation, bounds, image size, state and bus failures.
//! 2. **Image Errors:** Problems turning a file or byte stream into instruction words.
//! 3. **Result Alias:** `Result<T>` over [`ControllerError`].
//!
//! Caller-input errors (`OutOfBounds`, `ImageTooLarge`, `InvalidState`) are raised before
//! anything is touched. `Bus` errors may leave the hardware in an unknown state.

use thiserror::Error;

use super::addr::PhysAddr;
use crate::core::RunState;

/// Errors raised by the shared buffer, register block and controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The shared buffer could not be reserved at the requested capacity.
    #[error("cannot allocate shared buffer of {capacity} words: {reason}")]
    Allocation {
        /// Requested capacity in words.
        capacity: usize,
        /// Host-side reason.
        reason: String,
    },

    /// An offset/length pair reaches past the end of the buffer.
    #[error("range [{offset}, {offset}+{len}) exceeds buffer capacity of {capacity} words")]
    OutOfBounds {
        /// First word of the requested range.
        offset: usize,
        /// Number of words requested.
        len: usize,
        /// Buffer capacity in words.
        capacity: usize,
    },

    /// The instruction image does not fit in the buffer.
    #[error("image of {len} words does not fit in a {capacity}-word buffer")]
    ImageTooLarge {
        /// Image length in words.
        len: usize,
        /// Buffer capacity in words.
        capacity: usize,
    },

    /// The operation is not permitted in the controller's current state.
    #[error("{operation} is not permitted while the core is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the controller was in.
        state: RunState,
    },

    /// The buffer's bus address does not fit the 32-bit `MEM_BASE_ADDRESS` register.
    #[error("buffer address {address} does not fit the 32-bit MEM_BASE_ADDRESS register")]
    AddressTooWide {
        /// Address that could not be published.
        address: PhysAddr,
    },

    /// A register access did not complete.
    #[error("bus error on {register}: {reason}")]
    Bus {
        /// Register (or mapping) the access targeted.
        register: &'static str,
        /// Transport-level reason.
        reason: String,
    },

    /// The instruction image could not be read or decoded.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Host I/O failed outside of image loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building an instruction image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image file could not be read.
    #[error("cannot read image '{path}': {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A raw byte stream is not a whole number of 32-bit words.
    #[error("image length {len} bytes is not a multiple of 4")]
    Misaligned {
        /// Length of the byte stream.
        len: usize,
    },

    /// A token in a hex word list is not a 32-bit hexadecimal value.
    #[error("line {line}: '{token}' is not a 32-bit hex word")]
    BadHexWord {
        /// 1-based line number.
        line: usize,
        /// Offending token.
        token: String,
    },

    /// The ELF container could not be parsed.
    #[error("malformed ELF image: {0}")]
    Elf(String),

    /// The ELF file carries no loadable bytes.
    #[error("ELF image has no loadable segments")]
    NoLoadableContent,
}

impl From<object::Error> for ImageError {
    fn from(err: object::Error) -> Self {
        Self::Elf(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ControllerError>;

//! Program loading and run sessions.
//!
//! Provides the instruction image readers and the session that drives a controller
//! through reset, load, run and inspection.

/// Instruction image readers (binary, hex, ELF).
pub mod loader;

/// Load-and-run session harness.
pub mod session;

pub use loader::{ImageFormat, InstructionImage};
pub use session::{Session, SessionSummary};

//! Shared test infrastructure.

/// Buffer and controller constructors.
pub mod harness;

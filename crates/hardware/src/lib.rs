//! Loader and run controller for a memory-mapped soft RISC-V core.
//!
//! The external core is a black box reached only through three 32-bit registers and a
//! shared word buffer. This crate implements the host side of that protocol:
//! 1. **SoC:** The register bus trait, the typed register block, and the shared buffer
//!    (heap-backed or mapped from a reserved physical region), plus an in-process
//!    loopback device and a `/dev/mem`-mapped register block.
//! 2. **Core:** The controller state machine (load, start, stop, reset, snapshot), the
//!    wait/poll policy used between asserting run and inspecting results, and
//!    checkpoint diagnostics.
//! 3. **Simulation:** Instruction image loading (raw binary, hex word lists, ELF) and the
//!    session harness that strings the whole load-and-run sequence together.
//! 4. **Configuration:** JSON-deserializable settings with usable defaults.

/// Common types and constants (addresses, word sizes, errors).
pub mod common;
/// Harness configuration (register base, buffer backing, dump windows, wait policy).
pub mod config;
/// Controller state machine, wait policies, and diagnostics.
pub mod core;
/// Instruction images and the load-and-run session harness.
pub mod sim;
/// Register bus, register block, devices, and the shared memory buffer.
pub mod soc;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Controller driving the external core; construct with `CoreController::new`.
pub use crate::core::CoreController;
/// Crate-wide error type.
pub use crate::common::error::{ControllerError, Result};

//! Register bus implementations.
//!
//! The controller is generic over [`RegisterBus`]; this module supplies the two buses
//! the harness ships with: an in-process loopback stand-in for the external core and a
//! `/dev/mem`-mapped block for real hardware.

/// In-process, instrumented stand-in for the external core's register block.
pub mod loopback;

/// Register block mapped from a memory device file.
#[cfg(unix)]
pub mod mapped;

pub use loopback::{LoopbackCore, RegisterAccess};
#[cfg(unix)]
pub use mapped::MappedRegisters;

pub use crate::soc::traits::RegisterBus;

//! System-on-Chip side of the protocol.
//!
//! This module organizes what the controller talks to: the register bus abstraction,
//! the typed register block layered on it, the concrete bus devices, and the shared
//! memory buffer the external core fetches from.

/// Controller construction from configuration.
pub mod builder;

/// Register bus implementations (loopback and mapped).
pub mod devices;

/// Shared memory buffer and cache maintenance.
pub mod memory;

/// Typed register block (control enable, memory base, program counter).
pub mod regs;

/// Register bus trait.
pub mod traits;

pub use memory::SharedBuffer;
pub use regs::{RegisterBlock, RunControl};
pub use traits::RegisterBus;

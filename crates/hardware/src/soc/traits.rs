//! Register bus trait for memory-mapped control blocks.
//!
//! This module defines the `RegisterBus` trait implemented by everything the register
//! block can sit on. It provides:
//! 1. **Identification:** `name` and `base_address` for logging and reporting.
//! 2. **Access:** 32-bit reads and writes at block-relative byte offsets.
//!
//! Accesses are fallible so that hardware-backed implementations can surface transport
//! failures as `ControllerError::Bus` instead of panicking.

use crate::common::PhysAddr;
use crate::common::error::Result;

/// Trait for 32-bit register blocks reached over a memory-mapped interconnect.
pub trait RegisterBus {
    /// Returns a short name for this bus (e.g., `"loopback"`, `"/dev/mem"`).
    fn name(&self) -> &str;
    /// Returns the physical base address of the register block.
    fn base_address(&self) -> PhysAddr;
    /// Reads the 32-bit register at the given byte offset.
    fn read_u32(&mut self, offset: u64) -> Result<u32>;
    /// Writes the 32-bit register at the given byte offset.
    fn write_u32(&mut self, offset: u64, val: u32) -> Result<()>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn base_address(&self) -> PhysAddr {
        (**self).base_address()
    }

    fn read_u32(&mut self, offset: u64) -> Result<u32> {
        (**self).read_u32(offset)
    }

    fn write_u32(&mut self, offset: u64, val: u32) -> Result<()> {
        (**self).write_u32(offset, val)
    }
}

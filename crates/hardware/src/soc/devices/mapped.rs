//! Register block mapped from a memory device file.
//!
//! Maps the core's AXI-Lite register window through `/dev/mem` (or a UIO node) and
//! performs volatile 32-bit accesses. Offsets outside the block or not word aligned are
//! rejected before touching the bus.

use std::path::Path;

use crate::common::PhysAddr;
use crate::common::error::{ControllerError, Result};
use crate::soc::memory::mapping::DeviceMapping;
use crate::soc::regs::{self, BLOCK_SPAN};
use crate::soc::traits::RegisterBus;

/// Register block reached through a live `mmap` of physical memory.
#[derive(Debug)]
pub struct MappedRegisters {
    mapping: DeviceMapping,
    base: PhysAddr,
    name: String,
}

// SAFETY: the mapping is owned exclusively by this value.
unsafe impl Send for MappedRegisters {}

impl MappedRegisters {
    /// Maps the register block at physical address `base` through `device`.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if `base` is not word aligned or the device cannot be
    /// opened or mapped.
    pub fn open(device: &Path, base: PhysAddr) -> Result<Self> {
        if base.val() % 4 != 0 {
            return Err(ControllerError::Bus {
                register: "register block",
                reason: format!("base address {base} is not word aligned"),
            });
        }
        let mapping = DeviceMapping::open(device, base.val(), BLOCK_SPAN as usize).map_err(|e| {
            ControllerError::Bus {
                register: "register block",
                reason: format!("cannot map {base} through {}: {e}", device.display()),
            }
        })?;
        Ok(Self {
            mapping,
            base,
            name: device.display().to_string(),
        })
    }

    fn register_ptr(&self, offset: u64) -> Result<*mut u32> {
        if offset % 4 != 0 || offset >= BLOCK_SPAN {
            return Err(ControllerError::Bus {
                register: regs::register_name(offset),
                reason: format!("offset {offset:#x} is outside the register block or unaligned"),
            });
        }
        // SAFETY: offset checked against the mapped span above.
        Ok(unsafe { self.mapping.as_mut_ptr().add(offset as usize) }.cast::<u32>())
    }
}

impl RegisterBus for MappedRegisters {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_address(&self) -> PhysAddr {
        self.base
    }

    fn read_u32(&mut self, offset: u64) -> Result<u32> {
        let ptr = self.register_ptr(offset)?;
        // SAFETY: aligned pointer into the live register mapping.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write_u32(&mut self, offset: u64, val: u32) -> Result<()> {
        let ptr = self.register_ptr(offset)?;
        // SAFETY: aligned pointer into the live register mapping.
        unsafe { ptr.write_volatile(val) };
        Ok(())
    }
}

//! Controller construction from configuration.
//!
//! This module assembles a ready-to-use controller from a [`Config`]. It performs:
//! 1. **Buffer setup:** Allocates host memory or maps the reserved physical region.
//! 2. **Bus setup:** Maps the register block through the memory device, or creates an
//!    in-process loopback core for dry runs.
//! 3. **Assembly:** Pairs both in a [`CoreController`] in the `Halted` state.

#[cfg(unix)]
use std::path::Path;

use tracing::{debug, info};

use crate::common::PhysAddr;
#[cfg(not(unix))]
use crate::common::error::ControllerError;
use crate::common::error::Result;
use crate::config::{BufferBacking, Config, MemoryConfig};
use crate::core::CoreController;
use crate::soc::devices::LoopbackCore;
#[cfg(unix)]
use crate::soc::devices::MappedRegisters;
use crate::soc::memory::SharedBuffer;

/// Bus address a loopback run publishes when the host buffer lies above 4 GiB.
pub const LOOPBACK_BUS_ADDRESS: u64 = 0x1000_0000;

/// Creates the shared buffer described by `memory`.
///
/// # Errors
///
/// `ControllerError::Allocation` if the buffer cannot be reserved or mapped.
pub fn build_buffer(memory: &MemoryConfig) -> Result<SharedBuffer> {
    let buffer = match &memory.backing {
        BufferBacking::Heap { bus_address } => {
            let buffer = SharedBuffer::allocate(memory.capacity_words)?;
            match bus_address {
                Some(addr) => buffer.with_bus_address(PhysAddr::new(*addr)),
                None => buffer,
            }
        }
        #[cfg(unix)]
        BufferBacking::Physical { address, device } => SharedBuffer::map_physical(
            Path::new(device),
            PhysAddr::new(*address),
            memory.capacity_words,
        )?,
        #[cfg(not(unix))]
        BufferBacking::Physical { .. } => {
            return Err(ControllerError::Allocation {
                capacity: memory.capacity_words,
                reason: "physical buffers require a unix memory device".to_string(),
            });
        }
    };
    debug!(capacity = buffer.capacity(), base = %buffer.base_address(), "shared buffer ready");
    Ok(buffer)
}

/// Builds a controller over the real register block.
///
/// # Errors
///
/// `ControllerError::Allocation` for the buffer, `ControllerError::Bus` if the register
/// block cannot be mapped.
#[cfg(unix)]
pub fn hardware_controller(config: &Config) -> Result<CoreController<MappedRegisters>> {
    let buffer = build_buffer(&config.memory)?;
    let regs = MappedRegisters::open(
        Path::new(&config.registers.device),
        PhysAddr::new(config.registers.base),
    )?;
    info!(
        registers = %PhysAddr::new(config.registers.base),
        buffer = %buffer.base_address(),
        "hardware controller ready"
    );
    Ok(CoreController::new(regs, buffer))
}

/// Builds a controller over an in-process loopback core.
///
/// A heap buffer whose host address does not fit 32 bits, and has no configured bus
/// address, is published as [`LOOPBACK_BUS_ADDRESS`].
///
/// # Errors
///
/// `ControllerError::Allocation` if the buffer cannot be reserved.
pub fn loopback_controller(config: &Config) -> Result<CoreController<LoopbackCore>> {
    let mut buffer = build_buffer(&config.memory)?;
    if buffer.base_address().to_u32().is_none() {
        debug!(host = %buffer.base_address(), "host buffer above 4 GiB, using loopback bus address");
        buffer = buffer.with_bus_address(PhysAddr::new(LOOPBACK_BUS_ADDRESS));
    }
    let core = LoopbackCore::new(PhysAddr::new(config.registers.base));
    info!(buffer = %buffer.base_address(), "loopback controller ready");
    Ok(CoreController::new(core, buffer))
}

//! Control register block of the external core.
//!
//! Three 32-bit registers at fixed byte offsets from the block base. The block is
//! accessed only through named accessors so that no caller does offset arithmetic.
//!
//! # Registers
//!
//! * `0x00`: `CONTROL_ENABLE` (Read/Write)
//!   * `0`: Halt / hold in reset
//!   * `1`: Run
//! * `0x04`: `MEM_BASE_ADDRESS` (Read/Write): bus address of the shared buffer's first
//!   word. Written only while `CONTROL_ENABLE` is deasserted.
//! * `0x08`: `PROGRAM_COUNTER` (Read Only): current fetch address reported by the core.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::common::PhysAddr;
use crate::common::error::{ControllerError, Result};
use crate::soc::traits::RegisterBus;

/// Byte offset of the run-enable register.
pub const CONTROL_ENABLE: u64 = 0x0;
/// Byte offset of the shared buffer base address register.
pub const MEM_BASE_ADDRESS: u64 = 0x4;
/// Byte offset of the program counter register.
pub const PROGRAM_COUNTER: u64 = 0x8;
/// Span of the register block in bytes.
pub const BLOCK_SPAN: u64 = 0xC;

/// Returns the register name for a block offset, for logs and error messages.
pub const fn register_name(offset: u64) -> &'static str {
    match offset {
        CONTROL_ENABLE => "CONTROL_ENABLE",
        MEM_BASE_ADDRESS => "MEM_BASE_ADDRESS",
        PROGRAM_COUNTER => "PROGRAM_COUNTER",
        _ => "UNMAPPED",
    }
}

/// Value of the run-enable bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunControl {
    /// Core halted and held in reset.
    Halt,
    /// Core fetching and executing.
    Run,
}

impl RunControl {
    /// Returns the register encoding.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Halt => 0,
            Self::Run => 1,
        }
    }

    /// Decodes a raw `CONTROL_ENABLE` value; only bit 0 is meaningful.
    pub const fn from_bits(raw: u32) -> Self {
        if raw & 1 == 1 { Self::Run } else { Self::Halt }
    }
}

impl fmt::Display for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halt => write!(f, "halt"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// Typed view of the external core's control registers.
#[derive(Debug)]
pub struct RegisterBlock<B> {
    bus: B,
}

impl<B: RegisterBus> RegisterBlock<B> {
    /// Wraps a register bus.
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Returns the underlying bus.
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns the underlying bus mutably.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consumes the block and returns the bus.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Writes the run-enable register.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the write does not complete.
    pub fn set_run_enable(&mut self, control: RunControl) -> Result<()> {
        debug!(register = "CONTROL_ENABLE", value = control.bits(), "register write");
        self.bus.write_u32(CONTROL_ENABLE, control.bits())
    }

    /// Reads back the run-enable register.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the read does not complete.
    pub fn run_enable(&mut self) -> Result<RunControl> {
        self.bus.read_u32(CONTROL_ENABLE).map(RunControl::from_bits)
    }

    /// Publishes the shared buffer's base address to the core.
    ///
    /// # Errors
    ///
    /// `ControllerError::AddressTooWide` if the address does not fit the 32-bit register
    /// (nothing is written), `ControllerError::Bus` if the write does not complete.
    pub fn set_mem_base_address(&mut self, addr: PhysAddr) -> Result<()> {
        let raw = addr.to_u32().ok_or(ControllerError::AddressTooWide { address: addr })?;
        debug!(register = "MEM_BASE_ADDRESS", value = %addr, "register write");
        self.bus.write_u32(MEM_BASE_ADDRESS, raw)
    }

    /// Reads back the published base address.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the read does not complete.
    pub fn mem_base_address(&mut self) -> Result<PhysAddr> {
        self.bus.read_u32(MEM_BASE_ADDRESS).map(PhysAddr::from)
    }

    /// Samples the program counter register.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the read does not complete.
    pub fn program_counter(&mut self) -> Result<u32> {
        let pc = self.bus.read_u32(PROGRAM_COUNTER)?;
        debug!(register = "PROGRAM_COUNTER", value = pc, "register read");
        Ok(pc)
    }
}

//! Loopback register block.
//!
//! An in-process stand-in for the external core that implements only its register
//! interface. It latches `CONTROL_ENABLE` and `MEM_BASE_ADDRESS`, records every access in
//! order, and models forward progress on `PROGRAM_COUNTER`: the PC is reloaded from the
//! entry address on each rising edge of run-enable and moves forward one instruction on
//! every sample while running, stopping once it reaches the configured halt address.
//! Deasserting run-enable freezes the PC at its last value.
//!
//! No instruction is ever fetched or executed.

use serde::Serialize;

use crate::common::PhysAddr;
use crate::common::constants::INSTRUCTION_BYTES;
use crate::common::error::{ControllerError, Result};
use crate::soc::regs::{self, CONTROL_ENABLE, MEM_BASE_ADDRESS, PROGRAM_COUNTER, RunControl};
use crate::soc::traits::RegisterBus;

/// One recorded register access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegisterAccess {
    /// A read and the value it returned.
    Read {
        /// Byte offset within the block.
        offset: u64,
        /// Value returned.
        value: u32,
    },
    /// A write and the value written.
    Write {
        /// Byte offset within the block.
        offset: u64,
        /// Value written.
        value: u32,
    },
}

/// Instrumented loopback implementation of the core's register block.
#[derive(Debug, Clone)]
pub struct LoopbackCore {
    base: PhysAddr,
    control: u32,
    mem_base: u32,
    pc: u32,
    entry_pc: u32,
    step: u32,
    halt_pc: Option<u32>,
    log: Vec<RegisterAccess>,
    fail_next: Option<String>,
}

impl LoopbackCore {
    /// Creates a halted loopback block at `base` with PC 0.
    pub const fn new(base: PhysAddr) -> Self {
        Self {
            base,
            control: 0,
            mem_base: 0,
            pc: 0,
            entry_pc: 0,
            step: INSTRUCTION_BYTES,
            halt_pc: None,
            log: Vec::new(),
            fail_next: None,
        }
    }

    /// Sets the PC loaded on every rising edge of run-enable.
    #[must_use]
    pub fn with_entry_pc(mut self, pc: u32) -> Self {
        self.entry_pc = pc;
        self
    }

    /// Sets the PC at which progress stops (a terminal self-loop).
    #[must_use]
    pub fn with_halt_pc(mut self, pc: u32) -> Self {
        self.halt_pc = Some(pc);
        self
    }

    /// Sets how far the PC moves per sample while running; `0` models a stalled core.
    #[must_use]
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// Makes the next register access fail with a bus error carrying `reason`.
    pub fn fail_next_access(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    /// Returns every access recorded so far, oldest first.
    pub fn log(&self) -> &[RegisterAccess] {
        &self.log
    }

    /// Returns only the recorded writes as `(offset, value)` pairs, oldest first.
    pub fn writes(&self) -> Vec<(u64, u32)> {
        self.log
            .iter()
            .filter_map(|access| match *access {
                RegisterAccess::Write { offset, value } => Some((offset, value)),
                RegisterAccess::Read { .. } => None,
            })
            .collect()
    }

    /// Discards the access log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Returns the latched run-enable state without recording an access.
    pub const fn run_control(&self) -> RunControl {
        RunControl::from_bits(self.control)
    }

    /// Returns the current PC without recording an access or advancing it.
    pub const fn peek_pc(&self) -> u32 {
        self.pc
    }

    fn take_failure(&mut self, offset: u64) -> Result<()> {
        match self.fail_next.take() {
            Some(reason) => Err(ControllerError::Bus {
                register: regs::register_name(offset),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn unmapped(offset: u64) -> ControllerError {
        ControllerError::Bus {
            register: regs::register_name(offset),
            reason: format!("no register at offset {offset:#x}"),
        }
    }
}

impl Default for LoopbackCore {
    fn default() -> Self {
        Self::new(PhysAddr::new(0))
    }
}

impl RegisterBus for LoopbackCore {
    fn name(&self) -> &str {
        "loopback"
    }

    fn base_address(&self) -> PhysAddr {
        self.base
    }

    fn read_u32(&mut self, offset: u64) -> Result<u32> {
        self.take_failure(offset)?;
        let value = match offset {
            CONTROL_ENABLE => self.control,
            MEM_BASE_ADDRESS => self.mem_base,
            PROGRAM_COUNTER => {
                let current = self.pc;
                if self.run_control() == RunControl::Run && self.halt_pc != Some(current) {
                    self.pc = current.wrapping_add(self.step);
                }
                current
            }
            _ => return Err(Self::unmapped(offset)),
        };
        self.log.push(RegisterAccess::Read { offset, value });
        Ok(value)
    }

    fn write_u32(&mut self, offset: u64, val: u32) -> Result<()> {
        self.take_failure(offset)?;
        match offset {
            CONTROL_ENABLE => {
                let was_running = self.run_control() == RunControl::Run;
                self.control = val;
                if !was_running && self.run_control() == RunControl::Run {
                    self.pc = self.entry_pc;
                }
            }
            MEM_BASE_ADDRESS => self.mem_base = val,
            // Read-only; the write is dropped like on the real AXI-Lite slave.
            PROGRAM_COUNTER => {}
            _ => return Err(Self::unmapped(offset)),
        }
        self.log.push(RegisterAccess::Write { offset, value: val });
        Ok(())
    }
}

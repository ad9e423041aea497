//! Load-and-run controller.
//!
//! This module sequences the protocol that drives the external core. It provides:
//! 1. **Load:** Copy an instruction image to the head of the shared buffer and flush it.
//! 2. **Start:** Flush the whole buffer, publish its base address, then assert run-enable.
//! 3. **Stop/Reset:** Deassert run-enable.
//! 4. **Observation:** PC sampling, coherent buffer snapshots, waits and checkpoint reports.
//!
//! # State machine
//!
//! ```text
//!            load                 start                stop
//! Halted ─────────▶ Halted ───────────────▶ Running ─────────▶ Stopped
//!   ▲                                                          │
//!   └──────────────────────── load / reset ────────────────────┘
//! ```
//!
//! `Stopped` is halted but not re-armed: starting again requires a fresh `load` or a
//! `reset`. Any bus error moves the controller to `Faulted`, which only `reset` leaves.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::diag::{Checkpoint, DumpWindow, Report, WindowDump};
use super::wait::{self, WaitOutcome, WaitPolicy, WaitReason};
use crate::common::PhysAddr;
use crate::common::error::{ControllerError, Result};
use crate::soc::memory::SharedBuffer;
use crate::soc::regs::{RegisterBlock, RunControl};
use crate::soc::traits::RegisterBus;

/// Controller view of the external core's run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run-enable deasserted; ready to load or start.
    Halted,
    /// Run-enable asserted; the buffer belongs to the core.
    Running,
    /// Run-enable deasserted after a run; load or reset before starting again.
    Stopped,
    /// A register access failed; hardware state is unknown until `reset`.
    Faulted,
}

impl RunState {
    /// Returns `true` if run-enable is known to be deasserted.
    pub const fn is_halted(self) -> bool {
        matches!(self, Self::Halted | Self::Stopped)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halted => write!(f, "halted"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

/// Result of a successful [`CoreController::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Loaded {
    /// Number of words copied to the head of the buffer.
    pub words: usize,
    /// Bus address of the first loaded word.
    pub base_address: PhysAddr,
}

/// Sole owner of one register block and one shared buffer.
#[derive(Debug)]
pub struct CoreController<B> {
    regs: RegisterBlock<B>,
    buffer: SharedBuffer,
    state: RunState,
}

impl<B: RegisterBus> CoreController<B> {
    /// Creates a controller over `bus` and `buffer`.
    ///
    /// No register is touched; call [`reset`](Self::reset) to put the hardware into a
    /// known state.
    pub fn new(bus: B, buffer: SharedBuffer) -> Self {
        Self {
            regs: RegisterBlock::new(bus),
            buffer,
            state: RunState::Halted,
        }
    }

    /// Returns the current run state.
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Returns the shared buffer.
    pub const fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Returns the register bus.
    pub const fn bus(&self) -> &B {
        self.regs.bus()
    }

    /// Returns the register bus mutably.
    ///
    /// Accesses made this way bypass the controller's state tracking.
    pub fn bus_mut(&mut self) -> &mut B {
        self.regs.bus_mut()
    }

    /// Splits the controller into its bus and buffer.
    pub fn into_parts(self) -> (B, SharedBuffer) {
        (self.regs.into_inner(), self.buffer)
    }

    /// Deasserts run-enable from any state and re-arms the controller.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the write fails; the controller is then `Faulted`.
    pub fn reset(&mut self) -> Result<()> {
        self.on_bus(|regs| regs.set_run_enable(RunControl::Halt))?;
        self.transition(RunState::Halted, "reset");
        Ok(())
    }

    /// Samples the program counter register.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the read fails; the controller is then `Faulted`.
    pub fn read_program_counter(&mut self) -> Result<u32> {
        self.on_bus(RegisterBlock::program_counter)
    }

    /// Copies `image` to the head of the buffer and flushes it out of host caches.
    ///
    /// Words past the image keep their previous contents.
    ///
    /// # Errors
    ///
    /// `ControllerError::InvalidState` unless the controller is halted or stopped, and
    /// `ControllerError::ImageTooLarge` if the image exceeds the buffer. Both are raised
    /// before the buffer is touched.
    pub fn load(&mut self, image: &[u32]) -> Result<Loaded> {
        self.require_halted("load")?;
        let capacity = self.buffer.capacity();
        if image.len() > capacity {
            return Err(ControllerError::ImageTooLarge {
                len: image.len(),
                capacity,
            });
        }
        self.buffer.write(0, image)?;
        self.buffer.invalidate_cache_for_range(0, image.len())?;
        self.transition(RunState::Halted, "load");
        info!(words = image.len(), base = %self.buffer.base_address(), "image loaded");
        Ok(Loaded {
            words: image.len(),
            base_address: self.buffer.base_address(),
        })
    }

    /// Hands the buffer to the core and asserts run-enable.
    ///
    /// Order: invalidate the whole buffer, write `MEM_BASE_ADDRESS`, write
    /// `CONTROL_ENABLE = 1`. The base address is on the bus before the core can fetch.
    ///
    /// # Errors
    ///
    /// `ControllerError::InvalidState` unless the controller is `Halted`,
    /// `ControllerError::AddressTooWide` if the buffer address does not fit the register
    /// (both before anything is touched), `ControllerError::Bus` on a register failure.
    pub fn start(&mut self) -> Result<()> {
        if self.state != RunState::Halted {
            return Err(self.invalid("start"));
        }
        let base = self.buffer.base_address();
        if base.to_u32().is_none() {
            return Err(ControllerError::AddressTooWide { address: base });
        }
        self.buffer
            .invalidate_cache_for_range(0, self.buffer.capacity())?;
        self.on_bus(|regs| regs.set_mem_base_address(base))?;
        self.on_bus(|regs| regs.set_run_enable(RunControl::Run))?;
        self.transition(RunState::Running, "start");
        Ok(())
    }

    /// Deasserts run-enable. Calling it while not running is harmless.
    ///
    /// The core may finish in-flight bus transactions after this returns.
    ///
    /// # Errors
    ///
    /// `ControllerError::Bus` if the write fails; the controller is then `Faulted`.
    pub fn stop(&mut self) -> Result<()> {
        self.on_bus(|regs| regs.set_run_enable(RunControl::Halt))?;
        if self.state == RunState::Running {
            self.transition(RunState::Stopped, "stop");
        }
        Ok(())
    }

    /// Returns `count` words from `offset` after invalidating host caches over them.
    ///
    /// # Errors
    ///
    /// `ControllerError::OutOfBounds` if the range exceeds the buffer.
    pub fn snapshot(&self, offset: usize, count: usize) -> Result<Vec<u32>> {
        self.buffer.invalidate_cache_for_range(offset, count)?;
        self.buffer.read(offset, count)
    }

    /// Lets the core run according to `policy` and reports the last PC sample.
    ///
    /// # Errors
    ///
    /// `ControllerError::InvalidState` unless running, `ControllerError::Bus` if a PC
    /// sample fails (the controller is then `Faulted`).
    pub fn wait(&mut self, policy: &WaitPolicy) -> Result<WaitOutcome> {
        if self.state != RunState::Running {
            return Err(self.invalid("wait"));
        }
        let outcome = {
            let regs = &mut self.regs;
            wait::run(policy, || regs.program_counter())
        };
        let outcome = self.note_fault(outcome)?;
        if outcome.reason == WaitReason::TimedOut {
            warn!(pc = outcome.pc, elapsed = ?outcome.elapsed, "wait timed out");
        } else {
            info!(pc = outcome.pc, reason = ?outcome.reason, elapsed = ?outcome.elapsed, "wait finished");
        }
        Ok(outcome)
    }

    /// Samples the PC and dumps `windows` of the buffer.
    ///
    /// Windows are trimmed to the buffer capacity.
    ///
    /// # Errors
    ///
    /// `ControllerError::OutOfBounds` for a window starting past the end of the buffer,
    /// `ControllerError::Bus` if the PC read fails.
    pub fn checkpoint(&mut self, checkpoint: Checkpoint, windows: &[DumpWindow]) -> Result<Report> {
        let capacity = self.buffer.capacity();
        let clamped = windows
            .iter()
            .map(|window| {
                window.clamp(capacity).ok_or(ControllerError::OutOfBounds {
                    offset: window.offset,
                    len: window.count,
                    capacity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let program_counter = self.read_program_counter()?;
        let windows = clamped
            .into_iter()
            .map(|window| {
                self.snapshot(window.offset, window.count)
                    .map(|words| WindowDump {
                        offset: window.offset,
                        words,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(%checkpoint, pc = program_counter, state = %self.state, "checkpoint");
        Ok(Report {
            checkpoint,
            state: self.state,
            program_counter,
            base_address: self.buffer.base_address(),
            windows,
        })
    }

    fn on_bus<T>(&mut self, op: impl FnOnce(&mut RegisterBlock<B>) -> Result<T>) -> Result<T> {
        let result = op(&mut self.regs);
        self.note_fault(result)
    }

    fn note_fault<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ControllerError::Bus { register, reason }) = &result {
            warn!(register, reason = %reason, from = %self.state, "bus error, controller faulted");
            self.state = RunState::Faulted;
        }
        result
    }

    fn require_halted(&self, operation: &'static str) -> Result<()> {
        if self.state.is_halted() {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    const fn invalid(&self, operation: &'static str) -> ControllerError {
        ControllerError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn transition(&mut self, to: RunState, operation: &'static str) {
        if self.state != to {
            info!(from = %self.state, to = %to, operation, "state change");
        }
        self.state = to;
    }
}

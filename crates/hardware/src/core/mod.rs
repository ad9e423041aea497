//! Host-side control of the external core.
//!
//! This module contains the controller that sequences the load-and-run protocol, the
//! wait policies used between asserting run-enable and inspecting results, and the
//! checkpoint reports produced for diagnostics.

/// Controller state machine (load, start, stop, reset, snapshot).
pub mod controller;

/// Checkpoint diagnostics (buffer windows, PC, rendering).
pub mod diag;

/// Wait and poll policies for run completion.
pub mod wait;

pub use self::controller::{CoreController, Loaded, RunState};
pub use self::diag::{Checkpoint, DumpWindow, Report};
pub use self::wait::{WaitOutcome, WaitPolicy, WaitReason};

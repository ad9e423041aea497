//! Load-and-run session.
//!
//! A session strings the controller operations into the full bring-up sequence:
//! 1. **Reset:** Deassert run-enable and sample the initial PC.
//! 2. **Load:** Dump the buffer, copy the image in, dump it again.
//! 3. **Run:** Start the core and wait according to the configured policy.
//! 4. **Inspect:** Optionally stop the core, then dump the buffer a last time.
//!
//! Every checkpoint report is kept in the returned summary.

use serde::Serialize;
use tracing::{info, info_span};

use super::loader::InstructionImage;
use crate::common::error::Result;
use crate::config::Config;
use crate::core::controller::{CoreController, Loaded, RunState};
use crate::core::diag::{Checkpoint, DumpWindow, Report};
use crate::core::wait::{WaitOutcome, WaitPolicy};
use crate::soc::traits::RegisterBus;

/// Everything observed during one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// PC sampled right after reset.
    pub initial_pc: u32,
    /// Load result.
    pub loaded: Loaded,
    /// Wait result.
    pub outcome: WaitOutcome,
    /// Checkpoint reports, in order taken.
    pub reports: Vec<Report>,
    /// Controller state when the session ended.
    pub final_state: RunState,
}

/// Parameters of a load-and-run session.
#[derive(Debug, Clone)]
pub struct Session {
    windows: Vec<DumpWindow>,
    policy: WaitPolicy,
    stop_after_wait: bool,
}

impl Session {
    /// Creates a session with the given dump windows and wait policy that stops the
    /// core once the wait is over.
    pub fn new(windows: Vec<DumpWindow>, policy: WaitPolicy) -> Self {
        Self {
            windows,
            policy,
            stop_after_wait: true,
        }
    }

    /// Creates a session from the `diagnostics` and `run` sections of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            windows: config.diagnostics.windows.clone(),
            policy: config.run.wait,
            stop_after_wait: config.run.stop_after_wait,
        }
    }

    /// Sets whether run-enable is deasserted after the wait.
    #[must_use]
    pub fn with_stop_after_wait(mut self, stop: bool) -> Self {
        self.stop_after_wait = stop;
        self
    }

    /// Returns the wait policy.
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Runs the whole sequence on `controller`.
    ///
    /// # Errors
    ///
    /// The first controller error aborts the session. After a failure past `start`, the
    /// core is left as it was; call `stop` or `reset` on the controller to halt it.
    pub fn run<B: RegisterBus>(
        &self,
        controller: &mut CoreController<B>,
        image: &InstructionImage,
    ) -> Result<SessionSummary> {
        let span = info_span!("session", bus = controller.bus().name(), words = image.len());
        let _guard = span.enter();

        controller.reset()?;
        let initial_pc = controller.read_program_counter()?;
        info!(pc = initial_pc, "core reset");

        let mut reports = Vec::with_capacity(3);
        reports.push(controller.checkpoint(Checkpoint::BeforeLoad, &self.windows)?);

        let loaded = controller.load(image.words())?;
        reports.push(controller.checkpoint(Checkpoint::AfterLoad, &self.windows)?);

        controller.start()?;
        let outcome = controller.wait(&self.policy)?;
        if self.stop_after_wait {
            controller.stop()?;
        }
        reports.push(controller.checkpoint(Checkpoint::AfterRun, &self.windows)?);

        info!(pc = outcome.pc, reason = ?outcome.reason, state = %controller.state(), "session finished");
        Ok(SessionSummary {
            initial_pc,
            loaded,
            outcome,
            reports,
            final_state: controller.state(),
        })
    }
}

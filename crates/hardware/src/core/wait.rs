//! Wait policies between asserting run-enable and inspecting results.
//!
//! The external core exposes no completion signal, only its program counter. A wait
//! policy decides how long to let the core run and what PC behavior counts as progress:
//! 1. **Fixed:** Sleep for a set duration, then sample the PC once.
//! 2. **Until PC changes:** Poll until the PC moves away from its first sample.
//! 3. **Until PC equals:** Poll until the PC reaches a known terminal address.
//!
//! A timeout is a normal outcome, not an error.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::common::error::Result;

/// Default fixed wait before sampling the PC.
const DEFAULT_FIXED: Duration = Duration::from_secs(5);
/// Default poll interval for polling policies.
const DEFAULT_POLL: Duration = Duration::from_millis(10);

/// How to wait for the external core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Sleep for `duration`, then sample the PC.
    Fixed {
        /// Time to let the core run.
        #[serde(rename = "millis", with = "millis")]
        duration: Duration,
    },
    /// Poll until the PC differs from its first sample.
    UntilPcChanges {
        /// Give up after this long.
        #[serde(rename = "timeout_millis", with = "millis")]
        timeout: Duration,
        /// Delay between samples.
        #[serde(rename = "poll_millis", with = "millis", default = "default_poll")]
        poll_interval: Duration,
    },
    /// Poll until the PC equals `target`.
    UntilPcEquals {
        /// PC value that signals completion.
        target: u32,
        /// Give up after this long.
        #[serde(rename = "timeout_millis", with = "millis")]
        timeout: Duration,
        /// Delay between samples.
        #[serde(rename = "poll_millis", with = "millis", default = "default_poll")]
        poll_interval: Duration,
    },
}

const fn default_poll() -> Duration {
    DEFAULT_POLL
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::Fixed {
            duration: DEFAULT_FIXED,
        }
    }
}

/// Why a wait finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    /// The fixed duration elapsed.
    Elapsed,
    /// The PC moved away from its first sample.
    PcChanged,
    /// The PC reached the target address.
    PcReached,
    /// The timeout elapsed before the condition held.
    TimedOut,
}

/// Result of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitOutcome {
    /// Last PC sample.
    pub pc: u32,
    /// Time spent waiting.
    #[serde(rename = "elapsed_millis", with = "millis")]
    pub elapsed: Duration,
    /// Why the wait ended.
    pub reason: WaitReason,
    /// Number of PC samples taken.
    pub samples: u32,
}

impl WaitOutcome {
    /// Returns `true` unless the wait timed out.
    pub fn completed(&self) -> bool {
        self.reason != WaitReason::TimedOut
    }
}

/// Runs `policy`, calling `sample` whenever the PC must be read.
///
/// # Errors
///
/// Propagates the first error returned by `sample`.
pub fn run<F>(policy: &WaitPolicy, mut sample: F) -> Result<WaitOutcome>
where
    F: FnMut() -> Result<u32>,
{
    let start = Instant::now();
    let mut samples = 0u32;
    let mut take = || {
        samples += 1;
        sample()
    };

    let (pc, reason) = match *policy {
        WaitPolicy::Fixed { duration } => {
            thread::sleep(duration);
            (take()?, WaitReason::Elapsed)
        }
        WaitPolicy::UntilPcChanges {
            timeout,
            poll_interval,
        } => {
            let first = take()?;
            loop {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    break (first, WaitReason::TimedOut);
                }
                thread::sleep(poll_interval.min(timeout - elapsed));
                let pc = take()?;
                if pc != first {
                    break (pc, WaitReason::PcChanged);
                }
            }
        }
        WaitPolicy::UntilPcEquals {
            target,
            timeout,
            poll_interval,
        } => loop {
            let pc = take()?;
            if pc == target {
                break (pc, WaitReason::PcReached);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break (pc, WaitReason::TimedOut);
            }
            thread::sleep(poll_interval.min(timeout - elapsed));
        },
    };

    Ok(WaitOutcome {
        pc,
        elapsed: start.elapsed(),
        reason,
        samples,
    })
}

/// Serializes a `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

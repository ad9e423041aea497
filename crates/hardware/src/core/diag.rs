//! Checkpoint diagnostics.
//!
//! At fixed points of a run (before load, after load, after run) the harness records the
//! program counter and a few windows of the shared buffer. Reports are data first: they
//! serialize to JSON and render as the tab-separated hex dumps engineers are used to
//! reading off a serial console.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::controller::RunState;
use crate::common::PhysAddr;

/// Point in the run at which a report is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// After reset, before the image is copied in.
    BeforeLoad,
    /// After the image is copied and flushed, before run-enable.
    AfterLoad,
    /// After the wait policy finished.
    AfterRun,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeLoad => write!(f, "before load"),
            Self::AfterLoad => write!(f, "after load"),
            Self::AfterRun => write!(f, "after run"),
        }
    }
}

/// A range of buffer words to dump, in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DumpWindow {
    /// First word.
    pub offset: usize,
    /// Number of words.
    pub count: usize,
}

impl DumpWindow {
    /// Creates a window of `count` words starting at `offset`.
    pub const fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    /// Trims the window to a buffer of `capacity` words.
    ///
    /// Returns `None` if the window starts at or past the end of the buffer.
    pub fn clamp(&self, capacity: usize) -> Option<Self> {
        if self.offset >= capacity {
            return None;
        }
        let count = self.count.min(capacity - self.offset);
        Some(Self::new(self.offset, count))
    }
}

/// Contents of one dumped window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowDump {
    /// First word of the window.
    pub offset: usize,
    /// Words read from the buffer.
    pub words: Vec<u32>,
}

impl WindowDump {
    fn heading(&self) -> String {
        if self.offset == 0 {
            format!("first {} words", self.words.len())
        } else {
            format!("words {}..{}", self.offset, self.offset + self.words.len())
        }
    }
}

/// Snapshot of the program counter and buffer windows at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// When the report was taken.
    pub checkpoint: Checkpoint,
    /// Controller state at the time.
    pub state: RunState,
    /// PC register sample.
    pub program_counter: u32,
    /// Bus address of the shared buffer.
    pub base_address: PhysAddr,
    /// Dumped windows, in request order.
    pub windows: Vec<WindowDump>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "***** {} *****",
            self.checkpoint.to_string().to_uppercase()
        )?;
        writeln!(f, "PC register value: {}", self.program_counter)?;
        writeln!(f, "buffer base: {}  state: {}", self.base_address, self.state)?;
        for window in &self.windows {
            writeln!(f, "{}:", window.heading())?;
            let line = window
                .words
                .iter()
                .map(|w| format!("{w:x}"))
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

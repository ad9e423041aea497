//! Configuration for the load-and-run harness.
//!
//! This module defines the configuration structures used to parameterize a run. It provides:
//! 1. **Defaults:** Register block base, buffer capacity, dump windows, wait policy.
//! 2. **Structures:** Hierarchical config for registers, memory, diagnostics, and run control.
//! 3. **Enums:** Shared buffer backing (heap or reserved physical region).
//!
//! Configuration is supplied as JSON (`Config::from_json` / `Config::from_file`) or taken
//! from `Config::default()`. Every field may be omitted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::Result;
use crate::core::diag::DumpWindow;
use crate::core::wait::WaitPolicy;

/// Default configuration constants.
mod defaults {
    /// Base address of the core's AXI-Lite register block.
    ///
    /// First general-purpose slave slot on Zynq-7000 `M_AXI_GP0`, where block-design
    /// address assignment places a single custom IP by default.
    pub const REGISTER_BASE: u64 = 0x43C0_0000;

    /// Shared buffer capacity in 32-bit words.
    pub const CAPACITY_WORDS: usize = crate::common::constants::DEFAULT_CAPACITY_WORDS;

    /// Memory device used for `/dev/mem`-style mappings.
    pub const MEMORY_DEVICE: &str = "/dev/mem";

    /// Words in each default dump window. The windows cover the head of the image
    /// and the data region at the middle of the buffer.
    pub const DUMP_WINDOW_WORDS: usize = 32;
}

/// Backing storage for the shared buffer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferBacking {
    /// Anonymous host memory.
    Heap {
        /// Address the core uses to reach the buffer, when it differs from the host
        /// pointer (e.g. behind an address translation window).
        #[serde(default)]
        bus_address: Option<u64>,
    },
    /// A reserved, physically contiguous region mapped through a memory device.
    Physical {
        /// Physical address of the region's first word.
        address: u64,
        /// Memory device to map through.
        #[serde(default = "BufferBacking::default_device")]
        device: String,
    },
}

impl BufferBacking {
    fn default_device() -> String {
        defaults::MEMORY_DEVICE.to_string()
    }
}

impl Default for BufferBacking {
    fn default() -> Self {
        Self::Heap { bus_address: None }
    }
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use rvboot_core::config::{BufferBacking, Config};
///
/// let json = r#"{
///     "registers": { "base": 1136656384 },
///     "memory": {
///         "capacity_words": 4096,
///         "backing": { "kind": "physical", "address": 268435456 }
///     },
///     "run": {
///         "wait": { "kind": "until_pc_changes", "timeout_millis": 200, "poll_millis": 5 }
///     }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.registers.base, 0x43C0_0000);
/// assert_eq!(config.memory.capacity_words, 4096);
/// assert!(matches!(config.memory.backing, BufferBacking::Physical { address: 0x1000_0000, .. }));
/// assert!(config.run.stop_after_wait);
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
    /// Register block location and access.
    #[serde(default)]
    pub registers: RegisterConfig,
    /// Shared buffer size and backing.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Checkpoint dump settings.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Run control (wait policy, stop behavior).
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// `ControllerError::Config` if the JSON is malformed, has wrong field types, or names
    /// a dump window that starts past the end of the buffer.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// `ControllerError::Io` if the file cannot be read, `ControllerError::Config` if it
    /// does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Wire form of [`Config`], before defaults that depend on other sections are filled in.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    registers: RegisterConfig,
    #[serde(default)]
    memory: MemoryConfig,
    #[serde(default)]
    diagnostics: RawDiagnostics,
    #[serde(default)]
    run: RunConfig,
}

#[derive(Default, Deserialize)]
struct RawDiagnostics {
    #[serde(default)]
    windows: Option<Vec<DumpWindow>>,
}

impl TryFrom<RawConfig> for Config {
    type Error = String;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        let capacity = raw.memory.capacity_words;
        let windows = match raw.diagnostics.windows {
            Some(windows) => {
                if let Some(window) = windows.iter().find(|w| w.clamp(capacity).is_none()) {
                    return Err(format!(
                        "dump window at word {} starts past the end of a {capacity}-word buffer",
                        window.offset
                    ));
                }
                windows
            }
            None => DiagnosticsConfig::windows_for(capacity),
        };
        Ok(Self {
            registers: raw.registers,
            memory: raw.memory,
            diagnostics: DiagnosticsConfig { windows },
            run: raw.run,
        })
    }
}

/// Register block configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterConfig {
    /// Physical base address of the register block.
    #[serde(default = "RegisterConfig::default_base")]
    pub base: u64,

    /// Memory device the register block is mapped through.
    #[serde(default = "RegisterConfig::default_device")]
    pub device: String,
}

impl RegisterConfig {
    fn default_base() -> u64 {
        defaults::REGISTER_BASE
    }

    fn default_device() -> String {
        defaults::MEMORY_DEVICE.to_string()
    }
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            base: defaults::REGISTER_BASE,
            device: defaults::MEMORY_DEVICE.to_string(),
        }
    }
}

/// Shared buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Buffer capacity in 32-bit words.
    #[serde(default = "MemoryConfig::default_capacity_words")]
    pub capacity_words: usize,

    /// Where the buffer lives.
    #[serde(default)]
    pub backing: BufferBacking,
}

impl MemoryConfig {
    fn default_capacity_words() -> usize {
        defaults::CAPACITY_WORDS
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity_words: defaults::CAPACITY_WORDS,
            backing: BufferBacking::default(),
        }
    }
}

/// Checkpoint diagnostics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosticsConfig {
    /// Buffer windows dumped at every checkpoint.
    #[serde(default = "DiagnosticsConfig::default_windows")]
    pub windows: Vec<DumpWindow>,
}

impl DiagnosticsConfig {
    /// Default windows for a buffer of `capacity` words: the head of the buffer, plus
    /// its middle once the buffer is large enough for the two not to overlap.
    pub fn windows_for(capacity: usize) -> Vec<DumpWindow> {
        let count = defaults::DUMP_WINDOW_WORDS;
        let mut windows = Vec::new();
        if capacity > 0 {
            windows.push(DumpWindow::new(0, count));
        }
        if capacity >= 2 * count {
            windows.push(DumpWindow::new(capacity / 2, count));
        }
        windows
    }

    fn default_windows() -> Vec<DumpWindow> {
        Self::windows_for(defaults::CAPACITY_WORDS)
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            windows: Self::default_windows(),
        }
    }
}

/// Run control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// How to wait between asserting run-enable and inspecting results.
    #[serde(default)]
    pub wait: WaitPolicy,

    /// Deassert run-enable once the wait finishes.
    #[serde(default = "RunConfig::default_stop_after_wait")]
    pub stop_after_wait: bool,
}

impl RunConfig {
    fn default_stop_after_wait() -> bool {
        true
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            stop_after_wait: true,
        }
    }
}

//! Global constants.
//!
//! Sizes shared between the buffer, the register block and the image loaders.

/// Width of one buffer word and one instruction, in bytes.
pub const WORD_BYTES: usize = 4;

/// Default shared buffer capacity in 32-bit words (8 KiB).
pub const DEFAULT_CAPACITY_WORDS: usize = 2 * 1024;

/// Cache line size assumed by range invalidation when the host cannot report one.
pub const FALLBACK_CACHE_LINE_BYTES: usize = 64;

/// Distance, in bytes, the program counter moves per executed instruction.
pub const INSTRUCTION_BYTES: u32 = 4;

/// Largest span of loadable bytes an ELF image may cover (16 MiB). Larger spans are
/// rejected before any allocation.
pub const MAX_ELF_SPAN_BYTES: u64 = 16 * 1024 * 1024;

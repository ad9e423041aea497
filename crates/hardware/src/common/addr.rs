//! Bus address type.
//!
//! Addresses handed to the external core travel through a 32-bit register, while host
//! pointers are 64 bits wide. `PhysAddr` keeps the two apart from plain integers and
//! makes the narrowing explicit.

use std::fmt;

use serde::Serialize;

use super::constants::WORD_BYTES;

/// An address as seen by the external core's bus master.
///
/// For heap-backed buffers this is the host pointer value (identity-mapped on the
/// bare-metal targets the core is usually paired with); for physically mapped buffers
/// it is the physical address of the reserved region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    /// Creates a new address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the address of the word `words` positions after this one.
    pub const fn offset_words(&self, words: usize) -> Self {
        Self(self.0.wrapping_add((words as u64) * WORD_BYTES as u64))
    }

    /// Narrows the address to the 32-bit register width.
    ///
    /// # Returns
    ///
    /// `None` when the address does not fit in 32 bits.
    pub fn to_u32(&self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for PhysAddr {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

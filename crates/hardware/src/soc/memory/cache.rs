//! Data cache maintenance by address range.
//!
//! The external core masters the bus on its own and never snoops host caches. Before it
//! fetches the image, dirty lines holding the image must reach memory; before the host
//! inspects results, lines holding stale copies must be dropped. Both are covered by a
//! clean+invalidate over the range. Plain invalidate would discard a freshly written,
//! still-dirty image.

use std::io;
use std::sync::atomic::{Ordering, fence};

#[cfg(target_arch = "aarch64")]
use crate::common::constants::FALLBACK_CACHE_LINE_BYTES;

/// Cleans and invalidates every data cache line overlapping `[start, start + len)`.
///
/// On aarch64 this issues `DC CIVAC` per line (permitted at EL0 under Linux) followed by
/// `DSB SY`. On 32-bit ARM Linux it uses the `cacheflush` system call. Elsewhere the
/// host is assumed cache coherent with its DMA masters and only a full fence is issued.
///
/// # Errors
///
/// The OS error if the kernel refuses the cache flush (32-bit ARM Linux only).
pub fn clean_invalidate_range(start: *const u8, len: usize) -> io::Result<()> {
    if len > 0 {
        arch_clean_invalidate(start, len)?;
    }
    fence(Ordering::SeqCst);
    Ok(())
}

#[cfg(target_arch = "aarch64")]
#[allow(clippy::unnecessary_wraps)]
fn arch_clean_invalidate(start: *const u8, len: usize) -> io::Result<()> {
    let line = dcache_line_bytes();
    let first = (start as usize) & !(line - 1);
    let end = (start as usize).saturating_add(len);
    let mut addr = first;
    while addr < end {
        // SAFETY: DC CIVAC only affects cache state for the line holding `addr`; the
        // address belongs to a live mapping owned by the caller.
        unsafe {
            std::arch::asm!("dc civac, {0}", in(reg) addr, options(nostack, preserves_flags));
        }
        addr += line;
    }
    // SAFETY: barrier instruction, no memory operands.
    unsafe {
        std::arch::asm!("dsb sy", options(nostack, preserves_flags));
    }
    Ok(())
}

#[cfg(target_arch = "aarch64")]
fn dcache_line_bytes() -> usize {
    let ctr: u64;
    // SAFETY: CTR_EL0 is readable at EL0 on Linux; the read has no side effects.
    unsafe {
        std::arch::asm!("mrs {0}, ctr_el0", out(reg) ctr, options(nomem, nostack, preserves_flags));
    }
    // DminLine, bits [19:16]: log2 of the smallest line size in 4-byte words.
    let words_log2 = (ctr >> 16) & 0xF;
    let line = 4usize << words_log2;
    if line.is_power_of_two() && line >= 16 { line } else { FALLBACK_CACHE_LINE_BYTES }
}

#[cfg(all(target_arch = "arm", target_os = "linux"))]
fn arch_clean_invalidate(start: *const u8, len: usize) -> io::Result<()> {
    // ARM private syscall __ARM_NR_cacheflush (EABI).
    const ARM_NR_CACHEFLUSH: libc::c_long = 0x000f_0002;
    let begin = start as usize;
    let end = begin.saturating_add(len);
    // SAFETY: the kernel validates the range against the caller's mappings; the call
    // only performs cache maintenance.
    let ret = unsafe { libc::syscall(ARM_NR_CACHEFLUSH, begin, end, 0) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(target_arch = "aarch64", all(target_arch = "arm", target_os = "linux"))))]
#[allow(clippy::unnecessary_wraps)]
const fn arch_clean_invalidate(_start: *const u8, _len: usize) -> io::Result<()> {
    Ok(())
}

//! Shared word buffer.
//!
//! This module provides a bounds-checked wrapper around the memory the external core
//! fetches from. Storage is either an anonymous mapping (heap-like, zero-filled by the
//! kernel) or a reserved physical region mapped through a memory device. All word
//! accesses are volatile because a second bus master reads and writes the same memory.

use std::cell::Cell;
use std::fmt;
#[cfg(unix)]
use std::path::Path;

use tracing::{debug, warn};

use super::cache;
#[cfg(unix)]
use super::mapping::DeviceMapping;
use crate::common::PhysAddr;
use crate::common::constants::WORD_BYTES;
use crate::common::error::{ControllerError, Result};

/// Owner of the memory behind a [`SharedBuffer`]; unmapped or freed on drop.
enum Storage {
    #[cfg(unix)]
    Anonymous { map: *mut libc::c_void, len: usize },
    #[cfg(unix)]
    Device(DeviceMapping),
    #[cfg(not(unix))]
    Owned(Box<[u32]>),
}

/// Fixed-capacity buffer of 32-bit words shared with the external core.
///
/// The buffer's address and capacity never change after construction. The bus address
/// published to the core defaults to the host address of the first word and can be
/// overridden with [`with_bus_address`](Self::with_bus_address) when the core sees host
/// memory through a translation window.
pub struct SharedBuffer {
    ptr: *mut u32,
    capacity: usize,
    bus_addr: PhysAddr,
    invalidations: Cell<u64>,
    _storage: Storage,
}

// SAFETY: the buffer exclusively owns its mapping; moving it to another thread moves
// that ownership. It is not `Sync` (the invalidation counter is a `Cell`).
unsafe impl Send for SharedBuffer {}

impl SharedBuffer {
    /// Reserves `capacity` zero-initialized words of host memory.
    ///
    /// On Unix this is an anonymous shared mapping; elsewhere a heap allocation.
    ///
    /// # Errors
    ///
    /// `ControllerError::Allocation` if `capacity` is zero, overflows the address space,
    /// or the host refuses the allocation.
    pub fn allocate(capacity: usize) -> Result<Self> {
        let bytes = byte_len(capacity)?;

        #[cfg(unix)]
        {
            // SAFETY: anonymous mapping with no fixed address; checked against MAP_FAILED.
            let map = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    bytes,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if map == libc::MAP_FAILED {
                return Err(ControllerError::Allocation {
                    capacity,
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
            let ptr = map.cast::<u32>();
            debug!(capacity, addr = ptr as usize, "allocated shared buffer");
            Ok(Self::from_parts(ptr, capacity, Storage::Anonymous { map, len: bytes }))
        }

        #[cfg(not(unix))]
        {
            let _ = bytes;
            let mut words: Vec<u32> = Vec::new();
            words
                .try_reserve_exact(capacity)
                .map_err(|e| ControllerError::Allocation {
                    capacity,
                    reason: e.to_string(),
                })?;
            words.resize(capacity, 0);
            let mut owned = words.into_boxed_slice();
            let ptr = owned.as_mut_ptr();
            debug!(capacity, addr = ptr as usize, "allocated shared buffer");
            Ok(Self::from_parts(ptr, capacity, Storage::Owned(owned)))
        }
    }

    /// Maps a reserved, physically contiguous region as the shared buffer.
    ///
    /// The region is zeroed after mapping and its physical address becomes the bus
    /// address published to the core.
    ///
    /// # Errors
    ///
    /// `ControllerError::Allocation` if the capacity is invalid, the region is not word
    /// aligned, or the device cannot be opened or mapped.
    #[cfg(unix)]
    pub fn map_physical(device: &Path, address: PhysAddr, capacity: usize) -> Result<Self> {
        let bytes = byte_len(capacity)?;
        if address.val() % WORD_BYTES as u64 != 0 {
            return Err(ControllerError::Allocation {
                capacity,
                reason: format!("physical address {address} is not word aligned"),
            });
        }
        let mapping = DeviceMapping::open(device, address.val(), bytes).map_err(|e| {
            ControllerError::Allocation {
                capacity,
                reason: format!("{}: {e}", device.display()),
            }
        })?;
        let ptr = mapping.as_mut_ptr().cast::<u32>();
        let buffer = Self::from_parts(ptr, capacity, Storage::Device(mapping))
            .with_bus_address(address);
        for i in 0..capacity {
            // SAFETY: `i < capacity` and the mapping spans `capacity` words.
            unsafe { buffer.ptr.add(i).write_volatile(0) };
        }
        debug!(capacity, %address, device = %device.display(), "mapped shared buffer");
        Ok(buffer)
    }

    fn from_parts(ptr: *mut u32, capacity: usize, storage: Storage) -> Self {
        Self {
            ptr,
            capacity,
            bus_addr: PhysAddr::new(ptr as u64),
            invalidations: Cell::new(0),
            _storage: storage,
        }
    }

    /// Overrides the bus address published to the core.
    ///
    /// Only available before the buffer is handed to a controller, which keeps the
    /// address stable for the rest of the buffer's life.
    #[must_use]
    pub fn with_bus_address(mut self, addr: PhysAddr) -> Self {
        self.bus_addr = addr;
        self
    }

    /// Returns the capacity in words.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the address the external core uses to reach word 0.
    pub const fn base_address(&self) -> PhysAddr {
        self.bus_addr
    }

    /// Returns how many cache invalidations have been performed on this buffer.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.get()
    }

    /// Copies `words` into `[offset, offset + words.len())`.
    ///
    /// # Errors
    ///
    /// `ControllerError::OutOfBounds` if the range exceeds the capacity; nothing is
    /// written in that case.
    pub fn write(&mut self, offset: usize, words: &[u32]) -> Result<()> {
        self.check_range(offset, words.len())?;
        for (i, &word) in words.iter().enumerate() {
            // SAFETY: range checked above.
            unsafe { self.ptr.add(offset + i).write_volatile(word) };
        }
        Ok(())
    }

    /// Returns a copy of `count` words starting at `offset`.
    ///
    /// # Errors
    ///
    /// `ControllerError::OutOfBounds` if the range exceeds the capacity.
    pub fn read(&self, offset: usize, count: usize) -> Result<Vec<u32>> {
        self.check_range(offset, count)?;
        // SAFETY: range checked above.
        Ok((0..count)
            .map(|i| unsafe { self.ptr.add(offset + i).read_volatile() })
            .collect())
    }

    /// Cleans and invalidates host cache lines covering `[offset, offset + len)` words.
    ///
    /// Does not change the buffer's contents.
    ///
    /// # Errors
    ///
    /// `ControllerError::OutOfBounds` if the range exceeds the capacity,
    /// `ControllerError::Io` if the host refuses the cache maintenance.
    pub fn invalidate_cache_for_range(&self, offset: usize, len: usize) -> Result<()> {
        self.check_range(offset, len)?;
        // SAFETY: `offset <= capacity`, so the pointer is within or one past the mapping.
        let start = unsafe { self.ptr.add(offset) }.cast::<u8>().cast_const();
        cache::clean_invalidate_range(start, len * WORD_BYTES).inspect_err(|e| {
            warn!(offset, len, error = %e, "cache invalidate failed");
        })?;
        self.invalidations.set(self.invalidations.get() + 1);
        debug!(offset, len, "cache invalidate");
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(ControllerError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            }),
        }
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("capacity", &self.capacity)
            .field("base_address", &self.bus_addr)
            .field("invalidations", &self.invalidations.get())
            .finish_non_exhaustive()
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Self::Anonymous { map, len } = *self {
            // SAFETY: exactly the region returned by mmap in `allocate`.
            unsafe {
                let _ = libc::munmap(map, len);
            }
        }
    }
}

fn byte_len(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        return Err(ControllerError::Allocation {
            capacity,
            reason: "capacity must be at least one word".to_string(),
        });
    }
    capacity
        .checked_mul(WORD_BYTES)
        .filter(|&bytes| isize::try_from(bytes).is_ok())
        .ok_or_else(|| ControllerError::Allocation {
            capacity,
            reason: "capacity overflows the host address space".to_string(),
        })
}

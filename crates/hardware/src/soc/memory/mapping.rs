//! Physical memory windows mapped through a memory device file.
//!
//! Used both for the register block and for reserved buffer regions. The device is
//! opened with `O_SYNC` so that, on ARM Linux, the mapping is non-cacheable.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;

/// A live `mmap` of a physical address window.
#[derive(Debug)]
pub struct DeviceMapping {
    map: *mut libc::c_void,
    map_len: usize,
    delta: usize,
    len: usize,
}

impl DeviceMapping {
    /// Maps `len` bytes of physical memory starting at `phys` through `device`.
    ///
    /// `phys` need not be page aligned; the mapping is widened to page boundaries and
    /// [`as_mut_ptr`](Self::as_mut_ptr) points at `phys` itself.
    ///
    /// # Errors
    ///
    /// Any error from opening the device or from `mmap`, or `InvalidInput` when the
    /// window cannot be expressed as a file offset on this host.
    pub fn open(device: &Path, phys: u64, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty mapping"));
        }
        let page = page_size();
        let aligned = phys & !(page as u64 - 1);
        let delta = (phys - aligned) as usize;
        let map_len = len
            .checked_add(delta)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "mapping length overflows"))?;
        let offset = libc::off_t::try_from(aligned).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("physical address {phys:#x} exceeds the host file offset range"),
            )
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(device)?;

        // SAFETY: arguments describe a fresh shared mapping of an open descriptor; the
        // result is checked against MAP_FAILED before use.
        let map = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if map == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            map,
            map_len,
            delta,
            len,
        })
    }

    /// Returns a pointer to the first byte of the requested window.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        // SAFETY: `delta < page size <= map_len`, so the result stays inside the mapping.
        unsafe { self.map.cast::<u8>().add(self.delta) }
    }

    /// Returns the length of the requested window in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the window is empty (never the case for an open mapping).
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for DeviceMapping {
    fn drop(&mut self) {
        // SAFETY: `map`/`map_len` are exactly what mmap returned and nothing else unmaps it.
        unsafe {
            let _ = libc::munmap(self.map, self.map_len);
        }
    }
}

/// Returns the host page size, falling back to 4 KiB if `sysconf` fails.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(raw).ok().filter(|p| p.is_power_of_two()).unwrap_or(4096)
}

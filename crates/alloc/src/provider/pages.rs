//! Provider backed by anonymous page mappings
//!
//! Blocks come straight from `mmap`. Released mappings are parked in a small
//! cache and reused by later requests; [`MemoryProvider::purge`] unmaps the
//! cache.

use core::ptr::{self, NonNull};

use super::{MemoryProvider, Prefix};
use crate::error::{AllocError, AllocResult};
use crate::utils::{align_up, is_power_of_two};

#[cfg(feature = "logging")]
use tracing::debug;

/// Mappings kept for reuse before falling back to `munmap`
const CACHE_LIMIT: usize = 8;

/// Page-mapping memory provider (unix)
#[derive(Debug)]
pub struct PageProvider {
    page_size: usize,
    /// Released mappings as (base, length)
    cache: Vec<(NonNull<u8>, usize)>,
}

// SAFETY: cached mappings are process-wide and owned exclusively by this
// provider; nothing ties them to the creating thread.
unsafe impl Send for PageProvider {}

impl PageProvider {
    pub fn new() -> Self {
        // SAFETY: sysconf has no preconditions.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        Self {
            page_size: usize::try_from(page_size).unwrap_or(4096),
            cache: Vec::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bytes currently parked in the reuse cache
    pub fn cached_bytes(&self) -> usize {
        self.cache.iter().map(|(_, len)| len).sum()
    }

    fn map(&mut self, len: usize) -> AllocResult<(NonNull<u8>, usize)> {
        if let Some(index) = self
            .cache
            .iter()
            .position(|&(_, cached)| cached >= len && cached <= len * 2)
        {
            return Ok(self.cache.swap_remove(index));
        }

        // SAFETY: anonymous private mapping with no address hint; the kernel
        // validates the length and reports failure through MAP_FAILED.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(AllocError::provider_exhausted(len, self.page_size));
        }
        NonNull::new(base.cast::<u8>())
            .map(|base| (base, len))
            .ok_or_else(|| AllocError::provider_exhausted(len, self.page_size))
    }

    fn unmap(base: NonNull<u8>, len: usize) {
        // SAFETY: (base, len) describes a mapping created by `map` that no
        // block refers to any more.
        unsafe {
            libc::munmap(base.as_ptr().cast::<libc::c_void>(), len);
        }
    }
}

impl Default for PageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PageProvider {
    /// Clones start with an empty cache
    fn clone(&self) -> Self {
        Self {
            page_size: self.page_size,
            cache: Vec::new(),
        }
    }
}

// SAFETY: PageProvider upholds the MemoryProvider contract.
// - mappings are page aligned and align <= page_size is enforced
// - the prefix lives inside the mapping, before the returned pointer
// - reallocate maps the replacement before releasing the original
unsafe impl MemoryProvider for PageProvider {
    fn header_size(&self) -> usize {
        Prefix::SIZE
    }

    fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        if !is_power_of_two(align) || align > self.page_size {
            return Err(AllocError::invalid_alignment(align));
        }
        let lead =
            Prefix::lead_for(align, offset).ok_or_else(|| AllocError::size_overflow("page lead"))?;
        let needed = lead
            .checked_add(size)
            .filter(|n| *n <= isize::MAX as usize - self.page_size)
            .ok_or_else(|| AllocError::size_overflow("page mapping size"))?;
        let (base, len) = self.map(align_up(needed, self.page_size))?;

        // SAFETY: lead < len, the pointer stays inside the mapping.
        let ptr = unsafe { base.add(lead) };
        // SAFETY: lead >= Prefix::SIZE bytes of the mapping precede ptr.
        unsafe {
            Prefix {
                size,
                lead,
                extra: len,
            }
            .write(ptr);
        }
        Ok(ptr)
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        // SAFETY: ptr came from this provider (caller contract).
        let old = unsafe { Prefix::read(ptr) };
        let new_ptr = self.allocate(size, align, offset)?;

        // SAFETY: distinct mappings never overlap; both hold min(old, new) bytes.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old.size.min(size));
            self.deallocate(ptr);
        }
        Ok(new_ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: ptr came from this provider (caller contract).
        let prefix = unsafe { Prefix::read(ptr) };
        // SAFETY: lead bytes precede ptr inside the same mapping.
        let base = unsafe { ptr.sub(prefix.lead) };

        if self.cache.len() < CACHE_LIMIT {
            self.cache.push((base, prefix.extra));
        } else {
            Self::unmap(base, prefix.extra);
        }
    }

    fn purge(&mut self) -> usize {
        let released = self.cached_bytes();
        for (base, len) in self.cache.drain(..) {
            Self::unmap(base, len);
        }

        #[cfg(feature = "logging")]
        {
            if released > 0 {
                debug!(released, "unmapped cached pages");
            }
        }

        released
    }
}

impl Drop for PageProvider {
    fn drop(&mut self) {
        self.purge();
    }
}

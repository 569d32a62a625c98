//! Memory providers: where buffer chains get their raw blocks
//!
//! A provider hands out blocks of memory and takes them back by pointer
//! alone, so every provider in this module keeps a small prefix in front of
//! the pointer it returns describing the underlying allocation. The caller's
//! `offset` bytes sit in front of that prefix.
//!
//! ```text
//! [padding][caller prefix (offset)][size|lead|extra][block ...]
//!  ^ base                                            ^ returned pointer, aligned
//! ```

use core::ptr::NonNull;

use crate::error::AllocResult;
use crate::utils::{WORD, place_with_offset};

mod heap;
#[cfg(all(unix, feature = "os-pages"))]
mod pages;

pub use heap::HeapProvider;
#[cfg(all(unix, feature = "os-pages"))]
pub use pages::PageProvider;

/// Source of raw memory for buffer chains
///
/// # Safety
///
/// Implementors must ensure that:
/// - `allocate(size, align, offset)` returns a pointer `p` aligned to `align`
///   and valid for reads and writes of `size` bytes, with at least `offset`
///   writable bytes of the same allocation ending at `p - header_size()`
/// - blocks stay valid until passed to `deallocate` or `reallocate`
/// - a failed `reallocate` leaves the original block untouched
pub unsafe trait MemoryProvider {
    /// Bytes of bookkeeping the provider keeps directly before each block
    fn header_size(&self) -> usize;

    /// Allocates a block of `size` bytes
    fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>>;

    /// Resizes a block, preserving `min(old, new)` leading bytes
    ///
    /// # Safety
    /// - `ptr` must have been returned by this provider and not yet released
    /// - on success `ptr` is invalid; on failure it is still owned by the caller
    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>>;

    /// Releases a block
    ///
    /// # Safety
    /// - `ptr` must have been returned by this provider and not yet released
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>);

    /// Returns cached memory to the system, reporting the bytes released
    fn purge(&mut self) -> usize {
        0
    }
}

/// Bookkeeping stored immediately before every provider block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Prefix {
    /// Usable bytes requested by the caller
    pub size: usize,
    /// Distance from the underlying allocation start to the returned pointer
    pub lead: usize,
    /// Provider specific: alignment for the heap, mapping length for pages
    pub extra: usize,
}

impl Prefix {
    pub const SIZE: usize = 3 * WORD;

    /// Distance from an `align`-aligned base to the returned pointer
    ///
    /// Always a multiple of `align` and at least `SIZE + offset`.
    pub fn lead_for(align: usize, offset: usize) -> Option<usize> {
        place_with_offset(Self::SIZE, align, offset)
    }

    /// # Safety
    /// `ptr` must come from a provider block, which always has `SIZE`
    /// writable bytes in front of it.
    pub unsafe fn write(self, ptr: NonNull<u8>) {
        let words = [self.size, self.lead, self.extra];
        // SAFETY: caller guarantees SIZE bytes before ptr belong to the block.
        // write_unaligned because ptr is only `align` aligned, which may be
        // below a word.
        unsafe {
            ptr.as_ptr()
                .sub(Self::SIZE)
                .cast::<[usize; 3]>()
                .write_unaligned(words);
        }
    }

    /// # Safety
    /// Same contract as [`Prefix::write`], and the prefix must have been written.
    pub unsafe fn read(ptr: NonNull<u8>) -> Self {
        // SAFETY: caller guarantees an initialised prefix precedes ptr.
        let [size, lead, extra] = unsafe {
            ptr.as_ptr()
                .sub(Self::SIZE)
                .cast::<[usize; 3]>()
                .read_unaligned()
        };
        Self { size, lead, extra }
    }
}

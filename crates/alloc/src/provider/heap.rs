//! Provider backed by the process heap
//!
//! Delegates to [`std::alloc::System`] the same way the system allocator
//! wrapper does, with a [`Prefix`] in front of each block so `deallocate`
//! can rebuild the original layout from the pointer alone.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use std::alloc::System;

use super::{MemoryProvider, Prefix};
use crate::error::{AllocError, AllocResult};
use crate::utils::{WORD, is_power_of_two};

/// Heap-backed memory provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapProvider;

impl HeapProvider {
    #[inline]
    pub const fn new() -> Self {
        Self
    }

    fn layout_for(size: usize, align: usize, offset: usize) -> AllocResult<(Layout, usize)> {
        let lead =
            Prefix::lead_for(align, offset).ok_or_else(|| AllocError::size_overflow("heap lead"))?;
        let total = lead
            .checked_add(size)
            .ok_or_else(|| AllocError::size_overflow("heap block size"))?;
        let layout = Layout::from_size_align(total, align)
            .map_err(|_| AllocError::size_overflow("heap layout"))?;
        Ok((layout, lead))
    }
}

// SAFETY: HeapProvider upholds the MemoryProvider contract.
// - System returns blocks aligned to `align` and lead is a multiple of align
// - the prefix lives inside the System block, before the returned pointer
// - reallocate allocates the replacement before releasing the original
unsafe impl MemoryProvider for HeapProvider {
    fn header_size(&self) -> usize {
        Prefix::SIZE
    }

    fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        if !is_power_of_two(align) {
            return Err(AllocError::invalid_alignment(align));
        }
        let align = align.max(WORD);
        let (layout, lead) = Self::layout_for(size, align, offset)?;

        // SAFETY: layout has non-zero size (lead >= Prefix::SIZE).
        let base = unsafe { System.alloc(layout) };
        let Some(base) = NonNull::new(base) else {
            return Err(AllocError::provider_exhausted(size, align));
        };

        // SAFETY: lead < layout.size(), so the result stays inside the block.
        let ptr = unsafe { base.add(lead) };
        // SAFETY: lead >= Prefix::SIZE + offset bytes precede ptr inside the block.
        unsafe {
            Prefix {
                size,
                lead,
                extra: align,
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

        // SAFETY: both blocks are live and at least min(old, new) bytes long;
        // distinct System allocations never overlap.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old.size.min(size));
            self.deallocate(ptr);
        }
        Ok(new_ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: ptr came from this provider (caller contract), so the
        // prefix is intact and describes the System layout exactly.
        unsafe {
            let prefix = Prefix::read(ptr);
            let layout = Layout::from_size_align_unchecked(prefix.lead + prefix.size, prefix.extra);
            System.dealloc(ptr.as_ptr().sub(prefix.lead), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned;

    #[test]
    fn honours_alignment_and_offset() {
        let mut provider = HeapProvider::new();
        for align in [1, 8, 16, 64, 256] {
            for offset in [0, 3, 16] {
                let ptr = provider.allocate(100, align, offset).unwrap();
                assert!(is_aligned(ptr.as_ptr() as usize, align));
                unsafe {
                    let room = ptr.as_ptr().sub(provider.header_size() + offset);
                    ptr::write_bytes(room, 0x5A, offset);
                    ptr::write_bytes(ptr.as_ptr(), 0x5A, 100);
                    assert_eq!(Prefix::read(ptr).size, 100);
                    provider.deallocate(ptr);
                }
            }
        }
    }

    #[test]
    fn reallocate_preserves_contents() {
        let mut provider = HeapProvider::new();
        let ptr = provider.allocate(32, 16, 0).unwrap();
        unsafe {
            for i in 0..32 {
                *ptr.as_ptr().add(i) = i as u8;
            }
            let grown = provider.reallocate(ptr, 128, 16, 0).unwrap();
            for i in 0..32 {
                assert_eq!(*grown.as_ptr().add(i), i as u8);
            }
            let shrunk = provider.reallocate(grown, 8, 16, 0).unwrap();
            for i in 0..8 {
                assert_eq!(*shrunk.as_ptr().add(i), i as u8);
            }
            provider.deallocate(shrunk);
        }
    }

    #[test]
    fn rejects_bad_alignment() {
        let mut provider = HeapProvider::new();
        assert_eq!(
            provider.allocate(16, 12, 0),
            Err(AllocError::InvalidAlignment { alignment: 12 })
        );
    }

    #[test]
    fn zero_sized_blocks_are_valid() {
        let mut provider = HeapProvider::new();
        let ptr = provider.allocate(0, 8, 0).unwrap();
        unsafe { provider.deallocate(ptr) };
    }
}

//! Ring allocator front-end

use core::ptr::NonNull;

use super::buffer::{RingBuffer, RingHeader};
use crate::buffer::{Chain, Header, footprint, move_payload};
use crate::config::ChainConfig;
use crate::error::AllocResult;
use crate::magnifier::{Doubling, Magnifier};
use crate::provider::{HeapProvider, MemoryProvider};
use crate::traits::ChainAllocator;

/// Ring-buffer allocator for FIFO-shaped lifetimes
///
/// Blocks are expected to be freed roughly in allocation order. When a
/// request would overlap the oldest live block of the tail buffer, the chain
/// grows and the request is served from the new buffer.
///
/// # Examples
/// ```
/// use strata_alloc::RingAllocator;
///
/// let mut ring = RingAllocator::new()?;
/// let first = ring.allocate(128, 8, 0)?;
/// let second = ring.allocate(128, 8, 0)?;
/// unsafe { ring.deallocate(first) };
/// unsafe { ring.deallocate(second) };
/// assert_eq!(ring.used_bytes(), 0);
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
#[derive(Debug)]
pub struct RingAllocator<M = Doubling, P = HeapProvider>
where
    M: Magnifier,
    P: MemoryProvider,
{
    chain: Chain<RingBuffer, M, P>,
}

impl RingAllocator {
    /// Ring allocator with the default configuration
    pub fn new() -> AllocResult<Self> {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> AllocResult<Self> {
        Self::with_parts(config, Doubling, HeapProvider::new())
    }
}

impl<M, P> RingAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    /// Ring allocator with an explicit growth policy and provider
    pub fn with_parts(config: ChainConfig, magnifier: M, provider: P) -> AllocResult<Self> {
        config.validate()?;
        let overhead = RingHeader::SIZE + config.alignment - 1;
        let mut chain = Chain::new(config, magnifier, provider, overhead)?;
        chain.grow(0, RingBuffer::new)?;
        Ok(Self { chain })
    }

    /// Fresh allocator with the same configuration, magnifier and provider
    pub fn try_clone_empty(&self) -> AllocResult<Self>
    where
        M: Clone,
        P: Clone,
    {
        let mut chain = self.chain.try_clone_empty()?;
        chain.grow(0, RingBuffer::new)?;
        Ok(Self { chain })
    }

    /// Buffer holding `ptr`, located through the position in its header
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    unsafe fn owner(&self, ptr: NonNull<u8>) -> Option<usize> {
        // SAFETY: forwarded caller contract.
        let base = unsafe { RingHeader::block_addr(ptr) };
        self.chain.index_of_base(base)
    }

    /// Places a block after the newest live one, growing on collision
    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let min = footprint(RingHeader::SIZE, size, align, offset)?;
        let ptr = self.chain.allocate_with(min, RingBuffer::new, |buffer| {
            buffer.allocate(size, align, offset)
        })?;
        self.chain.record_allocation();
        Ok(ptr)
    }

    /// Releases the block, then places the new size and copies `min(old, new)` bytes
    ///
    /// On error the original block is still live.
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        let min = footprint(RingHeader::SIZE, size, align, offset)?;
        // SAFETY: forwarded caller contract.
        let owner = unsafe { self.owner(ptr) };
        let released = owner.and_then(|index| {
            self.chain.buffers_mut()[index]
                .deallocate(ptr, None)
                .map(|header| (index, header))
        });
        debug_assert!(released.is_some(), "pointer not owned by this allocator");
        let Some((index, old)) = released else {
            return self.allocate(size, align, offset);
        };
        let keep = old.size.min(size);

        // Data moves before the new header is written: the two may overlap.
        let in_place = self.chain.tail_mut().and_then(|tail| {
            let slot = tail.plan(size, align, offset)?;
            // SAFETY: the old payload is intact and the destination lies in
            // the tail block; `move_payload` tolerates overlap.
            unsafe { move_payload(ptr, tail.pointer_at(slot.user), keep) };
            Some(tail.commit(slot))
        });

        let new_ptr = match in_place {
            Some(new_ptr) => new_ptr,
            None => {
                let grown = self.chain.grow_with(min, RingBuffer::new, |buffer| {
                    buffer.allocate(size, align, offset)
                });
                let new_ptr = match grown {
                    Ok(new_ptr) => new_ptr,
                    Err(error) => {
                        self.chain.buffers_mut()[index].relink(old);
                        return Err(error);
                    }
                };
                // SAFETY: the new block lives in a fresh buffer, the old payload is intact.
                unsafe { move_payload(ptr, new_ptr, keep) };
                new_ptr
            }
        };

        self.chain.record_reallocation();
        Ok(new_ptr)
    }

    /// Retires a block
    ///
    /// Freeing the oldest block advances the ring; freeing any other block
    /// detaches it, and its space comes back once the oldest block passes it.
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let pattern = self.chain.config().dealloc_pattern;
        // SAFETY: forwarded caller contract.
        let owner = unsafe { self.owner(ptr) };
        let freed = owner.and_then(|index| self.chain.buffers_mut()[index].deallocate(ptr, pattern));
        debug_assert!(freed.is_some(), "pointer not owned by this allocator");
        self.chain.record_deallocation();
    }

    /// Releases drained buffers and shrinks a lone drained buffer to the start size
    pub fn purge(&mut self) -> usize {
        for buffer in self.chain.buffers_mut() {
            buffer.rewind();
        }
        let all_drained = self.chain.buffers().iter().all(RingBuffer::is_empty);
        let released = self
            .chain
            .release_where(|index, buffer| !buffer.is_empty() || (all_drained && index == 0));
        // A failed shrink leaves the buffer at its current size.
        let shrunk = self.chain.shrink_lone_buffer(RingBuffer::new).unwrap_or(0);
        released + shrunk + self.chain.purge_provider()
    }

    pub fn buffer_count(&self) -> usize {
        self.chain.len()
    }

    /// Bytes between the oldest and newest live blocks of every buffer
    pub fn used_bytes(&self) -> usize {
        self.chain.used_bytes()
    }

    pub fn capacity(&self) -> usize {
        self.chain.capacity()
    }

    pub fn config(&self) -> &ChainConfig {
        self.chain.config()
    }
}

// SAFETY: `RingBuffer::plan` only returns slots outside the live window of
// the tail buffer, and `ptr` is aligned by the placement rule.
unsafe impl<M, P> ChainAllocator for RingAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    fn default_alignment(&self) -> usize {
        self.chain.config().alignment
    }

    fn header_size(&self) -> usize {
        RingHeader::SIZE
    }

    fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        Self::allocate(self, size, align, offset)
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        // SAFETY: forwarded caller contract.
        unsafe { Self::reallocate(self, ptr, size, align, offset) }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded caller contract.
        unsafe { Self::deallocate(self, ptr) }
    }

    fn purge(&mut self) -> usize {
        Self::purge(self)
    }
}

impl_chain_introspection!(RingAllocator);

//! Linear allocator front-end

use core::ptr::NonNull;

use super::buffer::LinearBuffer;
use crate::buffer::{Chain, ChainBuffer, Header, SpanHeader, footprint, move_payload};
use crate::config::ChainConfig;
use crate::error::AllocResult;
use crate::magnifier::{Doubling, Magnifier};
use crate::provider::{HeapProvider, MemoryProvider};
use crate::traits::ChainAllocator;

/// Bump arena over a growable buffer chain
///
/// The head buffer is created eagerly and survives [`purge`](Self::purge);
/// every other buffer is released by it.
///
/// # Examples
/// ```
/// use strata_alloc::LinearAllocator;
///
/// let mut arena = LinearAllocator::new()?;
/// let ptr = arena.allocate(64, 16, 0)?;
/// assert_eq!(ptr.as_ptr() as usize % 16, 0);
/// arena.purge();
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
#[derive(Debug)]
pub struct LinearAllocator<M = Doubling, P = HeapProvider>
where
    M: Magnifier,
    P: MemoryProvider,
{
    chain: Chain<LinearBuffer, M, P>,
}

impl LinearAllocator {
    /// Linear allocator with the default configuration
    pub fn new() -> AllocResult<Self> {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> AllocResult<Self> {
        Self::with_parts(config, Doubling, HeapProvider::new())
    }
}

impl<M, P> LinearAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    /// Linear allocator with an explicit growth policy and provider
    pub fn with_parts(config: ChainConfig, magnifier: M, provider: P) -> AllocResult<Self> {
        config.validate()?;
        let overhead = SpanHeader::SIZE + config.alignment - 1;
        let mut chain = Chain::new(config, magnifier, provider, overhead)?;
        chain.grow(0, LinearBuffer::new)?;
        Ok(Self { chain })
    }

    /// Fresh allocator with the same configuration, magnifier and provider
    pub fn try_clone_empty(&self) -> AllocResult<Self>
    where
        M: Clone,
        P: Clone,
    {
        let mut chain = self.chain.try_clone_empty()?;
        chain.grow(0, LinearBuffer::new)?;
        Ok(Self { chain })
    }

    fn place(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let min = footprint(SpanHeader::SIZE, size, align, offset)?;
        self.chain.allocate_with(min, LinearBuffer::new, |buffer| {
            buffer.allocate(size, align, offset)
        })
    }

    /// Bumps `size` bytes off the tail buffer, growing the chain when full
    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let ptr = self.place(size, align, offset)?;
        self.chain.record_allocation();
        Ok(ptr)
    }

    /// Allocates a fresh block and copies `min(old, new)` bytes into it
    ///
    /// The old block is abandoned until the next purge.
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
        let old_size = self
            .chain
            .index_of(ptr)
            .and_then(|index| self.chain.buffers()[index].size_of(ptr));
        debug_assert!(old_size.is_some(), "pointer not owned by this allocator");

        let new_ptr = self.place(size, align, offset)?;
        // SAFETY: both allocations are live; the old block is never reused
        // before purge, so the regions cannot overlap.
        unsafe { move_payload(ptr, new_ptr, old_size.unwrap_or(0).min(size)) };
        self.chain.record_reallocation();
        Ok(new_ptr)
    }

    /// No-op: arena memory comes back only through [`purge`](Self::purge)
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        debug_assert!(
            self.chain.index_of(ptr).is_some(),
            "pointer not owned by this allocator"
        );
        self.chain.record_deallocation();
    }

    /// Rewinds the head buffer and releases every other buffer
    ///
    /// All outstanding pointers become dangling. Returns the bytes handed
    /// back to the provider.
    pub fn purge(&mut self) -> usize {
        let pattern = self.chain.config().dealloc_pattern;
        if let Some(head) = self.chain.buffers_mut().first_mut() {
            head.reset(pattern);
        }
        let released = self.chain.release_where(|index, _| index == 0);
        released + self.chain.purge_provider()
    }

    pub fn buffer_count(&self) -> usize {
        self.chain.len()
    }

    /// Bytes taken across the chain, headers and padding included
    pub fn used_bytes(&self) -> usize {
        self.chain.used_bytes()
    }

    pub fn capacity(&self) -> usize {
        self.chain.capacity()
    }

    /// Bytes left in the tail buffer
    pub fn tail_remaining(&self) -> usize {
        self.chain
            .buffers()
            .last()
            .map_or(0, |tail| tail.capacity() - tail.used())
    }

    pub fn config(&self) -> &ChainConfig {
        self.chain.config()
    }
}

// SAFETY: spans are planned inside the tail block, never overlap the cursor
// range of earlier spans, and `ptr` is aligned by `Span::plan`.
unsafe impl<M, P> ChainAllocator for LinearAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    fn default_alignment(&self) -> usize {
        self.chain.config().alignment
    }

    fn header_size(&self) -> usize {
        SpanHeader::SIZE
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

impl_chain_introspection!(LinearAllocator);

//! Main stack allocator implementation
//!
//! Buffers are created on first use. Only the tail buffer receives new
//! allocations; a deallocation rewinds whichever buffer owns the pointer.

use core::ptr::NonNull;

use super::buffer::StackBuffer;
use super::marker::StackMarker;
use crate::buffer::{Chain, ChainBuffer, Header, SpanHeader, footprint, move_payload};
use crate::config::ChainConfig;
use crate::error::{AllocError, AllocResult};
use crate::magnifier::{Doubling, Magnifier};
use crate::provider::{HeapProvider, MemoryProvider};
use crate::traits::ChainAllocator;

/// Watermark stack allocator
///
/// Freeing in LIFO order reclaims exactly what each allocation took.
/// Freeing out of order still moves the watermark down to the freed span, so
/// anything allocated above it is reclaimed too, even if still in use.
///
/// # Examples
/// ```
/// use strata_alloc::StackAllocator;
///
/// let mut stack = StackAllocator::new()?;
/// let a = stack.allocate(32, 8, 0)?;
/// let b = stack.allocate(64, 8, 0)?;
/// unsafe { stack.deallocate(b) };
/// let c = stack.allocate(48, 8, 0)?;
/// assert_eq!(b, c);
/// # let _ = a;
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
#[derive(Debug)]
pub struct StackAllocator<M = Doubling, P = HeapProvider>
where
    M: Magnifier,
    P: MemoryProvider,
{
    chain: Chain<StackBuffer, M, P>,
}

impl StackAllocator {
    /// Stack allocator with the default configuration
    pub fn new() -> AllocResult<Self> {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> AllocResult<Self> {
        Self::with_parts(config, Doubling, HeapProvider::new())
    }

    /// Production configuration
    pub fn production() -> AllocResult<Self> {
        Self::with_config(ChainConfig::production())
    }

    /// Debug configuration
    pub fn debug() -> AllocResult<Self> {
        Self::with_config(ChainConfig::debug())
    }
}

impl<M, P> StackAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    /// Stack allocator with an explicit growth policy and provider
    pub fn with_parts(config: ChainConfig, magnifier: M, provider: P) -> AllocResult<Self> {
        config.validate()?;
        let overhead = SpanHeader::SIZE + config.alignment - 1;
        Ok(Self {
            chain: Chain::new(config, magnifier, provider, overhead)?,
        })
    }

    /// Fresh allocator with the same configuration, magnifier and provider
    pub fn try_clone_empty(&self) -> AllocResult<Self>
    where
        M: Clone,
        P: Clone,
    {
        Ok(Self {
            chain: self.chain.try_clone_empty()?,
        })
    }

    /// Bumps `size` bytes off the tail buffer, growing the chain when full
    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        let min = footprint(SpanHeader::SIZE, size, align, offset)?;
        let ptr = self.chain.allocate_with(min, StackBuffer::new, |buffer| {
            buffer.allocate(size, align, offset)
        })?;
        self.chain.record_allocation();
        Ok(ptr)
    }

    /// Resizes the top allocation in place when possible
    ///
    /// The old span is released first, so a request that still fits at the
    /// same position keeps its address. Otherwise the data moves to the tail
    /// or to a new buffer. `min(old, new)` bytes are preserved.
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
        let min = footprint(SpanHeader::SIZE, size, align, offset)?;
        let owner = self.chain.index_of(ptr).and_then(|index| {
            let buffer = &self.chain.buffers()[index];
            buffer.span_of(ptr).map(|span| (index, span, buffer.used()))
        });
        debug_assert!(owner.is_some(), "pointer not owned by this allocator");
        let Some((index, old, watermark)) = owner else {
            return self.allocate(size, align, offset);
        };
        let keep = old.size().min(size);

        self.chain.buffers_mut()[index].rewind(old.start);

        // Data moves before the new header is written: the two may overlap.
        let in_place = self.chain.tail_mut().and_then(|tail| {
            let span = tail.plan(size, align, offset)?;
            // SAFETY: the old payload is intact and the destination lies in
            // the tail block; `move_payload` tolerates overlap.
            unsafe { move_payload(ptr, tail.pointer_at(span.user), keep) };
            Some(tail.commit(span))
        });

        let new_ptr = match in_place {
            Some(new_ptr) => new_ptr,
            None => {
                let grown = self.chain.grow_with(min, StackBuffer::new, |buffer| {
                    buffer.allocate(size, align, offset)
                });
                let new_ptr = match grown {
                    Ok(new_ptr) => new_ptr,
                    Err(error) => {
                        self.chain.buffers_mut()[index].set_offset(watermark);
                        return Err(error);
                    }
                };
                // SAFETY: the new span lives in a fresh block, the old payload is intact.
                unsafe { move_payload(ptr, new_ptr, keep) };
                new_ptr
            }
        };

        self.chain.record_reallocation();
        Ok(new_ptr)
    }

    /// Frees `ptr` by rewinding its buffer's watermark
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator. Memory allocated
    /// after `ptr` in the same buffer is reclaimed as well.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let pattern = self.chain.config().dealloc_pattern;
        let freed = self
            .chain
            .index_of(ptr)
            .and_then(|index| self.chain.buffers_mut()[index].deallocate(ptr, pattern));
        debug_assert!(freed.is_some(), "pointer not owned by this allocator");
        self.chain.record_deallocation();
    }

    /// Releases drained buffers and shrinks a lone drained buffer to the start size
    ///
    /// Markers taken before a purge must not be restored after it.
    pub fn purge(&mut self) -> usize {
        let all_drained = self.chain.buffers().iter().all(ChainBuffer::is_drained);
        let released = self
            .chain
            .release_where(|index, buffer| !buffer.is_drained() || (all_drained && index == 0));
        // A failed shrink leaves the buffer at its current size.
        let shrunk = self.chain.shrink_lone_buffer(StackBuffer::new).unwrap_or(0);
        released + shrunk + self.chain.purge_provider()
    }

    /// Records the current top of the stack
    pub fn mark(&self) -> StackMarker {
        match self.chain.buffers().last() {
            Some(tail) => StackMarker {
                buffer: self.chain.len() - 1,
                offset: tail.used(),
            },
            None => StackMarker::default(),
        }
    }

    /// Restores the stack to a previous marker position
    ///
    /// Buffers after the marked one are emptied, the marked one is rewound.
    ///
    /// # Safety
    /// - The marker must have been created by this allocator since the last purge
    /// - All pointers allocated after the marker become invalid
    pub unsafe fn restore_to_marker(&mut self, marker: StackMarker) -> AllocResult<()> {
        let len = self.chain.len();
        if len == 0 {
            return if marker == StackMarker::default() {
                Ok(())
            } else {
                Err(AllocError::invalid_marker(marker.buffer, marker.offset))
            };
        }
        let valid = marker.buffer < len && marker.offset <= self.chain.buffers()[marker.buffer].used();
        if !valid {
            return Err(AllocError::invalid_marker(marker.buffer, marker.offset));
        }

        let pattern = self.chain.config().dealloc_pattern;
        let buffers = self.chain.buffers_mut();
        for buffer in &mut buffers[marker.buffer + 1..] {
            buffer.truncate(0, pattern);
        }
        buffers[marker.buffer].truncate(marker.offset, pattern);
        Ok(())
    }

    pub fn buffer_count(&self) -> usize {
        self.chain.len()
    }

    /// Bytes below the watermarks, headers and padding included
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

// SAFETY: spans are carved above the tail watermark, never overlapping live
// spans below it, and `ptr` is aligned by `Span::plan`.
unsafe impl<M, P> ChainAllocator for StackAllocator<M, P>
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

impl_chain_introspection!(StackAllocator);

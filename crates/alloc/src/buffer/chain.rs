//! Owning buffer chain shared by every allocator front-end
//!
//! The chain is a `Vec` of buffers: index 0 is the head, the last element is
//! the tail. Buffers are appended when the tail cannot satisfy a request and
//! are only removed as whole units by an explicit purge or when the chain is
//! dropped.

use core::ptr::NonNull;

use super::block::Block;
use crate::config::ChainConfig;
use crate::error::{AllocError, AllocResult};
use crate::magnifier::Magnifier;
use crate::provider::MemoryProvider;
use crate::stats::{AllocatorStats, Counters};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// One link of a chain: a block plus the algorithm that carves it
pub(crate) trait ChainBuffer {
    fn block(&self) -> &Block;

    /// Bytes currently taken by live allocations, headers and padding included
    fn used(&self) -> usize;

    fn capacity(&self) -> usize {
        self.block().capacity()
    }

    fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.block().contains(ptr)
    }

    fn is_drained(&self) -> bool {
        self.used() == 0
    }
}

pub(crate) struct Chain<B, M, P>
where
    B: ChainBuffer,
    P: MemoryProvider,
{
    buffers: Vec<B>,
    magnifier: M,
    provider: P,
    config: ChainConfig,
    counters: Counters,
    /// Extra bytes added to the first buffer so a `start_size` request fits
    overhead: usize,
}

impl<B, M, P> Chain<B, M, P>
where
    B: ChainBuffer,
    M: Magnifier,
    P: MemoryProvider,
{
    pub fn new(config: ChainConfig, magnifier: M, provider: P, overhead: usize) -> AllocResult<Self> {
        config.validate()?;
        config
            .start_size
            .checked_add(overhead)
            .ok_or_else(|| AllocError::size_overflow("chain start capacity"))?;
        Ok(Self {
            buffers: Vec::new(),
            magnifier,
            provider,
            config,
            counters: Counters::default(),
            overhead,
        })
    }

    /// An empty chain with the same settings
    pub fn try_clone_empty(&self) -> AllocResult<Self>
    where
        M: Clone,
        P: Clone,
    {
        Self::new(
            self.config.clone(),
            self.magnifier.clone(),
            self.provider.clone(),
            self.overhead,
        )
    }

    #[inline]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn buffers(&self) -> &[B] {
        &self.buffers
    }

    #[inline]
    pub fn buffers_mut(&mut self) -> &mut [B] {
        &mut self.buffers
    }

    #[inline]
    pub fn tail_mut(&mut self) -> Option<&mut B> {
        self.buffers.last_mut()
    }

    /// Capacity of the first buffer and of any buffer shrunk by purge
    #[inline]
    pub fn start_capacity(&self) -> usize {
        self.config.start_size + self.overhead
    }

    /// Size of the next buffer: the magnified tail, but never below `min`
    pub fn next_capacity(&self, min: usize) -> usize {
        let base = match self.buffers.last() {
            None => self.start_capacity(),
            Some(tail) => self.magnifier.magnify(tail.capacity()),
        };
        base.max(min)
    }

    fn acquire(&mut self, capacity: usize) -> AllocResult<Block> {
        let ptr = self
            .provider
            .allocate(capacity, self.config.block_align(), 0)?;
        // SAFETY: the provider returned `capacity` fresh bytes owned by us.
        Ok(unsafe { Block::init(ptr, capacity, self.config.alloc_pattern.unwrap_or(0)) })
    }

    /// Appends a buffer able to hold at least `min` bytes
    pub fn grow(&mut self, min: usize, make: impl FnOnce(Block) -> B) -> AllocResult<&mut B> {
        let capacity = self.next_capacity(min);
        let block = self.acquire(capacity)?;
        let index = self.buffers.len();
        self.buffers.push(make(block));
        if self.config.track_stats {
            self.counters.buffers_grown += 1;
        }

        #[cfg(feature = "logging")]
        debug!(capacity, buffers = index + 1, "buffer chain grew");

        Ok(&mut self.buffers[index])
    }

    /// Grows the chain and places a request in the new tail
    ///
    /// `min` is the worst-case footprint of the request, so a failure here
    /// means the buffer algorithm and the sizing disagree.
    pub fn grow_with<T>(
        &mut self,
        min: usize,
        make: impl FnOnce(Block) -> B,
        place: impl FnOnce(&mut B) -> Option<T>,
    ) -> AllocResult<T> {
        let buffer = self.grow(min, make)?;
        let capacity = buffer.capacity();
        place(buffer).ok_or_else(|| AllocError::buffer_too_small(min, capacity))
    }

    /// Tries the tail first, growing the chain once when it is full
    pub fn allocate_with<T>(
        &mut self,
        min: usize,
        make: impl FnOnce(Block) -> B,
        mut place: impl FnMut(&mut B) -> Option<T>,
    ) -> AllocResult<T> {
        if let Some(found) = self.buffers.last_mut().and_then(&mut place) {
            return Ok(found);
        }
        self.grow_with(min, make, place)
    }

    /// Index of the buffer holding `ptr`, searching from the tail
    pub fn index_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.buffers.iter().rposition(|buffer| buffer.contains(ptr))
    }

    /// Index of the buffer whose block starts at `addr`
    pub fn index_of_base(&self, addr: usize) -> Option<usize> {
        self.buffers
            .iter()
            .rposition(|buffer| buffer.block().addr() == addr)
    }

    /// Hands every buffer rejected by `keep` back to the provider
    ///
    /// Returns the bytes released.
    pub fn release_where(&mut self, mut keep: impl FnMut(usize, &B) -> bool) -> usize {
        let Self {
            buffers,
            provider,
            counters,
            config,
            ..
        } = self;

        let mut index = 0;
        let mut released = 0;
        let mut count = 0;
        buffers.retain(|buffer| {
            let kept = keep(index, buffer);
            index += 1;
            if !kept {
                released += buffer.capacity();
                count += 1;
                // SAFETY: the block came from this provider and leaves the
                // chain here, so nothing refers to it afterwards.
                unsafe { provider.deallocate(buffer.block().as_ptr()) };
            }
            kept
        });

        if config.track_stats {
            counters.buffers_released += count;
            counters.bytes_reclaimed += released;
        }

        #[cfg(feature = "logging")]
        {
            if count > 0 {
                debug!(count, released, remaining = buffers.len(), "released drained buffers");
            }
        }

        released
    }

    /// Swaps the block of buffer `index` for one of `capacity` bytes
    ///
    /// Returns the bytes given back (zero when the buffer grew).
    pub fn replace_block(
        &mut self,
        index: usize,
        capacity: usize,
        make: impl FnOnce(Block) -> B,
    ) -> AllocResult<usize> {
        let old = self.buffers[index].block().as_ptr();
        let old_capacity = self.buffers[index].capacity();
        // SAFETY: the block came from this provider; on success the old
        // buffer is overwritten below and never used again.
        let ptr = unsafe {
            self.provider
                .reallocate(old, capacity, self.config.block_align(), 0)?
        };
        // SAFETY: the provider returned `capacity` bytes owned by us.
        let block = unsafe { Block::init(ptr, capacity, self.config.alloc_pattern.unwrap_or(0)) };
        self.buffers[index] = make(block);

        let saved = old_capacity.saturating_sub(capacity);
        if self.config.track_stats {
            self.counters.bytes_reclaimed += saved;
        }

        #[cfg(feature = "logging")]
        trace!(index, old_capacity, capacity, "replaced buffer block");

        Ok(saved)
    }

    /// Shrinks a lone drained buffer back to the start capacity
    pub fn shrink_lone_buffer(&mut self, make: impl FnOnce(Block) -> B) -> AllocResult<usize> {
        let start = self.start_capacity();
        match self.buffers.as_slice() {
            [only] if only.is_drained() && only.capacity() != start => {
                self.replace_block(0, start, make)
            }
            _ => Ok(0),
        }
    }

    /// Asks the provider to return its own caches
    pub fn purge_provider(&mut self) -> usize {
        self.provider.purge()
    }

    pub fn used_bytes(&self) -> usize {
        self.buffers.iter().map(ChainBuffer::used).sum()
    }

    pub fn capacity(&self) -> usize {
        self.buffers.iter().map(ChainBuffer::capacity).sum()
    }

    pub fn record_allocation(&mut self) {
        if self.config.track_stats {
            self.counters.allocations += 1;
            let used = self.used_bytes();
            self.counters.observe_used(used);
        }
    }

    pub fn record_deallocation(&mut self) {
        if self.config.track_stats {
            self.counters.deallocations += 1;
        }
    }

    pub fn record_reallocation(&mut self) {
        if self.config.track_stats {
            self.counters.reallocations += 1;
            let used = self.used_bytes();
            self.counters.observe_used(used);
        }
    }

    pub fn reset_statistics(&mut self) {
        self.counters.reset();
    }

    pub fn statistics(&self) -> AllocatorStats {
        let counters = &self.counters;
        AllocatorStats {
            used_bytes: self.used_bytes(),
            peak_used_bytes: counters.peak_used,
            capacity_bytes: self.capacity(),
            buffer_count: self.buffers.len(),
            allocation_count: counters.allocations,
            deallocation_count: counters.deallocations,
            reallocation_count: counters.reallocations,
            buffers_grown: counters.buffers_grown,
            buffers_released: counters.buffers_released,
            bytes_reclaimed: counters.bytes_reclaimed,
        }
    }
}

impl<B, M, P> Drop for Chain<B, M, P>
where
    B: ChainBuffer,
    P: MemoryProvider,
{
    fn drop(&mut self) {
        for buffer in self.buffers.drain(..) {
            // SAFETY: every block in the chain came from this provider and
            // the chain is going away with it.
            unsafe { self.provider.deallocate(buffer.block().as_ptr()) };
        }
    }
}

impl<B, M, P> core::fmt::Debug for Chain<B, M, P>
where
    B: ChainBuffer,
    P: MemoryProvider,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Chain")
            .field("buffers", &self.buffers.len())
            .field(
                "capacity",
                &self
                    .buffers
                    .iter()
                    .map(ChainBuffer::capacity)
                    .sum::<usize>(),
            )
            .field("start_size", &self.config.start_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnifier::Doubling;
    use crate::provider::HeapProvider;

    /// Minimal buffer: a block and a fill level
    struct Plain {
        block: Block,
        used: usize,
    }

    impl Plain {
        fn new(block: Block) -> Self {
            Self { block, used: 0 }
        }

        fn take(&mut self, bytes: usize) -> Option<usize> {
            (self.used + bytes <= self.block.capacity()).then(|| {
                self.used += bytes;
                self.used
            })
        }
    }

    impl ChainBuffer for Plain {
        fn block(&self) -> &Block {
            &self.block
        }

        fn used(&self) -> usize {
            self.used
        }
    }

    fn chain(start: usize) -> Chain<Plain, Doubling, HeapProvider> {
        let config = ChainConfig::default().with_start_size(start).with_stats(true);
        Chain::new(config, Doubling, HeapProvider::new(), 0).unwrap()
    }

    #[test]
    fn grows_by_magnifying_the_tail() {
        let mut chain = chain(64);
        assert_eq!(chain.next_capacity(0), 64);

        chain.allocate_with(10, Plain::new, |b| b.take(10)).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.next_capacity(0), 128);

        chain.allocate_with(60, Plain::new, |b| b.take(60)).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.capacity(), 64 + 128);
    }

    #[test]
    fn oversized_requests_win_over_the_magnifier() {
        let mut chain = chain(64);
        chain.allocate_with(1000, Plain::new, |b| b.take(1000)).unwrap();
        assert_eq!(chain.capacity(), 1000);
    }

    #[test]
    fn release_where_keeps_requested_buffers() {
        let mut chain = chain(32);
        for _ in 0..3 {
            chain.grow(0, Plain::new).unwrap();
        }
        let released = chain.release_where(|index, _| index == 0);
        assert_eq!(released, 64 + 128);
        assert_eq!(chain.len(), 1);

        let stats = chain.statistics();
        assert_eq!(stats.buffers_grown, 3);
        assert_eq!(stats.buffers_released, 2);
    }

    #[test]
    fn lone_drained_buffer_shrinks_to_start() {
        let mut chain = chain(32);
        chain.grow(500, Plain::new).unwrap();
        assert_eq!(chain.capacity(), 500);

        assert_eq!(chain.shrink_lone_buffer(Plain::new).unwrap(), 500 - 32);
        assert_eq!(chain.capacity(), 32);
        assert_eq!(chain.shrink_lone_buffer(Plain::new).unwrap(), 0);
    }

    #[test]
    fn zero_start_size_is_rejected() {
        let config = ChainConfig::default().with_start_size(0);
        let result: AllocResult<Chain<Plain, Doubling, HeapProvider>> =
            Chain::new(config, Doubling, HeapProvider::new(), 0);
        assert!(result.is_err());
    }
}

//! Pool allocator front-end

use core::ptr::NonNull;

use super::buffer::{PoolBuffer, PoolHeader, SlotGeometry};
use crate::buffer::{Chain, Header};
use crate::config::PoolConfig;
use crate::error::{AllocError, AllocResult};
use crate::magnifier::{Doubling, Magnifier};
use crate::provider::{HeapProvider, MemoryProvider};
use crate::traits::ChainAllocator;
use crate::utils::is_power_of_two;

/// Fixed-block allocator with O(1) allocation
///
/// Requests may not exceed the configured `max_size` and `max_align`; that
/// contract is asserted in debug builds and reported as an error otherwise.
///
/// # Examples
/// ```
/// use strata_alloc::PoolAllocator;
///
/// let mut pool = PoolAllocator::for_type::<[u64; 4]>(16)?;
/// let a = pool.allocate(32, 8, 0)?;
/// let b = pool.allocate(32, 8, 0)?;
/// unsafe {
///     pool.deallocate(a);
///     pool.deallocate(b);
/// }
/// assert_eq!(pool.free_slots(), 16);
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
#[derive(Debug)]
pub struct PoolAllocator<M = Doubling, P = HeapProvider>
where
    M: Magnifier,
    P: MemoryProvider,
{
    chain: Chain<PoolBuffer, M, P>,
    geometry: SlotGeometry,
    config: PoolConfig,
}

impl PoolAllocator {
    /// Pool allocator with the default configuration
    pub fn new() -> AllocResult<Self> {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> AllocResult<Self> {
        Self::with_parts(config, Doubling, HeapProvider::new())
    }

    /// Pool whose slots hold one `T` each
    pub fn for_type<T>(start_count: usize) -> AllocResult<Self> {
        Self::with_config(PoolConfig::for_type::<T>(start_count))
    }
}

impl<M, P> PoolAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    /// Pool allocator with an explicit growth policy and provider
    pub fn with_parts(config: PoolConfig, magnifier: M, provider: P) -> AllocResult<Self> {
        config.validate()?;
        let geometry = SlotGeometry::new(config.max_size, config.max_align)
            .ok_or_else(|| AllocError::size_overflow("pool slot size"))?;
        let start_size = geometry
            .stride
            .checked_mul(config.start_count)
            .ok_or_else(|| AllocError::size_overflow("pool start size"))?;
        let chain = Chain::new(config.chain_config(start_size), magnifier, provider, 0)?;
        Ok(Self {
            chain,
            geometry,
            config,
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
            geometry: self.geometry,
            config: self.config.clone(),
        })
    }

    fn check(&self, size: usize, align: usize, offset: usize) -> AllocResult<()> {
        if !is_power_of_two(align) {
            return Err(AllocError::invalid_alignment(align));
        }
        let fits = self.geometry.fits(size, align, offset);
        debug_assert!(
            fits,
            "request of {size} bytes at alignment {align} exceeds the pool slot"
        );
        if fits {
            Ok(())
        } else {
            Err(AllocError::buffer_too_small(
                SlotGeometry::footprint(size, align, offset).unwrap_or(usize::MAX),
                self.geometry.stride,
            ))
        }
    }

    /// Buffer holding `ptr`, located through the position in its header
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    unsafe fn owner(&self, ptr: NonNull<u8>) -> Option<usize> {
        // SAFETY: forwarded caller contract.
        let base = unsafe { PoolHeader::block_addr(ptr) };
        self.chain.index_of_base(base)
    }

    /// Takes a free slot, newest buffer first, growing the chain when all are full
    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        self.check(size, align, offset)?;
        let found = self
            .chain
            .buffers_mut()
            .iter_mut()
            .rev()
            .find_map(|buffer| buffer.allocate(size, align, offset));
        let ptr = match found {
            Some(ptr) => ptr,
            None => {
                let geometry = self.geometry;
                self.chain.grow_with(
                    geometry.stride,
                    move |block| PoolBuffer::new(block, geometry),
                    |buffer| buffer.allocate(size, align, offset),
                )?
            }
        };
        self.chain.record_allocation();
        Ok(ptr)
    }

    /// Slots never move: returns `ptr` as long as the request fits its slot
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
        self.check(size, align, offset)?;
        // SAFETY: forwarded caller contract.
        let owner = unsafe { self.owner(ptr) };
        debug_assert!(
            owner.is_some_and(|index| self.chain.buffers()[index].fits_in_place(ptr, size)),
            "reallocated size does not fit the slot"
        );
        self.chain.record_reallocation();
        Ok(ptr)
    }

    /// Returns the slot to its buffer's free list
    ///
    /// # Safety
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let pattern = self.config.dealloc_pattern;
        // SAFETY: forwarded caller contract.
        let owner = unsafe { self.owner(ptr) };
        let freed = owner.and_then(|index| self.chain.buffers_mut()[index].deallocate(ptr, pattern));
        debug_assert!(freed.is_some(), "pointer not owned by this allocator");
        self.chain.record_deallocation();
    }

    /// Releases fully unused buffers whose slot count differs from the start count
    pub fn purge(&mut self) -> usize {
        let start_count = self.config.start_count;
        let released = self.chain.release_where(|_, buffer| {
            !buffer.is_unused() || buffer.slot_count() == start_count
        });
        released + self.chain.purge_provider()
    }

    pub fn buffer_count(&self) -> usize {
        self.chain.len()
    }

    /// Bytes held by handed-out slots, headers included
    pub fn used_bytes(&self) -> usize {
        self.chain.used_bytes()
    }

    pub fn capacity(&self) -> usize {
        self.chain.capacity()
    }

    /// Free slots across the chain
    pub fn free_slots(&self) -> usize {
        self.chain.buffers().iter().map(PoolBuffer::free_count).sum()
    }

    /// Slots across the chain
    pub fn total_slots(&self) -> usize {
        self.chain.buffers().iter().map(PoolBuffer::slot_count).sum()
    }

    /// Bytes a slot can hold
    pub fn slot_size(&self) -> usize {
        self.geometry.data_len
    }

    /// Distance between consecutive slots, header included
    pub fn slot_stride(&self) -> usize {
        self.geometry.stride
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

// SAFETY: each pointer and its `size` bytes lie inside its own slot, the
// pointer is aligned by `SlotGeometry::lead`, slots never overlap, and a slot
// is handed out only while it is off the free list.
unsafe impl<M, P> ChainAllocator for PoolAllocator<M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    fn default_alignment(&self) -> usize {
        self.config.max_align
    }

    fn header_size(&self) -> usize {
        PoolHeader::SIZE
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

impl_chain_introspection!(PoolAllocator);

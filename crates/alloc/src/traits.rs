//! Traits shared by the allocator front-ends
//!
//! - `ChainAllocator`: the common allocate / reallocate / deallocate / purge surface
//! - `MemoryUsage`: used and available bytes across a chain
//! - `StatisticsProvider`: counters collected when `track_stats` is on
//!
//! # Safety
//!
//! `ChainAllocator` is an unsafe trait: implementors promise that a pointer
//! returned by `allocate(size, align, offset)` is valid for `size` bytes,
//! that it is aligned to `align`, and that it does not overlap any other live
//! allocation of the same instance.
//!
//! `offset` asks for that many bytes of room in front of the allocation. The
//! allocator's own header stays directly before the pointer so it can be
//! found from the pointer alone; the room sits in front of that header and
//! ends at `ptr - header_size()`.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocResult;
use crate::stats::AllocatorStats;

/// Unified surface of the linear, stack, ring and pool allocators
///
/// # Safety
/// See the module documentation.
pub unsafe trait ChainAllocator {
    /// Alignment used by [`allocate_bytes`](Self::allocate_bytes)
    fn default_alignment(&self) -> usize;

    /// Bytes of bookkeeping stored directly before every returned pointer
    fn header_size(&self) -> usize;

    /// Allocates `size` bytes aligned to `align`, with `offset` bytes of room reserved in front
    ///
    /// # Errors
    /// - `InvalidAlignment` if `align` is not a power of two
    /// - `ProviderExhausted` if the chain had to grow and the provider failed
    fn allocate(&mut self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>>;

    /// Resizes an allocation, preserving `min(old, new)` leading bytes
    ///
    /// # Safety
    /// - `ptr` must be a live allocation of this allocator
    /// - on success `ptr` must no longer be used unless it was returned again
    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>>;

    /// Releases an allocation
    ///
    /// # Safety
    /// - `ptr` must be a live allocation of this allocator
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>);

    /// Reclaims drained buffers, returning the bytes given back
    fn purge(&mut self) -> usize;

    /// Allocates memory for `layout`
    #[inline]
    fn allocate_layout(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        self.allocate(layout.size(), layout.align(), 0)
    }

    /// Allocates `size` bytes at the default alignment
    #[inline]
    fn allocate_bytes(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let align = self.default_alignment();
        self.allocate(size, align, 0)
    }
}

/// Memory usage reporting
pub trait MemoryUsage {
    /// Get currently used memory in bytes
    fn used_memory(&self) -> usize;

    /// Get memory still available without growing, if known
    fn available_memory(&self) -> Option<usize>;

    /// Get total memory capacity in bytes (if known)
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

/// Statistics collection
pub trait StatisticsProvider {
    /// Get current statistics
    fn statistics(&self) -> AllocatorStats;

    /// Reset statistics
    fn reset_statistics(&mut self);

    /// Check if statistics collection is enabled
    fn statistics_enabled(&self) -> bool {
        true
    }
}

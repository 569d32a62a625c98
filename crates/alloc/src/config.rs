//! Allocator configuration
//!
//! [`ChainConfig`] drives the linear, stack and ring allocators. The pool
//! allocator sizes its buffers in slots instead of bytes and has its own
//! [`PoolConfig`].

use core::alloc::Layout;

use crate::error::{AllocError, AllocResult};
use crate::utils::{WORD, is_power_of_two};

/// Default size of the first buffer in a chain
pub const DEFAULT_START_SIZE: usize = 4 * 1024;

/// Default alignment handed out when the caller does not ask for one
pub const DEFAULT_ALIGNMENT: usize = 2 * WORD;

/// Configuration shared by the byte-oriented chain allocators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Payload size of the first buffer, and the shrink target on purge
    pub start_size: usize,

    /// Default alignment for [`allocate_bytes`](crate::ChainAllocator::allocate_bytes)
    pub alignment: usize,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for fresh buffers (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for released regions (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            start_size: DEFAULT_START_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xCC)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl ChainConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            start_size: 64 * 1024,
            alignment: DEFAULT_ALIGNMENT,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            start_size: DEFAULT_START_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            track_stats: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - minimal overhead
    #[must_use]
    pub fn performance() -> Self {
        Self {
            start_size: 1024 * 1024,
            alignment: DEFAULT_ALIGNMENT,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    #[must_use]
    pub fn with_start_size(mut self, start_size: usize) -> Self {
        self.start_size = start_size;
        self
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Block alignment requested from the provider
    pub(crate) fn block_align(&self) -> usize {
        self.alignment.max(WORD)
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.start_size == 0 {
            return Err(AllocError::invalid_config("start_size cannot be zero"));
        }
        if !is_power_of_two(self.alignment) {
            return Err(AllocError::invalid_alignment(self.alignment));
        }
        Ok(())
    }
}

/// Configuration for the fixed-slot pool allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Largest request a slot can hold
    pub max_size: usize,

    /// Strictest alignment a slot can honour
    pub max_align: usize,

    /// Slots in the first buffer; buffers of exactly this many slots survive purge
    pub start_count: usize,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for fresh buffers (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for returned slots (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 64,
            max_align: DEFAULT_ALIGNMENT,
            start_count: 64,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Pool whose slots fit `max_size` bytes at `max_align`
    #[must_use]
    pub fn new(max_size: usize, max_align: usize, start_count: usize) -> Self {
        Self {
            max_size,
            max_align,
            start_count,
            ..Self::default()
        }
    }

    /// Pool sized for values of type `T`
    #[must_use]
    pub fn for_type<T>(start_count: usize) -> Self {
        let layout = Layout::new::<T>();
        Self::new(layout.size().max(1), layout.align(), start_count)
    }

    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            start_count: 256,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            ..Self::default()
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            ..Self::default()
        }
    }

    /// Performance configuration - minimal overhead
    #[must_use]
    pub fn performance() -> Self {
        Self {
            start_count: 1024,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.max_size == 0 {
            return Err(AllocError::invalid_config("max_size cannot be zero"));
        }
        if self.start_count == 0 {
            return Err(AllocError::invalid_config("start_count cannot be zero"));
        }
        if !is_power_of_two(self.max_align) {
            return Err(AllocError::invalid_alignment(self.max_align));
        }
        Ok(())
    }

    /// Chain settings used for the pool's backing buffers
    pub(crate) fn chain_config(&self, start_size: usize) -> ChainConfig {
        ChainConfig {
            start_size,
            alignment: self.max_align.max(WORD),
            track_stats: self.track_stats,
            alloc_pattern: self.alloc_pattern,
            dealloc_pattern: self.dealloc_pattern,
        }
    }
}

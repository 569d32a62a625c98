//! # strata-alloc
//!
//! Custom allocators over chains of growable buffers.
//!
//! Four front-ends share one buffer chain and differ only in how they carve
//! a buffer into allocations:
//!
//! - [`LinearAllocator`] - bump allocation, frees are no-ops, `purge` resets
//! - [`StackAllocator`] - bump allocation with watermark rewind on free,
//!   plus [`StackMarker`] / [`StackFrame`] scopes
//! - [`RingAllocator`] - FIFO lifetimes in a circular window per buffer
//! - [`PoolAllocator`] - fixed-size slots on a sorted free list
//!
//! When the newest buffer cannot satisfy a request, the chain asks its
//! [`Magnifier`] for the next size and takes a fresh buffer from its
//! [`MemoryProvider`]. Every request is `(size, align, offset)`: the returned
//! pointer `p` is aligned to `align`, and the allocation keeps at least
//! `offset` extra bytes in front of its header for the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_alloc::prelude::*;
//!
//! fn main() -> AllocResult<()> {
//!     let mut stack = StackAllocator::new()?;
//!
//!     let marker = stack.mark();
//!     let ptr = stack.allocate(256, 16, 0)?;
//!     assert_eq!(ptr.as_ptr() as usize % 16, 0);
//!
//!     // SAFETY: the marker comes from this allocator.
//!     unsafe { stack.restore_to_marker(marker)? };
//!     assert_eq!(stack.used_bytes(), 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `logging` (default) - `tracing` events for chain growth, purge and
//!   provider failures
//! - `os-pages` - [`provider::PageProvider`], anonymous page mappings (unix)
//!
//! ## Threading
//!
//! Allocators are single-threaded and take `&mut self`. Wrap one in
//! [`sync::Shared`] to use it from several threads.

#![cfg_attr(docsrs, feature(doc_cfg))]
// Allocators manage raw memory; unsafe is reviewed per-site with SAFETY comments
#![allow(unsafe_code)]
// Byte offsets into provider blocks are cast to pointers and back
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::ptr_as_ptr)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod config;
pub mod magnifier;
pub mod provider;
pub mod stats;
pub mod sync;
pub mod traits;
pub mod utils;

pub(crate) mod buffer;

pub use crate::allocator::{
    LinearAllocator, PoolAllocator, RingAllocator, StackAllocator, StackFrame, StackMarker,
};
pub use crate::config::{ChainConfig, PoolConfig};
pub use crate::error::{AllocError, AllocResult};
pub use crate::magnifier::{Constant, Doubling, Magnifier, Scaled, Stepped};
#[cfg(all(unix, feature = "os-pages"))]
pub use crate::provider::PageProvider;
pub use crate::provider::{HeapProvider, MemoryProvider};
pub use crate::stats::AllocatorStats;
pub use crate::traits::{ChainAllocator, MemoryUsage, StatisticsProvider};

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports of commonly used types
    //!
    //! ```rust
    //! use strata_alloc::prelude::*;
    //! ```

    pub use crate::allocator::{
        LinearAllocator, PoolAllocator, RingAllocator, StackAllocator, StackFrame, StackMarker,
    };
    pub use crate::config::{ChainConfig, PoolConfig};
    pub use crate::error::{AllocError, AllocResult};
    pub use crate::magnifier::{Doubling, Magnifier};
    pub use crate::provider::{HeapProvider, MemoryProvider};
    pub use crate::stats::AllocatorStats;
    pub use crate::sync::Shared;
    pub use crate::traits::{ChainAllocator, MemoryUsage, StatisticsProvider};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Linear (bump arena) allocator
//!
//! Allocations are appended to the tail buffer and never freed one by one.
//! `purge` rewinds the head buffer and hands every other buffer back to the
//! provider.
//!
//! ## Modules
//! - `allocator` - `LinearAllocator` front-end
//! - `buffer` - bump buffer carved by the front-end

mod allocator;
mod buffer;

pub use allocator::LinearAllocator;

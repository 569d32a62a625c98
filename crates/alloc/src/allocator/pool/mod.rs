//! Pool allocator for fixed maximum-size blocks
//!
//! Every buffer is cut into equal slots at creation. Allocation pops the
//! lowest free slot, deallocation splices the slot back into the sorted
//! free list, and reallocation never moves anything.
//!
//! ## Modules
//! - `allocator` - `PoolAllocator` front-end
//! - `buffer` - slot partitioning and the offset-linked free list

mod allocator;
mod buffer;

pub use allocator::PoolAllocator;

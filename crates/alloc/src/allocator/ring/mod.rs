//! Ring-buffer allocator
//!
//! Each buffer is a circular window. New blocks go after the newest live
//! block and wrap to the start of the buffer; a block that would run into
//! the oldest live block makes the chain grow instead.
//!
//! ## Modules
//! - `allocator` - `RingAllocator` front-end
//! - `buffer` - circular buffer and its linked headers

mod allocator;
mod buffer;

pub use allocator::RingAllocator;

//! Stack allocator with watermark rewind
//!
//! Allocation bumps the tail buffer exactly like the linear allocator.
//! Deallocation moves the owning buffer's cursor back to the start of the
//! freed span when that is lower than the cursor, so freeing in LIFO order
//! reclaims exactly what was allocated.
//!
//! ## Modules
//! - `allocator` - `StackAllocator` front-end
//! - `buffer` - bump buffer with rewind
//! - `frame` - RAII helper for automatic stack restoration
//! - `marker` - Position markers for scoped deallocation

mod allocator;
mod buffer;
mod frame;
mod marker;

pub use allocator::StackAllocator;
pub use frame::StackFrame;
pub use marker::StackMarker;

//! RAII-based stack frame for automatic restoration

use core::ops::{Deref, DerefMut};

use super::{StackAllocator, StackMarker};
use crate::magnifier::Magnifier;
use crate::provider::MemoryProvider;

/// RAII helper for stack-based scoped allocation
///
/// Marks the allocator on creation and restores it to that mark when
/// dropped. The frame borrows the allocator mutably and derefs to it, so
/// allocations made through the frame cannot escape the scope by reference.
///
/// ```
/// use strata_alloc::{StackAllocator, StackFrame};
///
/// let mut stack = StackAllocator::new()?;
/// {
///     let mut frame = StackFrame::new(&mut stack);
///     frame.allocate(256, 8, 0)?;
/// }
/// assert_eq!(stack.used_bytes(), 0);
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
pub struct StackFrame<'a, M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    allocator: &'a mut StackAllocator<M, P>,
    marker: StackMarker,
}

impl<'a, M, P> StackFrame<'a, M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    /// Creates a new stack frame that will restore to the current position
    /// when dropped
    pub fn new(allocator: &'a mut StackAllocator<M, P>) -> Self {
        let marker = allocator.mark();
        Self { allocator, marker }
    }

    pub fn marker(&self) -> StackMarker {
        self.marker
    }

    /// Manually restore and consume this frame
    pub fn restore(self) {
        drop(self);
    }
}

impl<M, P> Deref for StackFrame<'_, M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    type Target = StackAllocator<M, P>;

    fn deref(&self) -> &Self::Target {
        &*self.allocator
    }
}

impl<M, P> DerefMut for StackFrame<'_, M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.allocator
    }
}

impl<M, P> Drop for StackFrame<'_, M, P>
where
    M: Magnifier,
    P: MemoryProvider,
{
    fn drop(&mut self) {
        // SAFETY: the marker was taken from this allocator. A purge through
        // the frame can only make it stale, which restore rejects.
        let result = unsafe { self.allocator.restore_to_marker(self.marker) };
        debug_assert!(result.is_ok(), "stale stack frame marker");
    }
}

/// Recorded top of a stack allocator
///
/// Created by [`StackAllocator::mark`](super::StackAllocator::mark) and
/// consumed by [`restore_to_marker`](super::StackAllocator::restore_to_marker).
/// A purge may remove buffers, which invalidates earlier markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackMarker {
    pub(crate) buffer: usize,
    pub(crate) offset: usize,
}

impl StackMarker {
    /// Index of the tail buffer when the marker was taken
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Cursor of that buffer when the marker was taken
    pub fn offset(&self) -> usize {
        self.offset
    }
}

use core::ptr::NonNull;

use crate::buffer::{Block, ChainBuffer, Span};

/// Bump buffer whose cursor can be rewound
#[derive(Debug)]
pub(crate) struct StackBuffer {
    block: Block,
    offset: usize,
}

impl StackBuffer {
    pub fn new(block: Block) -> Self {
        Self { block, offset: 0 }
    }

    #[inline]
    pub fn plan(&self, size: usize, align: usize, offset: usize) -> Option<Span> {
        Span::plan(&self.block, self.offset, size, align, offset)
    }

    pub fn commit(&mut self, span: Span) -> NonNull<u8> {
        self.offset = span.end;
        span.commit(&mut self.block)
    }

    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> Option<NonNull<u8>> {
        let span = self.plan(size, align, offset)?;
        Some(self.commit(span))
    }

    pub fn span_of(&self, ptr: NonNull<u8>) -> Option<Span> {
        Span::of(&self.block, ptr)
    }

    #[inline]
    pub fn pointer_at(&self, offset: usize) -> NonNull<u8> {
        self.block.ptr_at(offset)
    }

    /// Frees `ptr`, moving the cursor down to its span start if that is lower
    ///
    /// Returns the span start, `None` if the header is unreadable.
    pub fn deallocate(&mut self, ptr: NonNull<u8>, pattern: Option<u8>) -> Option<usize> {
        let span = self.span_of(ptr)?;
        if let Some(pattern) = pattern {
            self.block.fill(span.user..span.end, pattern);
        }
        self.rewind(span.start);
        Some(span.start)
    }

    /// Lowers the cursor to `position`; higher positions are ignored
    pub fn rewind(&mut self, position: usize) {
        self.offset = self.offset.min(position);
    }

    /// Rewinds to `position`, filling the abandoned range
    pub fn truncate(&mut self, position: usize, pattern: Option<u8>) {
        if position < self.offset {
            if let Some(pattern) = pattern {
                self.block.fill(position..self.offset, pattern);
            }
            self.offset = position;
        }
    }

    pub fn set_offset(&mut self, offset: usize) {
        debug_assert!(offset <= self.block.capacity());
        self.offset = offset;
    }
}

impl ChainBuffer for StackBuffer {
    fn block(&self) -> &Block {
        &self.block
    }

    fn used(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::testing::with_block;

    #[test]
    fn lifo_free_restores_the_cursor() {
        with_block(256, 0, |block| {
            let mut buffer = StackBuffer::new(block);
            buffer.allocate(24, 8, 0).unwrap();
            let before = buffer.used();
            let b = buffer.allocate(40, 16, 0).unwrap();
            assert_eq!(buffer.deallocate(b, None), Some(before));
            assert_eq!(buffer.used(), before);
        });
    }

    #[test]
    fn out_of_order_free_moves_the_watermark_down() {
        with_block(256, 0, |block| {
            let mut buffer = StackBuffer::new(block);
            let a = buffer.allocate(24, 8, 0).unwrap();
            let _b = buffer.allocate(24, 8, 0).unwrap();
            buffer.deallocate(a, None);
            assert_eq!(buffer.used(), 0);
        });
    }

    #[test]
    fn freeing_above_the_watermark_keeps_it() {
        with_block(256, 0, |block| {
            let mut buffer = StackBuffer::new(block);
            let a = buffer.allocate(24, 8, 0).unwrap();
            let b = buffer.allocate(24, 8, 0).unwrap();
            buffer.deallocate(a, None);
            buffer.deallocate(b, None);
            assert_eq!(buffer.used(), 0);
        });
    }

    #[test]
    fn dealloc_pattern_covers_only_the_payload() {
        with_block(128, 0, |block| {
            let mut buffer = StackBuffer::new(block);
            let a = buffer.allocate(16, 16, 0).unwrap();
            let span = buffer.span_of(a).unwrap();
            buffer.deallocate(a, Some(0xDD));
            let bytes = buffer.block().bytes();
            assert!(bytes[span.user..span.end].iter().all(|b| *b == 0xDD));
            assert!(bytes[span.end..].iter().all(|b| *b == 0));
        });
    }

    #[test]
    fn truncate_fills_abandoned_range() {
        with_block(128, 0, |block| {
            let mut buffer = StackBuffer::new(block);
            buffer.allocate(32, 8, 0).unwrap();
            let top = buffer.used();
            buffer.truncate(8, Some(0xEE));
            assert_eq!(buffer.used(), 8);
            assert!(buffer.block().bytes()[8..top].iter().all(|b| *b == 0xEE));
            buffer.truncate(64, Some(0xEE));
            assert_eq!(buffer.used(), 8);
        });
    }
}

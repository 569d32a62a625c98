use core::ptr::NonNull;

use crate::buffer::{Block, ChainBuffer, Span};

/// Bump buffer: one cursor, no reuse until reset
#[derive(Debug)]
pub(crate) struct LinearBuffer {
    block: Block,
    offset: usize,
}

impl LinearBuffer {
    pub fn new(block: Block) -> Self {
        Self { block, offset: 0 }
    }

    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> Option<NonNull<u8>> {
        let span = Span::plan(&self.block, self.offset, size, align, offset)?;
        self.offset = span.end;
        Some(span.commit(&mut self.block))
    }

    /// Payload size recorded in the header of `ptr`
    pub fn size_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        Span::of(&self.block, ptr).map(|span| span.size())
    }

    /// Rewinds the cursor to the start, returning the bytes it covered
    pub fn reset(&mut self, pattern: Option<u8>) -> usize {
        let used = self.offset;
        if let Some(pattern) = pattern {
            self.block.fill(0..used, pattern);
        }
        self.offset = 0;
        used
    }
}

impl ChainBuffer for LinearBuffer {
    fn block(&self) -> &Block {
        &self.block
    }

    fn used(&self) -> usize {
        self.offset
    }
}

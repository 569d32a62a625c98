//! Bump placement shared by the linear and stack buffers
//!
//! ```text
//! cursor                      user            end
//!   v                          v               v
//!   [padding][prefix][size|lead][payload ......]
//!   |<-------- lead ----------->|<--- size --->|
//! ```
//!
//! `prefix` is the `offset` bytes the caller asked to keep in front of the
//! header; `user` itself is aligned.

use core::ptr::NonNull;

use super::block::Block;
use super::header::{Header, SpanHeader};
use crate::utils::place_with_offset;

/// Planned placement of one allocation; nothing is written until [`Span::commit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub user: usize,
    pub end: usize,
}

impl Span {
    /// Places `size` bytes at or after `cursor`, `None` if the block is too small
    pub fn plan(block: &Block, cursor: usize, size: usize, align: usize, offset: usize) -> Option<Self> {
        let base = block.addr();
        let earliest = base.checked_add(cursor)?.checked_add(SpanHeader::SIZE)?;
        let user = place_with_offset(earliest, align, offset)? - base;
        let end = user.checked_add(size)?;
        (end <= block.capacity()).then_some(Self {
            start: cursor,
            user,
            end,
        })
    }

    /// Writes the header and returns the user pointer
    pub fn commit(&self, block: &mut Block) -> NonNull<u8> {
        let header = SpanHeader {
            size: self.end - self.user,
            lead: self.user - self.start,
        };
        block.write(self.user - SpanHeader::SIZE, &header);
        block.ptr_at(self.user)
    }

    /// Recovers the span of a live allocation from its user pointer
    pub fn of(block: &Block, ptr: NonNull<u8>) -> Option<Self> {
        let user = block.offset_of(ptr)?;
        let header_at = user.checked_sub(SpanHeader::SIZE)?;
        let header: SpanHeader = block.read(header_at);
        Some(Self {
            start: user.checked_sub(header.lead)?,
            user,
            end: user.checked_add(header.size)?,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.end - self.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::testing::with_block;
    use crate::utils::is_aligned;

    #[test]
    fn planned_span_honours_alignment_and_offset() {
        with_block(256, 0, |mut block| {
            let span = Span::plan(&block, 3, 20, 32, 4).unwrap();
            assert!(span.user >= 3 + 4 + SpanHeader::SIZE);
            assert!(is_aligned(block.addr() + span.user, 32));
            assert_eq!(span.size(), 20);

            let ptr = span.commit(&mut block);
            assert_eq!(Span::of(&block, ptr), Some(span));
        });
    }

    #[test]
    fn plan_fails_when_block_is_full() {
        with_block(64, 0, |block| {
            assert!(Span::plan(&block, 0, 64, 8, 0).is_none());
            assert!(Span::plan(&block, 0, 64 - SpanHeader::SIZE, 8, 0).is_some());
        });
    }
}

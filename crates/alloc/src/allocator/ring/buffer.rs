//! Circular buffer with head/tail collision detection
//!
//! Live blocks form a doubly linked list in allocation order. A block is
//! `[padding][prefix][RingHeader][payload]`: the header sits immediately
//! before the aligned user pointer and `prefix` is the caller's `offset`
//! bytes. Padding is dead space until the ring wraps past it.
//!
//! ```text
//! not wrapped:  [ free ][head ... tail][ free ]
//! wrapped:      [... tail][ free ][head ...][gap]
//! ```

use core::ptr::NonNull;

use crate::buffer::header::{
    apply_delta, block_addr_before, delta, read_delta, read_word, write_delta, write_word,
};
use crate::buffer::{Block, ChainBuffer, Header};
use crate::utils::{WORD, place_with_offset};

/// Per-block header of the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RingHeader {
    /// Offset of this header from the start of its block
    pub position: usize,
    /// Bytes from the start of the block's span to this header
    pub lead: usize,
    pub size: usize,
    /// Delta to the next live header, 0 for none
    pub next: isize,
    /// Delta to the previous live header, 0 for none
    pub prev: isize,
}

impl RingHeader {
    fn link(position: usize, delta: isize) -> Option<usize> {
        (delta != 0).then(|| apply_delta(position, delta))
    }

    pub fn next_position(&self) -> Option<usize> {
        Self::link(self.position, self.next)
    }

    pub fn prev_position(&self) -> Option<usize> {
        Self::link(self.position, self.prev)
    }

    /// First byte of the span, caller prefix included
    pub fn start(&self) -> usize {
        self.position - self.lead
    }

    pub fn end(&self) -> usize {
        self.position + Self::SIZE + self.size
    }

    /// Address of the block holding the header in front of `ptr`
    ///
    /// # Safety
    /// `ptr` must be a live ring allocation.
    pub unsafe fn block_addr(ptr: NonNull<u8>) -> usize {
        // SAFETY: forwarded caller contract; `position` is the first word.
        unsafe { block_addr_before(ptr, Self::SIZE) }
    }
}

impl Header for RingHeader {
    const SIZE: usize = 5 * WORD;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            position: read_word(bytes, 0),
            lead: read_word(bytes, 1),
            size: read_word(bytes, 2),
            next: read_delta(bytes, 3),
            prev: read_delta(bytes, 4),
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        write_word(bytes, 0, self.position);
        write_word(bytes, 1, self.lead);
        write_word(bytes, 2, self.size);
        write_delta(bytes, 3, self.next);
        write_delta(bytes, 4, self.prev);
    }
}

/// Planned placement: span start, header position, user offset and end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RingSlot {
    pub start: usize,
    pub position: usize,
    pub user: usize,
    pub end: usize,
}

#[derive(Debug)]
pub(crate) struct RingBuffer {
    block: Block,
    /// Oldest live header
    head: Option<usize>,
    /// Span start of the oldest live block; nothing may be placed over it
    head_start: usize,
    /// Newest live header
    tail: Option<usize>,
    /// End of the last placement; where an empty ring starts again
    cursor: usize,
}

impl RingBuffer {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            head: None,
            head_start: 0,
            tail: None,
            cursor: 0,
        }
    }

    fn header(&self, position: usize) -> RingHeader {
        self.block.read(position)
    }

    fn place(&self, from: usize, size: usize, align: usize, offset: usize) -> Option<RingSlot> {
        let base = self.block.addr();
        let earliest = base.checked_add(from)?.checked_add(RingHeader::SIZE)?;
        let user = place_with_offset(earliest, align, offset)? - base;
        let end = user.checked_add(size)?;
        (end <= self.block.capacity()).then_some(RingSlot {
            start: from,
            position: user - RingHeader::SIZE,
            user,
            end,
        })
    }

    /// Finds room for a block, `None` when it would run into the head
    pub fn plan(&self, size: usize, align: usize, offset: usize) -> Option<RingSlot> {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return self
                .place(self.cursor, size, align, offset)
                .or_else(|| self.place(0, size, align, offset));
        };

        let tail_end = self.header(tail).end();
        let head_start = self.head_start;
        let before_head = |slot: &RingSlot| slot.end <= head_start;
        if tail >= head {
            self.place(tail_end, size, align, offset)
                .or_else(|| self.place(0, size, align, offset).filter(before_head))
        } else {
            self.place(tail_end, size, align, offset).filter(before_head)
        }
    }

    /// Writes the header of a planned slot and links it after the tail
    pub fn commit(&mut self, slot: RingSlot) -> NonNull<u8> {
        let mut header = RingHeader {
            position: slot.position,
            lead: slot.position - slot.start,
            size: slot.end - slot.user,
            next: 0,
            prev: 0,
        };
        if let Some(tail) = self.tail {
            header.prev = delta(slot.position, tail);
            let mut previous = self.header(tail);
            previous.next = delta(tail, slot.position);
            self.block.write(tail, &previous);
        } else {
            self.head = Some(slot.position);
            self.head_start = slot.start;
        }
        self.block.write(slot.position, &header);
        self.tail = Some(slot.position);
        self.cursor = slot.end;
        self.block.ptr_at(slot.user)
    }

    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> Option<NonNull<u8>> {
        let slot = self.plan(size, align, offset)?;
        Some(self.commit(slot))
    }

    /// Pointer to the user bytes of a planned slot
    #[inline]
    pub fn pointer_at(&self, offset: usize) -> NonNull<u8> {
        self.block.ptr_at(offset)
    }

    /// Header in front of a live user pointer
    pub fn header_of(&self, ptr: NonNull<u8>) -> Option<RingHeader> {
        let user = self.block.offset_of(ptr)?;
        let position = user.checked_sub(RingHeader::SIZE)?;
        let header = self.header(position);
        (header.position == position).then_some(header)
    }

    /// Unlinks `ptr` from the live list
    ///
    /// Retiring the head advances it; anything else is detached and its
    /// space is reclaimed once the head passes it. The unlinked header itself
    /// is left intact so [`relink`](Self::relink) can undo this.
    pub fn deallocate(&mut self, ptr: NonNull<u8>, pattern: Option<u8>) -> Option<RingHeader> {
        let header = self.header_of(ptr)?;
        let prev = header.prev_position();
        let next = header.next_position();

        if let Some(prev) = prev {
            let mut before = self.header(prev);
            before.next = next.map_or(0, |next| delta(prev, next));
            self.block.write(prev, &before);
        }
        if let Some(next) = next {
            let mut after = self.header(next);
            after.prev = prev.map_or(0, |prev| delta(next, prev));
            self.block.write(next, &after);
        }
        if self.head == Some(header.position) {
            self.head = next;
            if let Some(next) = next {
                self.head_start = self.header(next).start();
            }
        }
        if self.tail == Some(header.position) {
            self.tail = prev;
        }

        if let Some(pattern) = pattern {
            let user = header.position + RingHeader::SIZE;
            self.block.fill(user..user + header.size, pattern);
        }
        Some(header)
    }

    /// Puts an unlinked block back between its old neighbours
    pub fn relink(&mut self, header: RingHeader) {
        let position = header.position;
        match header.prev_position() {
            Some(prev) => {
                let mut before = self.header(prev);
                before.next = delta(prev, position);
                self.block.write(prev, &before);
            }
            None => {
                self.head = Some(position);
                self.head_start = header.start();
            }
        }
        match header.next_position() {
            Some(next) => {
                let mut after = self.header(next);
                after.prev = delta(next, position);
                self.block.write(next, &after);
            }
            None => self.tail = Some(position),
        }
    }

    /// Moves the cursor of an empty ring back to the start
    pub fn rewind(&mut self) {
        if self.head.is_none() {
            self.cursor = 0;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl ChainBuffer for RingBuffer {
    fn block(&self) -> &Block {
        &self.block
    }

    fn used(&self) -> usize {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return 0;
        };
        let tail_end = self.header(tail).end();
        if tail >= head {
            tail_end - self.head_start
        } else {
            self.block.capacity() - self.head_start + tail_end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::testing::with_block;

    /// Each 32-byte request with 8-byte alignment takes exactly one 64-byte cell
    const CELL: usize = RingHeader::SIZE + 32;

    fn fill(buffer: &mut RingBuffer) -> Vec<NonNull<u8>> {
        let mut live = Vec::new();
        while let Some(ptr) = buffer.allocate(32, 8, 0) {
            live.push(ptr);
        }
        live
    }

    #[test]
    fn header_position_recovers_the_block() {
        with_block(4 * CELL, 0, |block| {
            let base = block.addr();
            let mut buffer = RingBuffer::new(block);
            buffer.allocate(32, 8, 0).unwrap();
            let second = buffer.allocate(32, 8, 0).unwrap();
            assert_eq!(unsafe { RingHeader::block_addr(second) }, base);
            assert_eq!(buffer.header_of(second).unwrap().position, CELL);
        });
    }

    #[test]
    fn collision_with_head_fails() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let live = fill(&mut buffer);
            assert_eq!(live.len(), 4);
            assert_eq!(buffer.used(), 4 * CELL);
            assert!(buffer.allocate(1, 1, 0).is_none());
        });
    }

    #[test]
    fn retiring_the_head_lets_the_ring_wrap() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let live = fill(&mut buffer);
            buffer.deallocate(live[0], None).unwrap();
            assert_eq!(buffer.used(), 3 * CELL);

            let wrapped = buffer.allocate(32, 8, 0).unwrap();
            assert_eq!(wrapped, live[0]);
            assert_eq!(buffer.used(), 4 * CELL);
            assert!(buffer.allocate(32, 8, 0).is_none());

            buffer.deallocate(live[1], None).unwrap();
            assert_eq!(buffer.used(), 3 * CELL);
            assert_eq!(buffer.allocate(32, 8, 0), Some(live[1]));
        });
    }

    #[test]
    fn detached_middle_block_is_reclaimed_with_the_head() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let live = fill(&mut buffer);
            buffer.deallocate(live[1], None).unwrap();
            assert_eq!(buffer.used(), 4 * CELL);

            buffer.deallocate(live[0], None).unwrap();
            assert_eq!(buffer.used(), 2 * CELL);
            assert_eq!(buffer.header_of(live[2]).unwrap().prev, 0);
        });
    }

    #[test]
    fn retiring_the_tail_frees_its_space() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let a = buffer.allocate(32, 8, 0).unwrap();
            let b = buffer.allocate(32, 8, 0).unwrap();
            buffer.deallocate(b, None).unwrap();
            assert_eq!(buffer.used(), CELL);
            assert_eq!(buffer.header_of(a).unwrap().next, 0);
            assert_eq!(buffer.allocate(32, 8, 0), Some(b));
        });
    }

    #[test]
    fn relink_undoes_deallocate() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let live = fill(&mut buffer);
            let header = buffer.deallocate(live[2], None).unwrap();
            buffer.relink(header);
            for window in live.windows(2) {
                let first = buffer.header_of(window[0]).unwrap();
                let second = buffer.header_of(window[1]).unwrap();
                assert_eq!(first.next_position(), Some(second.position));
                assert_eq!(second.prev_position(), Some(first.position));
            }
        });
    }

    #[test]
    fn empty_ring_restarts_at_cursor_then_wraps() {
        with_block(4 * CELL, 0, |block| {
            let mut buffer = RingBuffer::new(block);
            let a = buffer.allocate(32, 8, 0).unwrap();
            let b = buffer.allocate(32, 8, 0).unwrap();
            buffer.deallocate(a, None);
            buffer.deallocate(b, None);
            assert!(buffer.is_empty());
            assert_eq!(buffer.used(), 0);

            // Continues after the last block instead of reusing the start.
            let c = buffer.allocate(32, 8, 0).unwrap();
            assert_eq!(buffer.header_of(c).unwrap().position, 2 * CELL);

            buffer.deallocate(c, None);
            buffer.rewind();
            let d = buffer.allocate(32, 8, 0).unwrap();
            assert_eq!(d, a);
        });
    }
}

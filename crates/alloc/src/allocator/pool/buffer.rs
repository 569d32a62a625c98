//! Fixed-slot buffer with an offset-linked free list
//!
//! ```text
//! free:      [ pad | prev | next ][ ........................ ]
//!            |<-- header_len -->|<--------- data_len -------->|
//! allocated: [ pad | room | position | ALLOCATED ][ data .... ]
//!                                                 ^ user, aligned
//!            |<------ lead (offset + header) ---->|
//! ```
//!
//! Free slots are kept in a doubly linked list sorted by offset. Links are
//! signed byte deltas between slot starts, so the list stays valid wherever
//! the provider puts the block. A handed-out slot carries its header right
//! before the user pointer, with the caller's `offset` bytes in front of it,
//! so the header moves toward the data when a prefix is asked for.

use core::ptr::NonNull;

use crate::buffer::header::{
    apply_delta, block_addr_before, delta, read_delta, read_word, write_delta, write_word,
};
use crate::buffer::{Block, ChainBuffer, Header};
use crate::utils::{WORD, align_up, checked_align_up};

/// Marks a header as allocated in the `next` word
const ALLOCATED: isize = isize::MIN;

/// Header stored at the end of each slot's header area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolHeader {
    /// Node of the free list; deltas are 0 at the list ends
    Free { prev: isize, next: isize },
    /// Handed out; records the header's own offset in the block
    Allocated { position: usize },
}

impl PoolHeader {
    /// Address of the block holding the slot behind `ptr`
    ///
    /// # Safety
    /// `ptr` must be a live pool allocation.
    pub unsafe fn block_addr(ptr: NonNull<u8>) -> usize {
        // SAFETY: forwarded caller contract; `position` is the first word of
        // an allocated header.
        unsafe { block_addr_before(ptr, Self::SIZE) }
    }
}

impl Header for PoolHeader {
    const SIZE: usize = 2 * WORD;

    fn decode(bytes: &[u8]) -> Self {
        match read_delta(bytes, 1) {
            ALLOCATED => Self::Allocated {
                position: read_word(bytes, 0),
            },
            next => Self::Free {
                prev: read_delta(bytes, 0),
                next,
            },
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        match *self {
            Self::Free { prev, next } => {
                write_delta(bytes, 0, prev);
                write_delta(bytes, 1, next);
            }
            Self::Allocated { position } => {
                write_word(bytes, 0, position);
                write_delta(bytes, 1, ALLOCATED);
            }
        }
    }
}

/// Slot layout derived from the pool's maximum size and alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotGeometry {
    pub align: usize,
    pub header_len: usize,
    pub data_len: usize,
    pub stride: usize,
}

impl SlotGeometry {
    pub fn new(max_size: usize, max_align: usize) -> Option<Self> {
        let align = max_align.max(WORD);
        let header_len = align_up(PoolHeader::SIZE, align);
        let data_len = checked_align_up(max_size, align)?;
        Some(Self {
            align,
            header_len,
            data_len,
            stride: header_len.checked_add(data_len)?,
        })
    }

    /// Distance from the slot start to an aligned user pointer with room
    /// for the header and `offset` prefix bytes in front of it
    #[inline]
    pub fn lead(align: usize, offset: usize) -> Option<usize> {
        offset
            .checked_add(PoolHeader::SIZE)
            .and_then(|front| checked_align_up(front, align))
    }

    /// Slot bytes a request occupies, `None` on overflow
    pub fn footprint(size: usize, align: usize, offset: usize) -> Option<usize> {
        Self::lead(align, offset)?.checked_add(size)
    }

    /// Whether a request fits a slot
    pub fn fits(&self, size: usize, align: usize, offset: usize) -> bool {
        align <= self.align
            && size <= self.data_len
            && Self::footprint(size, align, offset).is_some_and(|used| used <= self.stride)
    }
}

#[derive(Debug)]
pub(crate) struct PoolBuffer {
    block: Block,
    geometry: SlotGeometry,
    count: usize,
    free_head: Option<usize>,
    free_tail: Option<usize>,
    free_count: usize,
}

impl PoolBuffer {
    /// Partitions the block into slots, all linked into the free list
    pub fn new(block: Block, geometry: SlotGeometry) -> Self {
        let count = block.capacity() / geometry.stride;
        let mut buffer = Self {
            block,
            geometry,
            count,
            free_head: None,
            free_tail: None,
            free_count: count,
        };
        let stride = geometry.stride as isize;
        for index in 0..count {
            let header = PoolHeader::Free {
                prev: if index == 0 { 0 } else { -stride },
                next: if index + 1 == count { 0 } else { stride },
            };
            buffer.write_header(index * geometry.stride, header);
        }
        if count > 0 {
            buffer.free_head = Some(0);
            buffer.free_tail = Some((count - 1) * geometry.stride);
        }
        buffer
    }

    #[inline]
    fn header_at(&self, slot: usize) -> usize {
        slot + self.geometry.header_len - PoolHeader::SIZE
    }

    fn read_header(&self, slot: usize) -> PoolHeader {
        self.block.read(self.header_at(slot))
    }

    fn write_header(&mut self, slot: usize, header: PoolHeader) {
        let at = self.header_at(slot);
        self.block.write(at, &header);
    }

    /// Free-list links of a free slot as absolute positions
    fn links(&self, slot: usize) -> (Option<usize>, Option<usize>) {
        match self.read_header(slot) {
            PoolHeader::Free { prev, next } => (
                (prev != 0).then(|| apply_delta(slot, prev)),
                (next != 0).then(|| apply_delta(slot, next)),
            ),
            PoolHeader::Allocated { .. } => (None, None),
        }
    }

    fn set_links(&mut self, slot: usize, prev: Option<usize>, next: Option<usize>) {
        let header = PoolHeader::Free {
            prev: prev.map_or(0, |prev| delta(slot, prev)),
            next: next.map_or(0, |next| delta(slot, next)),
        };
        self.write_header(slot, header);
    }

    fn set_next(&mut self, slot: usize, next: Option<usize>) {
        let (prev, _) = self.links(slot);
        self.set_links(slot, prev, next);
    }

    fn set_prev(&mut self, slot: usize, prev: Option<usize>) {
        let (_, next) = self.links(slot);
        self.set_links(slot, prev, next);
    }

    /// Pops the lowest free slot
    pub fn allocate(&mut self, size: usize, align: usize, offset: usize) -> Option<NonNull<u8>> {
        debug_assert!(
            self.geometry.fits(size, align, offset),
            "request of {size} bytes at alignment {align} does not fit a slot"
        );
        let lead = SlotGeometry::lead(align, offset)?;
        let slot = self.free_head?;
        let (_, next) = self.links(slot);
        match next {
            Some(next) => self.set_prev(next, None),
            None => self.free_tail = None,
        }
        self.free_head = next;
        self.free_count -= 1;

        let user = slot + lead;
        let position = user - PoolHeader::SIZE;
        self.block.write(position, &PoolHeader::Allocated { position });
        Some(self.block.ptr_at(user))
    }

    /// Header position and slot of a handed-out pointer
    fn locate(&self, ptr: NonNull<u8>) -> Option<(usize, usize)> {
        let position = self.block.offset_of(ptr)?.checked_sub(PoolHeader::SIZE)?;
        let slot = position / self.geometry.stride * self.geometry.stride;
        (slot < self.count * self.geometry.stride).then_some((position, slot))
    }

    /// Returns the slot holding `ptr` to the free list, keeping it sorted
    pub fn deallocate(&mut self, ptr: NonNull<u8>, pattern: Option<u8>) -> Option<usize> {
        let (position, slot) = self.locate(ptr)?;
        let header: PoolHeader = self.block.read(position);
        debug_assert_eq!(
            header,
            PoolHeader::Allocated { position },
            "double free or foreign pointer"
        );
        if header != (PoolHeader::Allocated { position }) {
            return None;
        }
        // Clears the mark so a second free of `ptr` is caught above.
        self.block.write(position, &PoolHeader::Free { prev: 0, next: 0 });

        match (self.free_head, self.free_tail) {
            (Some(_), Some(tail)) if slot > tail => {
                self.set_next(tail, Some(slot));
                self.set_links(slot, Some(tail), None);
                self.free_tail = Some(slot);
            }
            (Some(head), Some(_)) if slot < head => {
                self.set_prev(head, Some(slot));
                self.set_links(slot, None, Some(head));
                self.free_head = Some(slot);
            }
            (Some(_), Some(tail)) => {
                // head < slot < tail: walk back from the tail to the first
                // smaller node. The head is smaller, so the walk ends.
                let mut after = tail;
                let mut before = self.links(tail).0;
                while let Some(node) = before {
                    if node < slot {
                        break;
                    }
                    after = node;
                    before = self.links(node).0;
                }
                debug_assert!(before.is_some(), "free list lost its order");
                self.set_links(slot, before, Some(after));
                self.set_prev(after, Some(slot));
                match before {
                    Some(node) => self.set_next(node, Some(slot)),
                    None => self.free_head = Some(slot),
                }
            }
            _ => {
                self.set_links(slot, None, None);
                self.free_head = Some(slot);
                self.free_tail = Some(slot);
            }
        }
        self.free_count += 1;

        if let Some(pattern) = pattern {
            let data = slot + self.geometry.header_len;
            self.block.fill(data..data + self.geometry.data_len, pattern);
        }
        Some(slot)
    }

    /// Whether `size` bytes at `ptr` still fit its slot
    pub fn fits_in_place(&self, ptr: NonNull<u8>, size: usize) -> bool {
        self.locate(ptr).is_some_and(|(position, slot)| {
            position + PoolHeader::SIZE + size <= slot + self.geometry.stride
        })
    }

    pub fn slot_count(&self) -> usize {
        self.count
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// No slot is handed out
    pub fn is_unused(&self) -> bool {
        self.free_count == self.count
    }

    /// Slot offsets in free-list order
    #[cfg(test)]
    pub fn free_slots(&self) -> Vec<usize> {
        let mut slots = Vec::with_capacity(self.free_count);
        let mut node = self.free_head;
        while let Some(slot) = node {
            slots.push(slot);
            node = self.links(slot).1;
        }
        slots
    }
}

impl ChainBuffer for PoolBuffer {
    fn block(&self) -> &Block {
        &self.block
    }

    fn used(&self) -> usize {
        (self.count - self.free_count) * self.geometry.stride
    }
}

//! One provider block viewed as a byte array
//!
//! # Safety
//!
//! This is the only place a provider pointer is turned into a slice. A block
//! is filled once at construction, so every byte is initialised before any
//! slice exists, and slices never outlive the method that creates them. User
//! pointers handed out by the allocators derive from the same raw base
//! pointer and stay valid across those short-lived borrows.

use core::ops::Range;
use core::ptr::NonNull;

use super::header::Header;

/// Exclusively owned memory block carved by a buffer algorithm
#[derive(Debug)]
pub(crate) struct Block {
    ptr: NonNull<u8>,
    capacity: usize,
}

// SAFETY: a Block is the sole owner of its memory; moving it to another
// thread moves that ownership with it.
unsafe impl Send for Block {}

impl Block {
    /// Takes ownership of `capacity` bytes at `ptr`, filling them with `fill`
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `capacity` bytes and not aliased by
    /// any other owner for the lifetime of the block.
    pub unsafe fn init(ptr: NonNull<u8>, capacity: usize, fill: u8) -> Self {
        // SAFETY: caller guarantees `capacity` writable bytes at ptr.
        unsafe { ptr.as_ptr().write_bytes(fill, capacity) };
        Self { ptr, capacity }
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// Offset of `ptr` inside this block, if it points into it
    #[inline]
    pub fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        ptr.as_ptr()
            .addr()
            .checked_sub(self.addr())
            .filter(|offset| *offset <= self.capacity)
    }

    #[inline]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.offset_of(ptr).is_some()
    }

    /// Pointer to `offset` bytes into the block
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.capacity, "offset {offset} outside block");
        // SAFETY: offset <= capacity keeps the pointer inside (or one past) the block.
        unsafe { self.ptr.add(offset) }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: initialised in `init`, owned by self (see module docs).
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: initialised in `init`, owned by self, `&mut self` excludes
        // other borrows of the block (see module docs).
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    #[inline]
    pub fn read<H: Header>(&self, at: usize) -> H {
        H::decode(&self.bytes()[at..at + H::SIZE])
    }

    #[inline]
    pub fn write<H: Header>(&mut self, at: usize, header: &H) {
        header.encode(&mut self.bytes_mut()[at..at + H::SIZE]);
    }

    pub fn fill(&mut self, range: Range<usize>, byte: u8) {
        self.bytes_mut()[range].fill(byte);
    }
}

/// Copies `len` bytes between two live allocations of one allocator
///
/// # Safety
/// Both pointers must be valid for `len` bytes. The regions may overlap.
pub(crate) unsafe fn move_payload(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    if src != dst && len > 0 {
        // SAFETY: caller guarantees both ranges are valid; `copy` handles overlap.
        unsafe { core::ptr::copy(src.as_ptr(), dst.as_ptr(), len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::header::SpanHeader;
    use crate::buffer::testing::with_block;

    #[test]
    fn init_fills_every_byte() {
        with_block(64, 0xAA, |block| {
            assert!(block.bytes().iter().all(|b| *b == 0xAA));
        });
    }

    #[test]
    fn offsets_are_bounded() {
        with_block(64, 0xAA, |block| {
            assert_eq!(block.offset_of(block.ptr_at(10)), Some(10));
            assert_eq!(block.offset_of(block.ptr_at(64)), Some(64));

            let outside = NonNull::new((block.addr() + 65) as *mut u8).unwrap();
            assert_eq!(block.offset_of(outside), None);
        });
    }

    #[test]
    fn headers_read_back() {
        with_block(64, 0xAA, |mut block| {
            let header = SpanHeader { size: 12, lead: 16 };
            block.write(24, &header);
            assert_eq!(block.read::<SpanHeader>(24), header);
        });
    }

    #[test]
    fn move_payload_handles_overlap() {
        with_block(16, 0, |mut block| {
            for (i, b) in block.bytes_mut().iter_mut().enumerate() {
                *b = i as u8;
            }
            unsafe { move_payload(block.ptr_at(0), block.ptr_at(4), 8) };
            assert_eq!(&block.bytes()[4..12], &[0, 1, 2, 3, 4, 5, 6, 7]);
        });
    }
}

//! In-place headers, encoded as native-endian words in the buffer bytes

use core::ptr::NonNull;

use crate::utils::WORD;

/// A fixed-size record stored inside a buffer next to user data
pub(crate) trait Header: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> Self;

    fn encode(&self, bytes: &mut [u8]);
}

#[inline]
pub(crate) fn read_word(bytes: &[u8], index: usize) -> usize {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[index * WORD..(index + 1) * WORD]);
    usize::from_ne_bytes(word)
}

#[inline]
pub(crate) fn write_word(bytes: &mut [u8], index: usize, value: usize) {
    bytes[index * WORD..(index + 1) * WORD].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub(crate) fn read_delta(bytes: &[u8], index: usize) -> isize {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[index * WORD..(index + 1) * WORD]);
    isize::from_ne_bytes(word)
}

#[inline]
pub(crate) fn write_delta(bytes: &mut [u8], index: usize, value: isize) {
    bytes[index * WORD..(index + 1) * WORD].copy_from_slice(&value.to_ne_bytes());
}

/// Signed distance between two offsets in the same buffer
#[inline]
pub(crate) fn delta(from: usize, to: usize) -> isize {
    to as isize - from as isize
}

/// Applies a delta produced by [`delta`]
#[inline]
pub(crate) fn apply_delta(from: usize, delta: isize) -> usize {
    from.wrapping_add_signed(delta)
}

/// Address of the block owning `ptr`, read from a header that sits right
/// before `ptr` and starts with its own offset in the block
///
/// # Safety
/// `header_size` initialised bytes must precede `ptr`, the first word being
/// the header's position.
pub(crate) unsafe fn block_addr_before(ptr: NonNull<u8>, header_size: usize) -> usize {
    // SAFETY: caller guarantees the header; it may be unaligned for a word read.
    let position = unsafe {
        ptr.as_ptr()
            .sub(header_size)
            .cast::<usize>()
            .read_unaligned()
    };
    ptr.as_ptr().addr() - header_size - position
}

/// Header of the bump-style buffers (linear and stack)
///
/// Sits immediately before the user pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpanHeader {
    /// Bytes requested by the caller
    pub size: usize,
    /// Bytes from the span start (the cursor before allocating) to the user pointer
    pub lead: usize,
}

impl SpanHeader {
    /// Total bytes the allocation occupies, header and padding included
    pub fn span(&self) -> usize {
        self.lead + self.size
    }
}

impl Header for SpanHeader {
    const SIZE: usize = 2 * WORD;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            size: read_word(bytes, 0),
            lead: read_word(bytes, 1),
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        write_word(bytes, 0, self.size);
        write_word(bytes, 1, self.lead);
    }
}

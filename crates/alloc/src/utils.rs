//! Alignment helpers shared by the buffer algorithms and providers

/// Machine word size; every in-place header is built from words
pub const WORD: usize = core::mem::size_of::<usize>();

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use strata_alloc::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Overflow-checked variant of [`align_up`]
#[inline]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(v) => Some(v & !(alignment - 1)),
        None => None,
    }
}

/// Aligns a value down to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use strata_alloc::utils::align_down;
///
/// assert_eq!(align_down(7, 8), 0);
/// assert_eq!(align_down(9, 8), 8);
/// ```
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Checks if a value is a power of two (zero is not)
#[inline(always)]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// First `alignment`-aligned address at least `offset` bytes past `addr`
///
/// This is the placement rule used everywhere in the crate: the returned
/// point is aligned, and the `offset` bytes in front of it are reserved for
/// the caller.
///
/// # Examples
/// ```
/// use strata_alloc::utils::place_with_offset;
///
/// assert_eq!(place_with_offset(100, 16, 0), Some(112));
/// assert_eq!(place_with_offset(100, 16, 4), Some(112));
/// assert_eq!(place_with_offset(100, 16, 13), Some(128));
/// ```
#[inline]
pub const fn place_with_offset(addr: usize, alignment: usize, offset: usize) -> Option<usize> {
    match addr.checked_add(offset) {
        Some(shifted) => checked_align_up(shifted, alignment),
        None => None,
    }
}

/// Worst-case bytes a request can occupy: header, offset prefix, padding and payload
#[inline]
pub fn worst_case_span(header: usize, size: usize, align: usize, offset: usize) -> Option<usize> {
    header
        .checked_add(offset)?
        .checked_add(align - 1)?
        .checked_add(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_align_up_detects_overflow() {
        assert_eq!(checked_align_up(usize::MAX, 8), None);
        assert_eq!(checked_align_up(17, 16), Some(32));
    }

    #[test]
    fn power_of_two() {
        assert!(!is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(4096));
        assert!(!is_power_of_two(12));
    }

    #[test]
    fn offset_placement_keeps_prefix_before_aligned_point() {
        for addr in 0..64 {
            for offset in 0..20 {
                let placed = place_with_offset(addr, 8, offset).unwrap();
                assert!(is_aligned(placed, 8));
                assert!(placed - addr >= offset);
                assert!(placed - addr < offset + 8);
            }
        }
    }

    #[test]
    fn worst_case_span_covers_padding() {
        assert_eq!(worst_case_span(16, 100, 8, 0), Some(16 + 7 + 100));
        assert_eq!(worst_case_span(16, usize::MAX, 8, 0), None);
    }
}

//! Growth policies for buffer chains
//!
//! A magnifier maps the size of the current tail buffer to the size of the
//! next one. Implementations must be monotonic non-decreasing; the chain takes
//! `max(magnify(current), request)` so a magnifier never has to know about
//! individual requests.

/// Growth policy for buffer chains
pub trait Magnifier {
    /// Size of the buffer that follows one of `size` bytes
    fn magnify(&self, size: usize) -> usize;
}

impl<F> Magnifier for F
where
    F: Fn(usize) -> usize,
{
    #[inline]
    fn magnify(&self, size: usize) -> usize {
        self(size)
    }
}

/// Each new buffer is twice the size of the previous one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Doubling;

impl Magnifier for Doubling {
    #[inline]
    fn magnify(&self, size: usize) -> usize {
        size.saturating_mul(2)
    }
}

/// Every buffer has the same size as the previous one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constant;

impl Magnifier for Constant {
    #[inline]
    fn magnify(&self, size: usize) -> usize {
        size
    }
}

/// Grows by a fixed number of bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stepped {
    pub step: usize,
}

impl Stepped {
    #[must_use]
    pub const fn new(step: usize) -> Self {
        Self { step }
    }
}

impl Magnifier for Stepped {
    #[inline]
    fn magnify(&self, size: usize) -> usize {
        size.saturating_add(self.step)
    }
}

/// Grows by `numerator / denominator`, never shrinking
///
/// `Scaled::new(3, 2)` gives the 1.5x policy common in vector growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaled {
    numerator: usize,
    denominator: usize,
}

impl Scaled {
    #[must_use]
    pub const fn new(numerator: usize, denominator: usize) -> Self {
        let denominator = if denominator == 0 { 1 } else { denominator };
        Self {
            numerator,
            denominator,
        }
    }
}

impl Magnifier for Scaled {
    #[inline]
    fn magnify(&self, size: usize) -> usize {
        (size.saturating_mul(self.numerator) / self.denominator).max(size)
    }
}

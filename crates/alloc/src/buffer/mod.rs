//! Shared buffer-chain glue
//!
//! - `block` - one provider block seen as an owned byte array
//! - `header` - in-place header encoding
//! - `span` - bump placement used by the linear and stack buffers
//! - `chain` - the owning chain with grow, release and shrink

pub(crate) mod block;
pub(crate) mod chain;
pub(crate) mod header;
pub(crate) mod span;

pub(crate) use block::{Block, move_payload};
pub(crate) use chain::{Chain, ChainBuffer};
pub(crate) use header::{Header, SpanHeader};
pub(crate) use span::Span;

use crate::error::{AllocError, AllocResult};
use crate::utils::{is_power_of_two, worst_case_span};

/// Rejects bad alignments and returns the worst-case footprint of a request
pub(crate) fn footprint(header: usize, size: usize, align: usize, offset: usize) -> AllocResult<usize> {
    if !is_power_of_two(align) {
        return Err(AllocError::invalid_alignment(align));
    }
    worst_case_span(header, size, align, offset).ok_or_else(|| AllocError::size_overflow("request footprint"))
}

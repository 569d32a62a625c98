//! Property tests for placement and reclamation invariants.
//!
//! For every allocator: live blocks are aligned, and neither they nor the
//! room requested in front of them overlap. For the pool: any deallocation order restores a full,
//! reusable free list. For stack and ring: balanced alloc/free sequences do
//! not increase used bytes.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use proptest::prelude::*;
use strata_alloc::{
    ChainAllocator, ChainConfig, LinearAllocator, PoolAllocator, PoolConfig, RingAllocator,
    StackAllocator,
};

/// (size, log2 alignment, offset)
fn request() -> impl Strategy<Value = (usize, u32, usize)> {
    (1usize..300, 0u32..7, 0usize..64)
}

fn small() -> ChainConfig {
    ChainConfig::debug().with_start_size(512)
}

#[derive(Debug, Clone, Copy)]
struct Live {
    ptr: NonNull<u8>,
    size: usize,
    room: usize,
    room_len: usize,
    tag: u8,
}

impl Live {
    /// Fills the payload and the caller room in front of the header with `tag`
    fn stamp(ptr: NonNull<u8>, size: usize, header: usize, offset: usize, tag: u8) -> Self {
        let room = ptr.as_ptr() as usize - header - offset;
        unsafe {
            ptr.as_ptr().write_bytes(tag, size);
            (room as *mut u8).write_bytes(tag, offset);
        }
        Self {
            ptr,
            size,
            room,
            room_len: offset,
            tag,
        }
    }

    fn intact(&self) -> bool {
        let payload = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) };
        let room = unsafe { std::slice::from_raw_parts(self.room as *const u8, self.room_len) };
        payload.iter().chain(room).all(|b| *b == self.tag)
    }

    fn ranges(&self) -> [std::ops::Range<usize>; 2] {
        let start = self.ptr.as_ptr() as usize;
        [start..start + self.size, self.room..self.room + self.room_len]
    }
}

fn disjoint(live: &[Live]) -> bool {
    let mut ranges: Vec<_> = live
        .iter()
        .flat_map(Live::ranges)
        .filter(|r| !r.is_empty())
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges.windows(2).all(|pair| pair[0].end <= pair[1].start)
}

/// Allocates every request, checking alignment, then checks overlap and contents
fn place_all<A: ChainAllocator>(
    allocator: &mut A,
    requests: &[(usize, u32, usize)],
) -> Result<Vec<Live>, TestCaseError> {
    let mut live = Vec::new();
    for (i, &(size, log_align, offset)) in requests.iter().enumerate() {
        let align = 1usize << log_align;
        let ptr = allocator
            .allocate(size, align, offset)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(ptr.as_ptr() as usize % align, 0);
        let header = allocator.header_size();
        live.push(Live::stamp(ptr, size, header, offset, i as u8));
    }
    prop_assert!(disjoint(&live));
    prop_assert!(live.iter().all(Live::intact));
    Ok(live)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn linear_blocks_are_aligned_and_disjoint(
        requests in proptest::collection::vec(request(), 1..40),
    ) {
        let mut linear = LinearAllocator::with_config(small()).unwrap();
        place_all(&mut linear, &requests)?;
    }

    #[test]
    fn stack_blocks_are_aligned_and_disjoint(
        requests in proptest::collection::vec(request(), 1..40),
    ) {
        let mut stack = StackAllocator::with_config(small()).unwrap();
        place_all(&mut stack, &requests)?;
    }

    #[test]
    fn ring_blocks_are_aligned_and_disjoint(
        requests in proptest::collection::vec(request(), 1..40),
    ) {
        let mut ring = RingAllocator::with_config(small()).unwrap();
        place_all(&mut ring, &requests)?;
    }

    #[test]
    fn pool_blocks_are_aligned_and_disjoint(
        requests in proptest::collection::vec((1usize..=64, 0u32..5, 0usize..64), 1..60),
    ) {
        let mut pool = PoolAllocator::with_config(PoolConfig::new(128, 16, 4)).unwrap();
        place_all(&mut pool, &requests)?;
    }

    #[test]
    fn pool_any_free_order_restores_every_slot(
        order in Just((0..24).collect::<Vec<usize>>()).prop_shuffle(),
    ) {
        let mut pool = PoolAllocator::with_config(PoolConfig::new(32, 8, 8)).unwrap();
        let ptrs: Vec<_> = (0..24).map(|_| pool.allocate(32, 8, 0).unwrap()).collect();
        let total = pool.total_slots();

        for index in order {
            unsafe { pool.deallocate(ptrs[index]) };
        }
        prop_assert_eq!(pool.free_slots(), total);
        prop_assert_eq!(pool.used_bytes(), 0);

        let mut again: Vec<_> = (0..24).map(|_| pool.allocate(32, 8, 0).unwrap()).collect();
        let mut before = ptrs.clone();
        again.sort();
        before.sort();
        prop_assert_eq!(again, before);
        prop_assert_eq!(pool.total_slots(), total);
    }

    #[test]
    fn stack_balanced_cycles_do_not_grow_usage(
        requests in proptest::collection::vec(request(), 1..20),
        rounds in 1usize..5,
    ) {
        let mut stack = StackAllocator::with_config(small()).unwrap();
        let baseline = stack.used_bytes();
        for _ in 0..rounds {
            let live = place_all(&mut stack, &requests)?;
            for block in live.iter().rev() {
                unsafe { stack.deallocate(block.ptr) };
            }
            prop_assert_eq!(stack.used_bytes(), baseline);
        }
    }

    #[test]
    fn ring_balanced_cycles_do_not_grow_usage(
        requests in proptest::collection::vec(request(), 1..20),
        rounds in 1usize..5,
    ) {
        let mut ring = RingAllocator::with_config(small()).unwrap();
        for _ in 0..rounds {
            let live = place_all(&mut ring, &requests)?;
            for block in &live {
                unsafe { ring.deallocate(block.ptr) };
            }
            prop_assert_eq!(ring.used_bytes(), 0);
        }
    }
}

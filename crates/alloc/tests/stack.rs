#![allow(unsafe_code)]

use std::ptr::NonNull;

use strata_alloc::{AllocError, ChainConfig, StackAllocator, StackFrame, StatisticsProvider};

fn small() -> ChainConfig {
    ChainConfig::debug().with_start_size(256)
}

fn fill(ptr: NonNull<u8>, len: usize, byte: u8) {
    unsafe { ptr.as_ptr().write_bytes(byte, len) };
}

fn read(ptr: NonNull<u8>, len: usize) -> Vec<u8> {
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len).to_vec() }
}

#[test]
fn test_chain_is_created_lazily() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    assert_eq!(stack.buffer_count(), 0);
    stack.allocate(8, 8, 0).expect("allocate");
    assert_eq!(stack.buffer_count(), 1);
}

#[test]
fn test_lifo_free_reuses_the_same_address() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(32, 8, 0).expect("base");
    let top = stack.allocate(48, 16, 0).expect("top");
    let used = stack.used_bytes();

    unsafe { stack.deallocate(top) };
    assert!(stack.used_bytes() < used);

    let again = stack.allocate(48, 16, 0).expect("again");
    assert_eq!(again, top);
    assert_eq!(stack.used_bytes(), used);
}

#[test]
fn test_out_of_order_free_rewinds_to_the_lowest_block() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    let a = stack.allocate(16, 8, 0).expect("a");
    let b = stack.allocate(16, 8, 0).expect("b");
    let _c = stack.allocate(16, 8, 0).expect("c");

    unsafe { stack.deallocate(b) };
    let after_b = stack.used_bytes();
    unsafe { stack.deallocate(a) };
    assert!(stack.used_bytes() < after_b);
    assert_eq!(stack.used_bytes(), 0);

    assert_eq!(stack.allocate(16, 8, 0).expect("reuse"), a);
}

#[test]
fn test_full_buffer_grows_and_frees_per_buffer() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    let first = stack.allocate(200, 8, 0).expect("first");
    let second = stack.allocate(200, 8, 0).expect("second");
    assert_eq!(stack.buffer_count(), 2);

    unsafe { stack.deallocate(second) };
    unsafe { stack.deallocate(first) };
    assert_eq!(stack.used_bytes(), 0);
    assert_eq!(stack.buffer_count(), 2);
}

#[test]
fn test_reallocate_top_block_stays_in_place() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(16, 8, 0).expect("base");
    let top = stack.allocate(32, 8, 0).expect("top");
    fill(top, 32, 0x11);

    let grown = unsafe { stack.reallocate(top, 96, 8, 0) }.expect("grow");
    assert_eq!(grown, top);
    assert_eq!(read(grown, 32), vec![0x11; 32]);

    let shrunk = unsafe { stack.reallocate(grown, 8, 8, 0) }.expect("shrink");
    assert_eq!(shrunk, top);
    assert_eq!(read(shrunk, 8), vec![0x11; 8]);
}

#[test]
fn test_reallocate_beyond_the_buffer_moves_the_data() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    let ptr = stack.allocate(64, 8, 0).expect("allocate");
    fill(ptr, 64, 0x77);

    let moved = unsafe { stack.reallocate(ptr, 1024, 32, 0) }.expect("grow");
    assert_eq!(stack.buffer_count(), 2);
    assert_eq!(moved.as_ptr() as usize % 32, 0);
    assert_eq!(read(moved, 64), vec![0x77; 64]);
}

#[test]
fn test_reallocate_with_a_stricter_alignment_moves_overlapping_data() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    let ptr = stack.allocate(40, 1, 3).expect("allocate");
    for i in 0..40 {
        unsafe { ptr.as_ptr().add(i).write(i as u8) };
    }

    let moved = unsafe { stack.reallocate(ptr, 40, 64, 0) }.expect("realign");
    assert_eq!(moved.as_ptr() as usize % 64, 0);
    assert_eq!(read(moved, 40), (0..40).collect::<Vec<u8>>());
}

#[test]
fn test_marker_restores_across_buffers() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(64, 8, 0).expect("base");
    let used = stack.used_bytes();
    let marker = stack.mark();

    for _ in 0..8 {
        stack.allocate(100, 8, 0).expect("allocate");
    }
    assert!(stack.buffer_count() > 1);

    unsafe { stack.restore_to_marker(marker) }.expect("restore");
    assert_eq!(stack.used_bytes(), used);
}

#[test]
fn test_stale_marker_is_rejected() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(200, 8, 0).expect("first");
    stack.allocate(200, 8, 0).expect("second");
    let marker = stack.mark();
    assert_eq!(marker.buffer(), 1);

    unsafe { stack.restore_to_marker(Default::default()) }.expect("restore to start");
    stack.purge();
    assert_eq!(stack.buffer_count(), 1);

    let err = unsafe { stack.restore_to_marker(marker) }.unwrap_err();
    assert!(matches!(err, AllocError::InvalidMarker { buffer: 1, .. }));
}

#[test]
fn test_frame_restores_on_drop() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(32, 8, 0).expect("base");
    let used = stack.used_bytes();

    {
        let mut frame = StackFrame::new(&mut stack);
        frame.allocate(64, 8, 0).expect("inner");
        {
            let mut nested = StackFrame::new(&mut *frame);
            nested.allocate(500, 8, 0).expect("nested");
        }
        assert!(frame.used_bytes() > used);
    }
    assert_eq!(stack.used_bytes(), used);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "stale stack frame marker")]
fn test_frame_outliving_a_purge_is_caught() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(200, 8, 0).expect("first");
    stack.allocate(200, 8, 0).expect("second");

    let mut frame = StackFrame::new(&mut stack);
    assert_eq!(frame.marker().buffer(), 1);
    unsafe { frame.restore_to_marker(Default::default()) }.expect("restore to start");
    frame.purge();
    assert_eq!(frame.buffer_count(), 1);
}

#[test]
fn test_purge_releases_drained_buffers_and_shrinks_the_head() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    let big = stack.allocate(4096, 8, 0).expect("big");
    let next = stack.allocate(4096, 8, 0).expect("next");
    assert_eq!(stack.buffer_count(), 2);
    let start = stack.capacity();

    unsafe { stack.deallocate(next) };
    unsafe { stack.deallocate(big) };
    let released = stack.purge();

    assert_eq!(stack.buffer_count(), 1);
    assert!(stack.capacity() < 4096);
    assert_eq!(released, start - stack.capacity());
    assert_eq!(stack.statistics().buffers_released, 1);
}

#[test]
fn test_purge_keeps_buffers_in_use() {
    let mut stack = StackAllocator::with_config(small()).expect("stack");
    stack.allocate(200, 8, 0).expect("first");
    let second = stack.allocate(200, 8, 0).expect("second");
    unsafe { stack.deallocate(second) };

    stack.purge();
    assert_eq!(stack.buffer_count(), 1);
    assert!(stack.used_bytes() > 0);
}

#[test]
fn test_presets_build() {
    assert!(StackAllocator::production().is_ok());
    assert!(StackAllocator::debug().is_ok());
    assert!(StackAllocator::with_config(ChainConfig::default().with_start_size(0)).is_err());
}

//! Cross-thread access to an allocator
//!
//! The allocators are single-threaded: every operation takes `&mut self` and
//! no internal locking happens. [`Shared`] puts one behind a
//! `parking_lot::Mutex` so several threads can take turns with it.

use core::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

use crate::error::AllocResult;
use crate::traits::ChainAllocator;

/// Allocator behind a mutex
///
/// ```
/// use std::sync::Arc;
/// use strata_alloc::{LinearAllocator, sync::Shared};
///
/// let shared = Arc::new(Shared::new(LinearAllocator::new()?));
/// let worker = Arc::clone(&shared);
/// std::thread::spawn(move || {
///     worker.allocate(64, 8, 0).map(|_| ())
/// })
/// .join()
/// .unwrap()?;
/// assert_eq!(shared.with(|linear| linear.statistics().allocation_count), 1);
/// # use strata_alloc::StatisticsProvider;
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
#[derive(Debug, Default)]
pub struct Shared<A> {
    inner: Mutex<A>,
}

impl<A> Shared<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    /// Locks the allocator for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, A> {
        self.inner.lock()
    }

    /// Runs `f` with the allocator locked
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Direct access, no locking needed through `&mut self`
    pub fn get_mut(&mut self) -> &mut A {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

impl<A: ChainAllocator> Shared<A> {
    /// Locks, allocates and unlocks
    pub fn allocate(&self, size: usize, align: usize, offset: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().allocate(size, align, offset)
    }

    /// # Safety
    /// `ptr` must be a live allocation of the wrapped allocator.
    pub unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        size: usize,
        align: usize,
        offset: usize,
    ) -> AllocResult<NonNull<u8>> {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.lock().reallocate(ptr, size, align, offset) }
    }

    /// # Safety
    /// `ptr` must be a live allocation of the wrapped allocator.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.lock().deallocate(ptr) }
    }

    pub fn purge(&self) -> usize {
        self.inner.lock().purge()
    }
}

impl<A> From<A> for Shared<A> {
    fn from(allocator: A) -> Self {
        Self::new(allocator)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::allocator::{PoolAllocator, StackAllocator};
    use crate::config::PoolConfig;

    #[test]
    fn threads_take_turns_on_one_pool() {
        let config = PoolConfig::new(32, 8, 64).with_stats(true);
        let shared = Arc::new(Shared::new(
            PoolAllocator::with_config(config).expect("pool"),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let ptr = shared.allocate(32, 8, 0).expect("allocate");
                        unsafe { shared.deallocate(ptr) };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let pool = Arc::into_inner(shared).expect("sole owner").into_inner();
        assert_eq!(pool.free_slots(), pool.total_slots());
    }

    #[test]
    fn lock_spans_several_operations() {
        let shared = Shared::new(StackAllocator::new().expect("stack"));
        {
            let mut stack = shared.lock();
            let marker = stack.mark();
            stack.allocate(128, 8, 0).expect("allocate");
            unsafe { stack.restore_to_marker(marker) }.expect("restore");
        }
        assert_eq!(shared.with(|stack| stack.used_bytes()), 0);
    }
}

//! Allocator front-ends
//!
//! Each front-end owns a buffer chain, one magnifier and one provider, and
//! dispatches requests to the buffer algorithm of its family:
//! - `linear` - bump arena, individual frees are no-ops
//! - `stack` - bump with watermark rewind, markers and frames
//! - `ring` - circular window with head/tail collision detection
//! - `pool` - fixed slots on an offset-linked free list

/// Implements the introspection traits for a front-end with a `chain` field
macro_rules! impl_chain_introspection {
    ($allocator:ident) => {
        impl<M, P> $crate::traits::MemoryUsage for $allocator<M, P>
        where
            M: $crate::magnifier::Magnifier,
            P: $crate::provider::MemoryProvider,
        {
            fn used_memory(&self) -> usize {
                self.chain.used_bytes()
            }

            fn available_memory(&self) -> Option<usize> {
                Some(self.chain.capacity() - self.chain.used_bytes())
            }
        }

        impl<M, P> $crate::traits::StatisticsProvider for $allocator<M, P>
        where
            M: $crate::magnifier::Magnifier,
            P: $crate::provider::MemoryProvider,
        {
            fn statistics(&self) -> $crate::stats::AllocatorStats {
                self.chain.statistics()
            }

            fn reset_statistics(&mut self) {
                self.chain.reset_statistics();
            }

            fn statistics_enabled(&self) -> bool {
                self.chain.config().track_stats
            }
        }
    };
}

pub mod linear;
pub mod pool;
pub mod ring;
pub mod stack;

pub use linear::LinearAllocator;
pub use pool::PoolAllocator;
pub use ring::RingAllocator;
pub use stack::{StackAllocator, StackFrame, StackMarker};

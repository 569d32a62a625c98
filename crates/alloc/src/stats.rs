//! Allocator statistics tracking

/// Snapshot of an allocator's counters and chain state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently in use across the chain (headers and padding included)
    pub used_bytes: usize,
    /// Peak value of `used_bytes`
    pub peak_used_bytes: usize,
    /// Sum of all buffer capacities
    pub capacity_bytes: usize,
    /// Buffers currently in the chain
    pub buffer_count: usize,
    /// Total number of allocations
    pub allocation_count: usize,
    /// Total number of deallocations
    pub deallocation_count: usize,
    /// Total number of reallocations
    pub reallocation_count: usize,
    /// Buffers appended because the tail could not satisfy a request
    pub buffers_grown: usize,
    /// Buffers handed back to the provider by purge
    pub buffers_released: usize,
    /// Bytes handed back to the provider by purge
    pub bytes_reclaimed: usize,
}

impl AllocatorStats {
    /// Fraction of the chain capacity currently in use (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.capacity_bytes as f64
        }
    }

    /// Allocations not yet matched by a deallocation
    pub fn allocation_balance(&self) -> isize {
        self.allocation_count as isize - self.deallocation_count as isize
    }
}

impl core::fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Allocator Statistics:")?;
        writeln!(f, "  Used: {} bytes", self.used_bytes)?;
        writeln!(f, "  Peak used: {} bytes", self.peak_used_bytes)?;
        writeln!(
            f,
            "  Capacity: {} bytes in {} buffers",
            self.capacity_bytes, self.buffer_count
        )?;
        writeln!(f, "  Allocations: {}", self.allocation_count)?;
        writeln!(f, "  Deallocations: {}", self.deallocation_count)?;
        writeln!(f, "  Reallocations: {}", self.reallocation_count)?;
        writeln!(f, "  Buffers grown: {}", self.buffers_grown)?;
        write!(
            f,
            "  Reclaimed: {} bytes from {} buffers",
            self.bytes_reclaimed, self.buffers_released
        )
    }
}

/// Counters kept by a chain; plain integers because a chain has one owner
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub peak_used: usize,
    pub allocations: usize,
    pub deallocations: usize,
    pub reallocations: usize,
    pub buffers_grown: usize,
    pub buffers_released: usize,
    pub bytes_reclaimed: usize,
}

impl Counters {
    pub fn observe_used(&mut self, used: usize) {
        self.peak_used = self.peak_used.max(used);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

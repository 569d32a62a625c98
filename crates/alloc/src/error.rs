//! Error types for buffer-chain allocators
//!
//! Running out of room inside a single buffer is never an error: the owning
//! allocator grows its chain and retries. What reaches the caller is either a
//! provider failure or a request that could not be sized at all.

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::warn;

/// Result type for allocator operations
pub type AllocResult<T> = core::result::Result<T, AllocError>;

/// Allocator errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The memory provider could not supply a block
    #[error("Memory provider exhausted: {size} bytes with {align} byte alignment")]
    ProviderExhausted { size: usize, align: usize },

    #[error("Invalid alignment: {alignment}")]
    InvalidAlignment { alignment: usize },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: &'static str },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A freshly grown buffer still could not hold the request
    #[error("Buffer too small: requested {requested} bytes, capacity {capacity}")]
    BufferTooSmall { requested: usize, capacity: usize },

    /// A stack marker points past the current top or outside the chain
    #[error("Invalid stack marker: buffer {buffer}, offset {offset}")]
    InvalidMarker { buffer: usize, offset: usize },
}

impl AllocError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderExhausted { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderExhausted { .. } => "ALLOC:PROVIDER:EXHAUSTED",
            Self::InvalidAlignment { .. } => "ALLOC:ALIGN",
            Self::SizeOverflow { .. } => "ALLOC:OVERFLOW",
            Self::InvalidConfig { .. } => "ALLOC:CONFIG:INVALID",
            Self::BufferTooSmall { .. } => "ALLOC:BUFFER:TOO_SMALL",
            Self::InvalidMarker { .. } => "ALLOC:MARKER:INVALID",
        }
    }

    /// Create provider exhausted error
    pub fn provider_exhausted(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(size, align, "memory provider failed to supply a block");

        Self::ProviderExhausted { size, align }
    }

    /// Create invalid alignment error
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &'static str) -> Self {
        Self::SizeOverflow { operation }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn buffer_too_small(requested: usize, capacity: usize) -> Self {
        Self::BufferTooSmall {
            requested,
            capacity,
        }
    }

    pub fn invalid_marker(buffer: usize, offset: usize) -> Self {
        Self::InvalidMarker { buffer, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            AllocError::provider_exhausted(64, 8).code(),
            "ALLOC:PROVIDER:EXHAUSTED"
        );
        assert_eq!(AllocError::invalid_alignment(3).code(), "ALLOC:ALIGN");
        assert_eq!(AllocError::size_overflow("x").code(), "ALLOC:OVERFLOW");
    }

    #[test]
    fn only_provider_failures_are_retryable() {
        assert!(AllocError::provider_exhausted(1, 1).is_retryable());
        assert!(!AllocError::invalid_config("zero start size").is_retryable());
        assert!(!AllocError::buffer_too_small(10, 5).is_retryable());
    }

    #[test]
    fn display_mentions_sizes() {
        let err = AllocError::buffer_too_small(128, 64);
        assert_eq!(
            err.to_string(),
            "Buffer too small: requested 128 bytes, capacity 64"
        );
    }
}

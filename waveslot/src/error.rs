//! Allocator errors.

use thiserror::Error;

use crate::core::{BankId, SegmentId, Slot};

/// Result type for allocator operations.
pub type SlotResult<T> = Result<T, SlotError>;

/// Errors reported by trackers and by the controller.
///
/// A failing call never changes occupancy, with the exception of the partial effect of
/// [`crate::AllocationController::release_memory`] described by [`ReleaseError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum SlotError {
    /// Zero sized request.
    #[error("invalid size {size}, sizes must be greater than 0")]
    InvalidSize { size: usize },

    /// No contiguous free range large enough.
    ///
    /// `largest_capacity` is the largest request that could be placed with everything freed.
    #[error("out of capacity: no free range can hold {requested} units")]
    OutOfCapacity {
        requested: usize,
        largest_capacity: usize,
    },

    /// Segment was never issued by the bank.
    #[error("segment {segment} is unknown to bank {bank}")]
    UnknownSegment { bank: BankId, segment: SegmentId },

    /// Segment was issued by the bank but has already been freed.
    #[error("segment {segment} of bank {bank} has already been freed")]
    DoubleFree { bank: BankId, segment: SegmentId },

    /// Bank is not part of the layout.
    #[error("bank {bank} is not part of the memory layout")]
    UnknownBank { bank: BankId },

    /// Memory layout rejected at construction.
    #[error("invalid allocator configuration: {message}")]
    InvalidConfig { message: String },
}

impl SlotError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the same request may succeed once other segments are released.
    ///
    /// A request larger than every bank can ever hold is not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OutOfCapacity { requested, largest_capacity } if requested <= largest_capacity
        )
    }

    /// Returns true for both flavours of freeing something that is not live.
    pub fn is_unknown_segment(&self) -> bool {
        matches!(self, Self::UnknownSegment { .. } | Self::DoubleFree { .. })
    }

    pub fn is_double_free(&self) -> bool {
        matches!(self, Self::DoubleFree { .. })
    }
}

/// Partial outcome of a multi-slot release that stopped at its first failure.
///
/// Slots in `released` were freed and stay freed, `failed` was rejected with `source`, and
/// `unprocessed` were not looked at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("released {} slot(s) before failing on {failed}", .released.len())]
pub struct ReleaseError {
    pub released: Vec<Slot>,
    pub failed: Slot,
    #[source]
    pub source: SlotError,
    pub unprocessed: Vec<Slot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SegmentDescriptor;

    #[test]
    fn test_error_creation() {
        let err = SlotError::config("no banks");
        assert!(matches!(
            err,
            SlotError::InvalidConfig { ref message } if message == "no banks"
        ));
        assert_eq!(err.to_string(), "invalid allocator configuration: no banks");
    }

    #[test]
    fn test_is_retryable() {
        let occupied = SlotError::OutOfCapacity {
            requested: 10,
            largest_capacity: 100,
        };
        let oversized = SlotError::OutOfCapacity {
            requested: 101,
            largest_capacity: 100,
        };

        assert!(occupied.is_retryable());
        assert!(!oversized.is_retryable());
        assert!(!SlotError::InvalidSize { size: 0 }.is_retryable());
    }

    #[test]
    fn test_unknown_segment_kinds() {
        let unknown = SlotError::UnknownSegment {
            bank: BankId::new(0),
            segment: SegmentId::new(9),
        };
        let double = SlotError::DoubleFree {
            bank: BankId::new(0),
            segment: SegmentId::new(1),
        };

        assert!(unknown.is_unknown_segment());
        assert!(!unknown.is_double_free());
        assert!(double.is_unknown_segment());
        assert!(double.is_double_free());
        assert!(
            !SlotError::OutOfCapacity {
                requested: 1,
                largest_capacity: 1
            }
            .is_unknown_segment()
        );
    }

    #[test]
    fn test_release_error_source() {
        use std::error::Error as _;

        let failed = Slot::new(
            BankId::new(1),
            SegmentDescriptor {
                segment: SegmentId::new(2),
                offset: 0,
                size: 10,
            },
        );
        let err = ReleaseError {
            released: Vec::new(),
            failed,
            source: SlotError::DoubleFree {
                bank: BankId::new(1),
                segment: SegmentId::new(2),
            },
            unprocessed: Vec::new(),
        };

        assert_eq!(
            err.to_string(),
            "released 0 slot(s) before failing on bank 1 segment 2 [0..10)"
        );
        assert!(err.source().is_some());
    }
}

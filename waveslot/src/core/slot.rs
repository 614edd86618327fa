use super::{BankId, SegmentId};

/// Placement of a live segment inside its bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentDescriptor {
    pub segment: SegmentId,
    pub offset: usize,
    pub size: usize,
}

impl SegmentDescriptor {
    /// One past the last unit occupied by the segment.
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline(always)]
    pub const fn overlaps(&self, other: &SegmentDescriptor) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// What a tracker hands back for a freshly placed segment.
pub type SegmentHandle = SegmentDescriptor;

/// Upload slot: a segment together with the bank that holds it.
///
/// Only `bank` and `segment` identify the slot; `offset` and `size` are carried along so the
/// upload layer can compute the physical address without another lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slot {
    pub bank: BankId,
    pub segment: SegmentId,
    pub offset: usize,
    pub size: usize,
}

impl Slot {
    #[inline]
    pub const fn new(bank: BankId, descriptor: SegmentDescriptor) -> Self {
        Self {
            bank,
            segment: descriptor.segment,
            offset: descriptor.offset,
            size: descriptor.size,
        }
    }

    #[inline]
    pub const fn descriptor(&self) -> SegmentDescriptor {
        SegmentDescriptor {
            segment: self.segment,
            offset: self.offset,
            size: self.size,
        }
    }

    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bank {} segment {} [{}..{})",
            self.bank,
            self.segment,
            self.offset,
            self.end()
        )
    }
}

//! Module `core::ids`
//!
//! Identifiers of memory banks and of the segments allocated inside them.

/// Identifier of a memory bank, as reported by hardware discovery.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct BankId(u32);

impl BankId {
    #[inline(always)]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for BankId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<BankId> for u32 {
    #[inline]
    fn from(id: BankId) -> u32 {
        id.0
    }
}

impl std::fmt::Display for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BankId({})", self.0)
    }
}

/// Identifier of a segment, unique within the bank that issued it.
///
/// Trackers issue identifiers in increasing order starting at [`SegmentId::FIRST`] and
/// never hand the same value out twice, so an identifier below the next one to be issued
/// that is not live anymore is known to have been freed already.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct SegmentId(u32);

impl SegmentId {
    /// First identifier issued by every tracker
    pub const FIRST: SegmentId = SegmentId(1);

    #[inline(always)]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the identifier following this one, or `None` once `u32` is exhausted.
    #[inline(always)]
    pub const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl From<u32> for SegmentId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<SegmentId> for u32 {
    #[inline]
    fn from(id: SegmentId) -> u32 {
        id.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SegmentId({})", self.0)
    }
}

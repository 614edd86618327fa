//! Read-only occupancy snapshots.
//!
//! Snapshots are owned copies: they are assembled under the bank locks and then detached, so
//! later allocations and releases are not reflected in them.

use std::collections::BTreeMap;

#[cfg(feature = "memory_stats")]
use waveslot_memory::AllocatorStats;
use waveslot_memory::FreeRange;

use crate::core::{BankId, SegmentDescriptor};

/// Occupancy of a single bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankOccupancy {
    pub bank: BankId,
    pub capacity: usize,
    pub granularity: usize,
    pub free: usize,
    pub largest_free: usize,
    /// Live segments ordered by segment id.
    pub segments: Vec<SegmentDescriptor>,
    /// Free ranges ordered by offset.
    pub free_ranges: Vec<FreeRange>,
    #[cfg(feature = "memory_stats")]
    pub stats: AllocatorStats,
}

impl BankOccupancy {
    #[inline]
    pub fn used(&self) -> usize {
        self.capacity.saturating_sub(self.free)
    }

    pub fn memory_sizes(&self) -> Vec<usize> {
        self.segments.iter().map(|segment| segment.size).collect()
    }

    /// Checks that live segments and free ranges tile `[0, capacity)` exactly: no overlap, no
    /// gap, and the free counter matches the free ranges.
    pub fn is_consistent(&self) -> bool {
        let mut extents = self
            .segments
            .iter()
            .map(|segment| (segment.offset, segment.size))
            .chain(self.free_ranges.iter().map(|range| (range.offset, range.len)))
            .collect::<Vec<_>>();

        extents.sort_unstable();

        let mut cursor = 0;
        for (offset, size) in extents {
            if offset != cursor || size == 0 {
                return false;
            }
            cursor += size;
        }

        let free = self.free_ranges.iter().map(|range| range.len).sum::<usize>();
        let used = self.segments.iter().map(|segment| segment.size).sum::<usize>();

        cursor == self.capacity
            && self.free <= self.capacity
            && free == self.free
            && used == self.used()
    }
}

/// Occupancy of every bank, ordered by bank id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub banks: Vec<BankOccupancy>,
}

impl OccupancySnapshot {
    pub fn bank(&self, bank: BankId) -> Option<&BankOccupancy> {
        self.banks
            .binary_search_by_key(&bank, |occupancy| occupancy.bank)
            .ok()
            .map(|index| &self.banks[index])
    }

    pub fn total_capacity(&self) -> usize {
        self.banks.iter().map(|bank| bank.capacity).sum()
    }

    pub fn total_free(&self) -> usize {
        self.banks.iter().map(|bank| bank.free).sum()
    }

    pub fn live_segments(&self) -> usize {
        self.banks.iter().map(|bank| bank.segments.len()).sum()
    }

    pub fn memory_sizes(&self) -> BTreeMap<BankId, Vec<usize>> {
        self.banks
            .iter()
            .map(|bank| (bank.bank, bank.memory_sizes()))
            .collect()
    }

    pub fn seg_data(&self) -> BTreeMap<BankId, Vec<SegmentDescriptor>> {
        self.banks
            .iter()
            .map(|bank| (bank.bank, bank.segments.clone()))
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.banks.iter().all(BankOccupancy::is_consistent)
    }
}

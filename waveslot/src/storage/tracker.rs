use std::collections::BTreeMap;

use log::{debug, warn};
use rustc_hash::FxHashMap;

#[cfg(feature = "memory_stats")]
use waveslot_memory::AllocatorStats;
use waveslot_memory::FreeRangeList;

use crate::{
    config::BankConfig,
    core::{BankId, SegmentDescriptor, SegmentHandle, SegmentId},
    error::{SlotError, SlotResult},
    snapshot::BankOccupancy,
};

/// Occupancy bookkeeping of a single memory bank.
///
/// Placement is delegated to a [`FreeRangeList`] (first-fit, coalescing on release); the
/// tracker adds segment identifiers on top of it. Identifiers are issued in increasing order
/// and never reused, which lets [`BankOccupancyTracker::free_segment`] tell a double free
/// apart from an identifier that was never handed out.
///
/// The tracker itself is not synchronized. [`crate::AllocationController`] keeps every
/// tracker behind its own lock.
#[derive(Debug, Clone)]
pub struct BankOccupancyTracker {
    config: BankConfig,
    ranges: FreeRangeList,
    segments: FxHashMap<SegmentId, SegmentDescriptor>,
    next_segment: SegmentId,
}

impl BankOccupancyTracker {
    /// Creates a tracker for bank `bank` with `capacity` units, all free.
    ///
    /// # Panics
    /// - If `capacity` is 0.
    pub fn new(bank: BankId, capacity: usize) -> Self {
        Self::with_config(BankConfig::new(bank, capacity))
    }

    /// # Panics
    /// - If the capacity or the granularity is 0.
    pub fn with_config(config: BankConfig) -> Self {
        assert!(config.granularity > 0, "Granularity must be greater than 0");

        Self {
            config,
            ranges: FreeRangeList::new(config.capacity),
            segments: FxHashMap::default(),
            next_segment: SegmentId::FIRST,
        }
    }

    #[inline(always)]
    pub fn bank(&self) -> BankId {
        self.config.id
    }

    #[inline(always)]
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.ranges.capacity()
    }

    #[inline(always)]
    pub fn free_capacity(&self) -> usize {
        self.ranges.free()
    }

    #[inline(always)]
    pub fn used_capacity(&self) -> usize {
        self.ranges.used()
    }

    #[inline(always)]
    pub fn largest_free(&self) -> usize {
        self.ranges.largest_free()
    }

    #[inline(always)]
    pub fn fragments(&self) -> usize {
        self.ranges.fragments()
    }

    #[inline(always)]
    pub fn live_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline(always)]
    pub fn can_fit(&self, size: usize) -> bool {
        self.ranges.can_fit(size)
    }

    /// Largest number of points a single upload slot can hold right now.
    pub fn allocatable_points(&self) -> usize {
        let largest = self.largest_free();
        largest - largest % self.config.granularity
    }

    pub fn segment(&self, segment: SegmentId) -> Option<SegmentDescriptor> {
        self.segments.get(&segment).copied()
    }

    /// Places a segment of `size` units in the lowest free range that can hold it.
    ///
    /// Fails with [`SlotError::InvalidSize`] for `size == 0` and with
    /// [`SlotError::OutOfCapacity`] when no contiguous free range is large enough; the
    /// tracker is left untouched in both cases.
    ///
    /// # Panics
    /// - If the bank has issued `u32::MAX - 1` segment ids.
    pub fn request_new_segment(&mut self, size: usize) -> SlotResult<SegmentHandle> {
        if size == 0 {
            return Err(SlotError::InvalidSize { size });
        }

        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("BankOccupancyTracker::request_new_segment");

        let Some(next_segment) = self.next_segment.next() else {
            panic!("Segment ids exhausted on bank {}", self.bank());
        };

        let Some(offset) = self.ranges.allocate(size) else {
            warn!(
                "bank {}: no free range for {} units (free: {}, largest: {}, fragments: {})",
                self.bank(),
                size,
                self.free_capacity(),
                self.largest_free(),
                self.fragments()
            );
            return Err(SlotError::OutOfCapacity {
                requested: size,
                largest_capacity: self.capacity(),
            });
        };

        let handle = SegmentHandle {
            segment: self.next_segment,
            offset,
            size,
        };

        self.next_segment = next_segment;
        self.segments.insert(handle.segment, handle);

        debug!(
            "bank {}: segment {} placed at [{}..{})",
            self.bank(),
            handle.segment,
            handle.offset,
            handle.end()
        );

        Ok(handle)
    }

    /// Releases `segment` and merges its range back into the free list.
    ///
    /// Fails with [`SlotError::DoubleFree`] if the segment was freed before and with
    /// [`SlotError::UnknownSegment`] if this bank never issued it.
    pub fn free_segment(&mut self, segment: SegmentId) -> SlotResult<SegmentDescriptor> {
        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("BankOccupancyTracker::free_segment");

        let Some(descriptor) = self.segments.remove(&segment) else {
            let bank = self.bank();
            let err = if segment >= SegmentId::FIRST && segment < self.next_segment {
                SlotError::DoubleFree { bank, segment }
            } else {
                SlotError::UnknownSegment { bank, segment }
            };

            warn!("rejected free: {err}");

            return Err(err);
        };

        self.ranges.release(descriptor.offset, descriptor.size);

        debug!(
            "bank {}: segment {} released [{}..{})",
            self.bank(),
            segment,
            descriptor.offset,
            descriptor.end()
        );

        Ok(descriptor)
    }

    /// Sizes of the live segments, ordered by segment id.
    pub fn get_memory_sizes(&self) -> Vec<usize> {
        self.sorted_segments()
            .into_iter()
            .map(|segment| segment.size)
            .collect()
    }

    /// The segment table of this bank, keyed by its bank id and ordered by segment id.
    pub fn get_seg_data(&self) -> BTreeMap<BankId, Vec<SegmentDescriptor>> {
        BTreeMap::from([(self.bank(), self.sorted_segments())])
    }

    pub fn occupancy(&self) -> BankOccupancy {
        BankOccupancy {
            bank: self.bank(),
            capacity: self.capacity(),
            granularity: self.config.granularity,
            free: self.free_capacity(),
            largest_free: self.largest_free(),
            segments: self.sorted_segments(),
            free_ranges: self.ranges.ranges().copied().collect(),
            #[cfg(feature = "memory_stats")]
            stats: self.ranges.stats(),
        }
    }

    /// Frees every live segment. Segment ids keep counting from where they were.
    pub fn clear(&mut self) -> usize {
        let released = self.segments.len();

        self.segments.clear();
        self.ranges.reset();

        released
    }

    #[cfg(feature = "memory_stats")]
    pub fn stats(&self) -> AllocatorStats {
        self.ranges.stats()
    }

    fn sorted_segments(&self) -> Vec<SegmentDescriptor> {
        let mut segments = self.segments.values().copied().collect::<Vec<_>>();
        segments.sort_unstable_by_key(|segment| segment.segment);
        segments
    }
}

#[cfg(feature = "memory_stats")]
use super::AllocatorStats;

/// A free `[offset, offset + len)` range of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreeRange {
    pub offset: usize,
    pub len: usize,
}

impl FreeRange {
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Ordered list of the free ranges of a linear address space of fixed capacity.
///
/// Ranges are kept sorted by offset and never touch each other: a release that lands next
/// to an existing free range is merged into it, so after every live range is released the
/// list holds a single range covering the whole capacity again.
///
/// Placement is first-fit: [`FreeRangeList::allocate`] carves from the front of the lowest
/// free range that is large enough, which makes holes left by earlier releases get reused
/// before the untouched tail of the address space.
#[derive(Debug, Clone)]
pub struct FreeRangeList {
    ranges: Vec<FreeRange>,
    capacity: usize,
    free: usize,
    #[cfg(feature = "memory_stats")]
    stats: AllocatorStats,
}

impl FreeRangeList {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        #[cfg(feature = "memory_stats")]
        let stats = AllocatorStats {
            memory_budget: capacity,
            ..Default::default()
        };

        Self {
            ranges: vec![FreeRange {
                offset: 0,
                len: capacity,
            }],
            capacity,
            free: capacity,
            #[cfg(feature = "memory_stats")]
            stats,
        }
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub const fn free(&self) -> usize {
        self.free
    }

    #[inline(always)]
    pub const fn used(&self) -> usize {
        self.capacity - self.free
    }

    /// Number of disjoint free ranges.
    #[inline(always)]
    pub fn fragments(&self) -> usize {
        self.ranges.len()
    }

    pub fn largest_free(&self) -> usize {
        self.ranges.iter().map(|range| range.len).max().unwrap_or(0)
    }

    #[inline(always)]
    pub fn can_fit(&self, size: usize) -> bool {
        size > 0 && self.ranges.iter().any(|range| range.len >= size)
    }

    pub fn ranges(&self) -> impl ExactSizeIterator<Item = &FreeRange> + '_ {
        self.ranges.iter()
    }

    /// Carves `size` units out of the first free range that can hold them and returns the
    /// offset, or `None` if no single range is large enough. The list is untouched on `None`.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        assert!(size > 0, "Allocation size must be greater than 0");

        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("FreeRangeList::allocate");

        let Some(position) = self.ranges.iter().position(|range| range.len >= size) else {
            #[cfg(feature = "memory_stats")]
            {
                self.stats.failed_allocations += 1;
            }

            return None;
        };

        let range = &mut self.ranges[position];
        let offset = range.offset;

        if range.len == size {
            self.ranges.remove(position);
        } else {
            range.offset += size;
            range.len -= size;
        }

        self.free -= size;

        #[cfg(feature = "memory_stats")]
        {
            self.stats.live_ranges += 1;
            self.stats.total_allocations += 1;
            self.stats.used_units = self.capacity - self.free;
            self.stats.peak_used_units = self.stats.peak_used_units.max(self.stats.used_units);
        }

        debug_assert!(
            offset + size <= self.capacity,
            "Range out of bounds offset: {} size: {} capacity: {}",
            offset,
            size,
            self.capacity
        );

        Some(offset)
    }

    /// Returns `[offset, offset + size)` to the free list, merging it with adjacent free
    /// ranges.
    ///
    /// # Panics
    /// - If the range reaches past the capacity.
    /// - If the range overlaps a range that is already free.
    pub fn release(&mut self, offset: usize, size: usize) {
        assert!(size > 0, "Release size must be greater than 0");
        assert!(
            offset
                .checked_add(size)
                .is_some_and(|end| end <= self.capacity),
            "Range out of bounds"
        );

        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("FreeRangeList::release");

        let end = offset + size;
        let index = self.ranges.partition_point(|range| range.offset < offset);

        let left = index.checked_sub(1).map(|left| self.ranges[left]);
        let right = self.ranges.get(index).copied();

        if left.is_some_and(|left| left.end() > offset)
            || right.is_some_and(|right| right.offset < end)
        {
            panic!("Double free detected");
        }

        let merge_left = left.is_some_and(|left| left.end() == offset);
        let merge_right = right.is_some_and(|right| right.offset == end);

        match (merge_left, merge_right) {
            (true, true) => {
                let right = self.ranges.remove(index);
                self.ranges[index - 1].len += size + right.len;
            }
            (true, false) => {
                self.ranges[index - 1].len += size;
            }
            (false, true) => {
                let right = &mut self.ranges[index];
                right.offset = offset;
                right.len += size;
            }
            (false, false) => {
                self.ranges.insert(index, FreeRange { offset, len: size });
            }
        }

        self.free += size;

        #[cfg(feature = "memory_stats")]
        {
            self.stats.live_ranges -= 1;
            self.stats.total_releases += 1;
            self.stats.used_units = self.capacity - self.free;
        }
    }

    /// Forgets every allocation, leaving a single free range over the whole capacity.
    pub fn reset(&mut self) {
        self.ranges.clear();
        self.ranges.push(FreeRange {
            offset: 0,
            len: self.capacity,
        });
        self.free = self.capacity;

        #[cfg(feature = "memory_stats")]
        {
            self.stats.total_releases += self.stats.live_ranges;
            self.stats.live_ranges = 0;
            self.stats.used_units = 0;
        }
    }

    #[cfg(feature = "memory_stats")]
    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }
}

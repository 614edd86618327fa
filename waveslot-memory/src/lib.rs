#[cfg(feature = "memory_stats")]
mod allocator_stats;
mod free_range_list;

#[cfg(feature = "memory_stats")]
pub use allocator_stats::AllocatorStats;
pub use free_range_list::{FreeRange, FreeRangeList};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    pub live_ranges: usize,
    pub total_allocations: usize,
    pub total_releases: usize,
    pub failed_allocations: usize,
    pub used_units: usize,
    pub peak_used_units: usize,
    pub memory_budget: usize,
}

//! Memory layout handed to the allocator at construction.
//!
//! The layout usually comes from hardware discovery: one [`BankConfig`] per memory bank with
//! the bank's total capacity and the granularity its waveforms must be padded to. It is
//! validated once by [`AllocatorConfig::validate`] and never changes afterwards.

use rustc_hash::FxHashSet;

use crate::{
    core::BankId,
    error::{SlotError, SlotResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BankConfig {
    pub id: BankId,
    /// Total capacity in allocation units.
    pub capacity: usize,
    /// Slot sizes on this bank are rounded up to a multiple of this.
    #[cfg_attr(feature = "serde", serde(default = "BankConfig::default_granularity"))]
    pub granularity: usize,
}

impl BankConfig {
    pub const DEFAULT_GRANULARITY: usize = 1;

    pub const fn new(id: BankId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            granularity: Self::DEFAULT_GRANULARITY,
        }
    }

    pub const fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    #[cfg(feature = "serde")]
    const fn default_granularity() -> usize {
        Self::DEFAULT_GRANULARITY
    }

    /// Rounds `n_points` up to the bank granularity, `None` on overflow.
    #[inline]
    pub const fn slot_size(&self, n_points: usize) -> Option<usize> {
        let remainder = n_points % self.granularity;
        if remainder == 0 {
            Some(n_points)
        } else {
            n_points.checked_add(self.granularity - remainder)
        }
    }

    /// Largest request a single slot on this bank can ever hold.
    #[inline]
    pub const fn max_points(&self) -> usize {
        self.capacity - self.capacity % self.granularity
    }

    fn validate(&self) -> SlotResult<()> {
        if self.capacity == 0 {
            return Err(SlotError::config(format!("bank {} has zero capacity", self.id)));
        }

        if self.granularity == 0 {
            return Err(SlotError::config(format!("bank {} has zero granularity", self.id)));
        }

        if self.granularity > self.capacity {
            return Err(SlotError::config(format!(
                "bank {} granularity {} exceeds its capacity {}",
                self.id, self.granularity, self.capacity
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocatorConfig {
    pub banks: Vec<BankConfig>,
}

impl AllocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout with the default granularity on every bank.
    pub fn from_layout<I, B>(layout: I) -> Self
    where
        I: IntoIterator<Item = (B, usize)>,
        B: Into<BankId>,
    {
        Self {
            banks: layout
                .into_iter()
                .map(|(id, capacity)| BankConfig::new(id.into(), capacity))
                .collect(),
        }
    }

    pub fn with_bank(self, id: impl Into<BankId>, capacity: usize) -> Self {
        self.with_bank_config(BankConfig::new(id.into(), capacity))
    }

    pub fn with_bank_config(mut self, bank: BankConfig) -> Self {
        self.banks.push(bank);
        self
    }

    /// Applies `granularity` to every bank declared so far.
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.banks
            .iter_mut()
            .for_each(|bank| bank.granularity = granularity);
        self
    }

    pub fn validate(&self) -> SlotResult<()> {
        if self.banks.is_empty() {
            return Err(SlotError::config("memory layout declares no banks"));
        }

        let mut seen = FxHashSet::default();

        for bank in &self.banks {
            if !seen.insert(bank.id) {
                return Err(SlotError::config(format!(
                    "bank {} is declared more than once",
                    bank.id
                )));
            }

            bank.validate()?;
        }

        Ok(())
    }

    pub fn total_capacity(&self) -> usize {
        self.banks.iter().map(|bank| bank.capacity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_layout() {
        let config = AllocatorConfig::from_layout([(0u32, 500), (1u32, 700)]);

        assert_eq!(config.banks.len(), 2);
        assert_eq!(config.banks[1].id, BankId::new(1));
        assert_eq!(config.banks[1].capacity, 700);
        assert_eq!(config.banks[1].granularity, 1);
        assert_eq!(config.total_capacity(), 1200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = AllocatorConfig::new()
            .with_bank(0u32, 1000)
            .with_bank(1u32, 1000)
            .with_granularity(10)
            .with_bank_config(BankConfig::new(BankId::new(2), 64).with_granularity(16));

        assert!(config.validate().is_ok());
        assert_eq!(config.banks[0].granularity, 10);
        assert_eq!(config.banks[2].granularity, 16);
    }

    #[test]
    fn test_slot_size_rounding() {
        let bank = BankConfig::new(BankId::new(0), 1000).with_granularity(10);

        assert_eq!(bank.slot_size(25), Some(30));
        assert_eq!(bank.slot_size(30), Some(30));
        assert_eq!(bank.slot_size(1), Some(10));
        assert_eq!(bank.slot_size(usize::MAX), None);

        let unit = BankConfig::new(BankId::new(0), 1000);
        assert_eq!(unit.slot_size(7), Some(7));
    }

    #[test]
    fn test_max_points() {
        assert_eq!(BankConfig::new(BankId::new(0), 1000).max_points(), 1000);

        let bank = BankConfig::new(BankId::new(0), 1005).with_granularity(10);
        assert_eq!(bank.max_points(), 1000);
        assert_eq!(bank.slot_size(bank.max_points() + 1), Some(1010));
    }

    #[test]
    fn test_validate_empty() {
        let err = AllocatorConfig::new().validate().unwrap_err();
        assert!(matches!(err, SlotError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_duplicate_bank() {
        let err = AllocatorConfig::from_layout([(0u32, 10), (0u32, 20)])
            .validate()
            .unwrap_err();
        assert_eq!(err, SlotError::config("bank 0 is declared more than once"));
    }

    #[test]
    fn test_validate_zero_capacity_and_granularity() {
        assert!(
            AllocatorConfig::from_layout([(0u32, 0)])
                .validate()
                .is_err()
        );
        assert!(
            AllocatorConfig::from_layout([(0u32, 10)])
                .with_granularity(0)
                .validate()
                .is_err()
        );
        assert!(
            AllocatorConfig::from_layout([(0u32, 10)])
                .with_granularity(11)
                .validate()
                .is_err()
        );
    }
}

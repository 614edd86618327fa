//! Module `controller`
//!
//! Defines the [`AllocationController`], the allocate/free surface spanning every memory bank
//! of the AWG modules.
//!
//! # Locking
//!
//! Each bank's [`BankOccupancyTracker`] sits behind its own [`Mutex`]. Allocations and
//! releases lock exactly one bank at a time, so requests on different banks run in parallel
//! while requests on the same bank are serialized. Snapshots lock every bank in ascending
//! bank id order and hold all the locks until the snapshot is assembled; since no other path
//! ever holds two bank locks, the ordering cannot deadlock.
//!
//! # Examples
//!
//! ```rust
//! use waveslot::{AllocationController, SlotError};
//!
//! let controller = AllocationController::from_layout([(0u32, 500), (1u32, 500)]).unwrap();
//!
//! // No bank holds 600 units and slots are never split across banks
//! assert_eq!(
//!     controller.get_upload_slot(600),
//!     Err(SlotError::OutOfCapacity {
//!         requested: 600,
//!         largest_capacity: 500,
//!     })
//! );
//! ```

use std::collections::BTreeMap;

use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

#[cfg(feature = "memory_stats")]
use waveslot_memory::AllocatorStats;

use crate::{
    config::{AllocatorConfig, BankConfig},
    core::{BankId, SegmentDescriptor, Slot},
    error::{ReleaseError, SlotError, SlotResult},
    snapshot::OccupancySnapshot,
    storage::BankOccupancyTracker,
};

struct Bank {
    config: BankConfig,
    tracker: Mutex<BankOccupancyTracker>,
}

/// Owns every bank of the memory layout and hands out upload slots across them.
///
/// The controller is `Send + Sync`; share it with an `Arc` between the producers requesting
/// slots and the consumers releasing them.
pub struct AllocationController {
    /// Ordered by bank id.
    banks: Vec<Bank>,
    index: FxHashMap<BankId, usize>,
}

impl AllocationController {
    /// Builds one tracker per bank of `config`, all fully free.
    pub fn new(config: AllocatorConfig) -> SlotResult<Self> {
        config.validate()?;

        let mut configs = config.banks;
        configs.sort_unstable_by_key(|bank| bank.id);

        let banks = configs
            .into_iter()
            .map(|config| Bank {
                config,
                tracker: Mutex::new(BankOccupancyTracker::with_config(config)),
            })
            .collect::<Vec<_>>();

        let index = banks
            .iter()
            .enumerate()
            .map(|(position, bank)| (bank.config.id, position))
            .collect();

        info!(
            "memory layout: {} bank(s), {} units total",
            banks.len(),
            banks.iter().map(|bank| bank.config.capacity).sum::<usize>()
        );

        Ok(Self { banks, index })
    }

    /// Shorthand for a layout of `(bank id, capacity)` pairs with unit granularity.
    ///
    /// ```rust
    /// use waveslot::AllocationController;
    ///
    /// let controller = AllocationController::from_layout([(0u32, 1000), (1u32, 2000)]).unwrap();
    /// assert_eq!(controller.free_capacity(), 3000);
    /// ```
    pub fn from_layout<I, B>(layout: I) -> SlotResult<Self>
    where
        I: IntoIterator<Item = (B, usize)>,
        B: Into<BankId>,
    {
        Self::new(AllocatorConfig::from_layout(layout))
    }

    pub fn bank_ids(&self) -> impl ExactSizeIterator<Item = BankId> + '_ {
        self.banks.iter().map(|bank| bank.config.id)
    }

    pub fn bank_config(&self, bank: BankId) -> Option<BankConfig> {
        self.bank(bank).ok().map(|bank| bank.config)
    }

    pub fn bank_capacity(&self, bank: BankId) -> Option<usize> {
        self.bank_config(bank).map(|config| config.capacity)
    }

    /// Allocates a slot able to hold `n_points` points.
    ///
    /// The request is rounded up to each bank's granularity. Banks whose largest free range
    /// fits the rounded size are tried in order of most free space left after the placement,
    /// lowest bank id first on ties. A slot never spans more than one bank.
    ///
    /// Fails with [`SlotError::InvalidSize`] for `n_points == 0` and with
    /// [`SlotError::OutOfCapacity`] when no bank can place the request. The error is only
    /// retryable if some bank could hold the request once enough segments are released.
    pub fn get_upload_slot(&self, n_points: usize) -> SlotResult<Slot> {
        if n_points == 0 {
            return Err(SlotError::InvalidSize { size: n_points });
        }

        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("AllocationController::get_upload_slot");

        let mut candidates = self
            .banks
            .iter()
            .enumerate()
            .filter_map(|(position, bank)| {
                let size = bank.config.slot_size(n_points)?;
                let tracker = bank.tracker.lock();

                tracker
                    .can_fit(size)
                    .then(|| (position, size, tracker.free_capacity() - size))
            })
            .collect::<Vec<_>>();

        // Most free space left first, then lowest bank id
        candidates.sort_unstable_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

        for (position, size, _) in candidates {
            let bank = &self.banks[position];

            // The bank may have filled up since it was ranked
            match bank.tracker.lock().request_new_segment(size) {
                Ok(handle) => {
                    let slot = Slot::new(bank.config.id, handle);
                    debug!("upload slot for {n_points} points: {slot}");
                    return Ok(slot);
                }
                Err(SlotError::OutOfCapacity { .. }) => continue,
                Err(err) => return Err(err),
            }
        }

        let largest_capacity = self.largest_slot();

        warn!(
            "no bank can hold an upload slot of {n_points} points (largest possible: \
             {largest_capacity})"
        );

        Err(SlotError::OutOfCapacity {
            requested: n_points,
            largest_capacity,
        })
    }

    /// Releases a single slot and returns the segment it occupied.
    pub fn release_slot(&self, slot: &Slot) -> SlotResult<SegmentDescriptor> {
        self.bank(slot.bank)?
            .tracker
            .lock()
            .free_segment(slot.segment)
    }

    /// Releases `slots` in order and returns how many were released.
    ///
    /// Stops at the first slot that cannot be released. Slots released before it stay
    /// released; the returned [`ReleaseError`] lists them together with the failing slot and
    /// the slots that were not processed.
    pub fn release_memory(&self, slots: &[Slot]) -> Result<usize, ReleaseError> {
        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("AllocationController::release_memory");

        for (position, slot) in slots.iter().enumerate() {
            if let Err(source) = self.release_slot(slot) {
                warn!(
                    "release stopped after {position} of {} slot(s): {source}",
                    slots.len()
                );

                return Err(ReleaseError {
                    released: slots[..position].to_vec(),
                    failed: *slot,
                    source,
                    unprocessed: slots[position + 1..].to_vec(),
                });
            }
        }

        Ok(slots.len())
    }

    /// Consistent, detached snapshot of the occupancy of every bank.
    pub fn get_segment_occupation(&self) -> OccupancySnapshot {
        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!("AllocationController::get_segment_occupation");

        let trackers = self.lock_all();

        OccupancySnapshot {
            banks: trackers.iter().map(|tracker| tracker.occupancy()).collect(),
        }
    }

    /// Sizes of the live segments of every bank, ordered by segment id.
    pub fn get_memory_sizes(&self) -> BTreeMap<BankId, Vec<usize>> {
        self.lock_all()
            .iter()
            .map(|tracker| (tracker.bank(), tracker.get_memory_sizes()))
            .collect()
    }

    /// Segment tables of every bank.
    pub fn get_seg_data(&self) -> BTreeMap<BankId, Vec<SegmentDescriptor>> {
        self.lock_all()
            .iter()
            .flat_map(|tracker| tracker.get_seg_data())
            .collect()
    }

    /// Current placement of `slot`, or `None` if it is not live.
    pub fn locate(&self, slot: &Slot) -> Option<SegmentDescriptor> {
        self.bank(slot.bank).ok()?.tracker.lock().segment(slot.segment)
    }

    /// Largest number of points a single slot can hold right now.
    ///
    /// Computed under every bank lock, like the snapshots.
    pub fn allocatable_memory(&self) -> usize {
        self.lock_all()
            .iter()
            .map(|tracker| tracker.allocatable_points())
            .max()
            .unwrap_or(0)
    }

    /// Free units summed over all banks, computed under every bank lock.
    pub fn free_capacity(&self) -> usize {
        self.lock_all()
            .iter()
            .map(|tracker| tracker.free_capacity())
            .sum()
    }

    /// Largest number of points a single slot can hold with every bank empty.
    pub fn largest_slot(&self) -> usize {
        self.banks
            .iter()
            .map(|bank| bank.config.max_points())
            .max()
            .unwrap_or(0)
    }

    /// Frees every segment of every bank and returns how many were freed.
    ///
    /// Slots handed out before the call become stale: releasing them afterwards fails with
    /// [`SlotError::DoubleFree`].
    pub fn clear_memory(&self) -> usize {
        let released = self
            .lock_all()
            .iter_mut()
            .map(|tracker| tracker.clear())
            .sum();

        info!("memory cleared, {released} segment(s) released");

        released
    }

    #[cfg(feature = "memory_stats")]
    pub fn stats(&self) -> BTreeMap<BankId, AllocatorStats> {
        self.lock_all()
            .iter()
            .map(|tracker| (tracker.bank(), tracker.stats()))
            .collect()
    }

    fn bank(&self, bank: BankId) -> SlotResult<&Bank> {
        self.index
            .get(&bank)
            .map(|&position| &self.banks[position])
            .ok_or(SlotError::UnknownBank { bank })
    }

    fn lock_all(&self) -> Vec<MutexGuard<'_, BankOccupancyTracker>> {
        self.banks.iter().map(|bank| bank.tracker.lock()).collect()
    }
}

impl std::fmt::Debug for AllocationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let banks = self
            .banks
            .iter()
            .map(|bank| bank.config)
            .collect::<Vec<_>>();

        f.debug_struct("AllocationController")
            .field("banks", &banks)
            .finish()
    }
}

//! Upload slot allocation for the waveform memory banks of AWG modules.
//!
//! An [`AllocationController`] owns one [`BankOccupancyTracker`] per memory bank and hands
//! out [`Slot`]s: contiguous regions of a single bank where the upload layer writes a
//! waveform. Slots are returned with [`AllocationController::release_memory`] once the
//! waveform is no longer needed.
//!
//! ```rust
//! use waveslot::{AllocationController, BankId, SegmentId};
//!
//! let controller = AllocationController::from_layout([(0u32, 1000)]).unwrap();
//!
//! let slot = controller.get_upload_slot(300).unwrap();
//! assert_eq!(slot.bank, BankId::new(0));
//! assert_eq!(slot.segment, SegmentId::new(1));
//! assert_eq!(slot.offset, 0);
//!
//! controller.release_memory(&[slot]).unwrap();
//! assert_eq!(controller.free_capacity(), 1000);
//! ```

pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod snapshot;
pub mod storage;

pub use config::{AllocatorConfig, BankConfig};
pub use controller::AllocationController;
pub use crate::core::{BankId, SegmentDescriptor, SegmentHandle, SegmentId, Slot};
pub use error::{ReleaseError, SlotError, SlotResult};
pub use snapshot::{BankOccupancy, OccupancySnapshot};
pub use storage::BankOccupancyTracker;

mod ids;
mod slot;

pub use ids::{BankId, SegmentId};
pub use slot::{SegmentDescriptor, SegmentHandle, Slot};

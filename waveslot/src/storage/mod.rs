mod tracker;

pub use tracker::BankOccupancyTracker;

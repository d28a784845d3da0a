//! Data models for RentalCar

mod alert;
mod payload;
mod topic;

pub use alert::*;
pub use payload::*;
pub use topic::*;

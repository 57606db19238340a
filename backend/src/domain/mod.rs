//! Settlement domain and the bucket accumulator built on it

pub mod bucket_map;
pub mod settlement;

pub use bucket_map::TimeBucketMap;
pub use settlement::{BucketIndex, DomainError, SettlementDomain};

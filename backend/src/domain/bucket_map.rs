//! Fixed-domain bucket accumulator
//!
//! `TimeBucketMap` maps every settlement-period label of a domain to an
//! `i64` running total. Storage is a dense vector indexed by
//! [`BucketIndex`]; the key set is fixed at construction and only values
//! ever change.

use super::settlement::{BucketIndex, SettlementDomain};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::Index;
use std::sync::Arc;

/// Per-bucket running totals over a fixed settlement domain
///
/// # Example
/// ```
/// use netting_simulator_core::{SettlementDomain, TimeBucketMap};
/// use std::sync::Arc;
///
/// let domain = Arc::new(SettlementDomain::default());
/// let mut map = TimeBucketMap::new(domain.clone());
/// let bucket = domain.index_of_label("15:00").unwrap();
///
/// assert_eq!(map.checked_add(bucket, 250), Some(250));
/// assert_eq!(map.checked_add(bucket, i64::MAX), None);
/// assert_eq!(map.get_label("15:00"), Some(250));
/// assert_eq!(map.total(), 250);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucketMap {
    domain: Arc<SettlementDomain>,
    values: Vec<i64>,
}

impl TimeBucketMap {
    /// Every label present, initialised to zero
    pub fn new(domain: Arc<SettlementDomain>) -> Self {
        let values = vec![0; domain.len()];
        Self { domain, values }
    }

    pub fn domain(&self) -> &SettlementDomain {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: BucketIndex) -> i64 {
        self.values[idx.0]
    }

    pub fn get_label(&self, label: &str) -> Option<i64> {
        self.domain.index_of_label(label).map(|idx| self.get(idx))
    }

    /// Add `delta` to bucket `idx`, returning the new value
    ///
    /// Returns `None` and leaves the bucket unchanged when the sum would
    /// leave the `i64` range.
    pub fn checked_add(&mut self, idx: BucketIndex, delta: i64) -> Option<i64> {
        let value = self.values[idx.0].checked_add(delta)?;
        self.values[idx.0] = value;
        Some(value)
    }

    pub fn set(&mut self, idx: BucketIndex, value: i64) {
        self.values[idx.0] = value;
    }

    /// Zero every bucket, keeping the domain
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0);
    }

    /// Values in domain order
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Sum over all buckets, saturating at the `i64` bounds
    pub fn total(&self) -> i64 {
        self.values.iter().fold(0, |acc, v| acc.saturating_add(*v))
    }

    pub fn labels(&self) -> Vec<String> {
        self.domain.labels()
    }

    /// `(label, value)` pairs in ascending label order
    pub fn iter(&self) -> impl Iterator<Item = (String, i64)> + '_ {
        self.domain
            .indices()
            .map(move |idx| (self.domain.label(idx), self.values[idx.0]))
    }

    /// True when every bucket is zero
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }
}

impl Index<BucketIndex> for TimeBucketMap {
    type Output = i64;

    fn index(&self, idx: BucketIndex) -> &i64 {
        &self.values[idx.0]
    }
}

impl Serialize for TimeBucketMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (label, value) in self.iter() {
            map.serialize_entry(&label, &value)?;
        }
        map.end()
    }
}

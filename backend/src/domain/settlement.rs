//! Settlement domain: the fixed, ordered set of hour-of-day buckets
//!
//! A trading session is split into `H` consecutive buckets of
//! `bucket_width_hours` each. Buckets are addressed by ordinal
//! ([`BucketIndex`]); labels are zero-padded "HH:00" strings so that
//! lexicographic label order coincides with chronological order.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when an hour or configuration does not fit the domain
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid settlement domain: {0}")]
    InvalidDomain(String),

    #[error("Hour {hour} is outside the settlement domain [{start}, {end})")]
    HourOutsideDomain { hour: u32, start: u32, end: u32 },
}

/// Ordinal position of a bucket within its domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketIndex(pub usize);

impl BucketIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawDomain {
    start_hour: u32,
    end_hour: u32,
    bucket_width_hours: u32,
    report_utc_offset_hours: i32,
}

impl Default for RawDomain {
    fn default() -> Self {
        let d = SettlementDomain::default();
        Self {
            start_hour: d.start_hour,
            end_hour: d.end_hour,
            bucket_width_hours: d.bucket_width_hours,
            report_utc_offset_hours: d.report_utc_offset_hours,
        }
    }
}

impl TryFrom<RawDomain> for SettlementDomain {
    type Error = DomainError;

    fn try_from(raw: RawDomain) -> Result<Self, Self::Error> {
        SettlementDomain::new(raw.start_hour, raw.end_hour, raw.bucket_width_hours)
            .map(|d| d.with_report_offset(raw.report_utc_offset_hours))
    }
}

/// Descriptor of the settlement-period domain
///
/// `start_hour` is inclusive, `end_hour` exclusive, both UTC hours of day.
/// Only a validated domain can be constructed, so every accessor can rely
/// on `len() > 0`.
///
/// # Example
/// ```
/// use netting_simulator_core::SettlementDomain;
///
/// let domain = SettlementDomain::new(14, 22, 1).unwrap();
/// assert_eq!(domain.len(), 8);
/// assert_eq!(domain.labels().first().map(String::as_str), Some("14:00"));
/// assert_eq!(domain.labels().last().map(String::as_str), Some("21:00"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDomain")]
pub struct SettlementDomain {
    start_hour: u32,
    end_hour: u32,
    bucket_width_hours: u32,
    /// Shift applied to display hours only (UTC → exchange local time)
    report_utc_offset_hours: i32,
}

impl Default for SettlementDomain {
    /// US equity session in UTC (14:00–21:00 buckets), reported in ET
    fn default() -> Self {
        Self {
            start_hour: 14,
            end_hour: 22,
            bucket_width_hours: 1,
            report_utc_offset_hours: -5,
        }
    }
}

impl SettlementDomain {
    /// Create a validated domain
    pub fn new(
        start_hour: u32,
        end_hour: u32,
        bucket_width_hours: u32,
    ) -> Result<Self, DomainError> {
        if bucket_width_hours == 0 {
            return Err(DomainError::InvalidDomain(
                "bucket_width_hours must be > 0".to_string(),
            ));
        }
        if end_hour > 24 {
            return Err(DomainError::InvalidDomain(format!(
                "end_hour {} exceeds 24",
                end_hour
            )));
        }
        if start_hour >= end_hour {
            return Err(DomainError::InvalidDomain(format!(
                "start_hour {} must be before end_hour {}",
                start_hour, end_hour
            )));
        }
        if (end_hour - start_hour) % bucket_width_hours != 0 {
            return Err(DomainError::InvalidDomain(format!(
                "session length {}h is not a multiple of bucket width {}h",
                end_hour - start_hour,
                bucket_width_hours
            )));
        }

        Ok(Self {
            start_hour,
            end_hour,
            bucket_width_hours,
            report_utc_offset_hours: 0,
        })
    }

    /// Set the display offset used by reports
    pub fn with_report_offset(mut self, hours: i32) -> Self {
        self.report_utc_offset_hours = hours;
        self
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    pub fn bucket_width_hours(&self) -> u32 {
        self.bucket_width_hours
    }

    pub fn report_utc_offset_hours(&self) -> i32 {
        self.report_utc_offset_hours
    }

    /// Number of buckets (H)
    pub fn len(&self) -> usize {
        ((self.end_hour - self.start_hour) / self.bucket_width_hours) as usize
    }

    /// Always false for a constructed domain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All bucket ordinals in ascending order
    pub fn indices(&self) -> impl Iterator<Item = BucketIndex> {
        (0..self.len()).map(BucketIndex)
    }

    /// First bucket of the session
    pub fn first(&self) -> BucketIndex {
        BucketIndex(0)
    }

    /// UTC hour at which bucket `idx` opens
    pub fn bucket_hour(&self, idx: BucketIndex) -> u32 {
        self.start_hour + idx.0 as u32 * self.bucket_width_hours
    }

    /// "HH:00" label of bucket `idx`
    pub fn label(&self, idx: BucketIndex) -> String {
        format!("{:02}:00", self.bucket_hour(idx))
    }

    /// Labels in domain order
    pub fn labels(&self) -> Vec<String> {
        self.indices().map(|idx| self.label(idx)).collect()
    }

    /// Reverse lookup of a label
    pub fn index_of_label(&self, label: &str) -> Option<BucketIndex> {
        self.indices().find(|idx| self.label(*idx) == label)
    }

    /// Bucket containing UTC hour `hour`
    ///
    /// Fails fast for hours outside the session; the domain is never extended.
    pub fn bucket_for_hour(&self, hour: u32) -> Result<BucketIndex, DomainError> {
        if hour < self.start_hour || hour >= self.end_hour {
            return Err(DomainError::HourOutsideDomain {
                hour,
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        Ok(BucketIndex(
            ((hour - self.start_hour) / self.bucket_width_hours) as usize,
        ))
    }

    /// Native bucket of a timestamp (hour of day, UTC)
    pub fn bucket_for(&self, timestamp: &DateTime<Utc>) -> Result<BucketIndex, DomainError> {
        self.bucket_for_hour(timestamp.hour())
    }

    /// Display hour of bucket `idx` after applying the report offset, in [0, 24)
    pub fn local_hour(&self, idx: BucketIndex) -> i32 {
        (self.bucket_hour(idx) as i32 + self.report_utc_offset_hours).rem_euclid(24)
    }
}

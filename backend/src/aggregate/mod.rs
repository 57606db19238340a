//! Population-level reduction over finished brokers
//!
//! Read-only: sums volumes and summarises the per-bucket distribution of
//! `net_cash_flow` and `eod_baseline` across the population. Brokers with
//! an empty chunk contribute zeros like any other broker; ratios with no
//! denominator are reported as `None` ("no data"). Population-wide sums
//! saturate at the `i64` bounds.

use crate::domain::SettlementDomain;
use crate::models::Broker;
use serde::Serialize;

/// Count, mean and sample standard deviation of one bucket across brokers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    /// None when no brokers contributed
    pub mean: Option<f64>,
    /// Sample std dev (n - 1); None with fewer than two values
    pub std_dev: Option<f64>,
}

impl SummaryStats {
    pub fn from_values(values: &[i64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: None,
                std_dev: None,
            };
        }

        let mean = values.iter().map(|v| *v as f64).sum::<f64>() / count as f64;
        let std_dev = (count > 1).then(|| {
            let sq: f64 = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
            (sq / (count - 1) as f64).sqrt()
        });

        Self {
            count,
            mean: Some(mean),
            std_dev,
        }
    }
}

/// Aggregate view of one settlement bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketAggregate {
    pub label: String,
    /// Bucket hour shifted by the domain's report offset
    pub local_hour: i32,
    pub bid_volume: i64,
    pub ask_volume: i64,
    /// bid_volume - ask_volume
    pub net_volume: i64,
    pub net_cash_flow: SummaryStats,
    pub eod_baseline: SummaryStats,
}

/// Population-wide netting diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationDiagnostics {
    pub num_brokers: usize,
    pub empty_brokers: usize,
    pub events_processed: u64,
    pub random_overrides: u64,
    pub skipped_events: u64,
    pub netted_amount: i64,
    pub gross_value: i64,
    pub override_fraction: Option<f64>,
    pub netting_ratio: Option<f64>,
}

/// Per-bucket aggregate over a broker population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationAggregate {
    pub buckets: Vec<BucketAggregate>,
    pub diagnostics: PopulationDiagnostics,
}

impl PopulationAggregate {
    /// Reduce `brokers`, all of which must share `domain`
    ///
    /// # Example
    /// ```
    /// use netting_simulator_core::{PopulationAggregate, SettlementDomain};
    ///
    /// let aggregate = PopulationAggregate::from_brokers(&SettlementDomain::default(), &[]);
    /// assert_eq!(aggregate.buckets.len(), 8);
    /// assert_eq!(aggregate.buckets[0].net_cash_flow.mean, None);
    /// assert_eq!(aggregate.diagnostics.override_fraction, None);
    /// ```
    pub fn from_brokers(domain: &SettlementDomain, brokers: &[Broker]) -> Self {
        let buckets = domain
            .indices()
            .map(|idx| {
                let bid_volume = saturating_sum(brokers.iter().map(|b| b.bid_volume().get(idx)));
                let ask_volume = saturating_sum(brokers.iter().map(|b| b.ask_volume().get(idx)));
                let net: Vec<i64> = brokers.iter().map(|b| b.net_cash_flow().get(idx)).collect();
                let eod: Vec<i64> = brokers.iter().map(|b| b.eod_baseline().get(idx)).collect();

                BucketAggregate {
                    label: domain.label(idx),
                    local_hour: domain.local_hour(idx),
                    bid_volume,
                    ask_volume,
                    net_volume: bid_volume.saturating_sub(ask_volume),
                    net_cash_flow: SummaryStats::from_values(&net),
                    eod_baseline: SummaryStats::from_values(&eod),
                }
            })
            .collect();

        Self {
            buckets,
            diagnostics: PopulationDiagnostics::from_brokers(brokers),
        }
    }

    /// Bucket aggregate by label
    pub fn bucket(&self, label: &str) -> Option<&BucketAggregate> {
        self.buckets.iter().find(|b| b.label == label)
    }
}

impl PopulationDiagnostics {
    fn from_brokers(brokers: &[Broker]) -> Self {
        let mut diag = Self {
            num_brokers: brokers.len(),
            ..Default::default()
        };

        for broker in brokers {
            let stats = broker.stats();
            if broker.client_orders().is_empty() {
                diag.empty_brokers += 1;
            }
            diag.events_processed = diag.events_processed.saturating_add(stats.events_processed);
            diag.random_overrides = diag.random_overrides.saturating_add(stats.random_overrides);
            diag.skipped_events = diag.skipped_events.saturating_add(stats.skipped_events);
            diag.netted_amount = diag.netted_amount.saturating_add(stats.netted_amount);
            diag.gross_value = diag.gross_value.saturating_add(stats.gross_value);
        }

        diag.override_fraction = (diag.events_processed > 0)
            .then(|| diag.random_overrides as f64 / diag.events_processed as f64);
        diag.netting_ratio =
            (diag.gross_value > 0).then(|| diag.netted_amount as f64 / diag.gross_value as f64);
        diag
    }
}

/// Population sums clamp at the `i64` bounds instead of wrapping
fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

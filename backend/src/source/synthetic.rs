//! Seeded synthetic trade flow
//!
//! Generates a day of trades with uniform timestamps across a session,
//! a Bid/Ask coin flip and configurable price/size distributions. Same
//! seed + same config → same events.

use super::{SourceError, TradeSource};
use crate::models::{Side, TradeEvent};
use crate::rng::RngManager;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Price distribution (i64 cents)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PriceDistribution {
    /// Uniform between min and max (inclusive)
    Uniform { min: i64, max: i64 },

    /// Normal around `mean`, floored at 1 cent
    Normal { mean: i64, std_dev: i64 },

    /// Log-normal (parameters of the underlying normal, in ln-cents)
    LogNormal { mean: f64, std_dev: f64 },
}

/// Synthetic generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub num_events: usize,
    pub seed: u64,
    /// Trading date the timestamps fall on
    pub date: NaiveDate,
    /// First UTC hour trades may occur in (inclusive)
    pub start_hour: u32,
    /// Last UTC hour bound (exclusive)
    pub end_hour: u32,
    /// Probability that a trade is an Ask
    pub ask_probability: f64,
    pub price: PriceDistribution,
    /// Share count range (inclusive)
    pub size_range: (u64, u64),
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_events: 10_000,
            seed: 42,
            date: NaiveDate::from_ymd_opt(2024, 12, 6).unwrap_or_default(),
            start_hour: 14,
            end_hour: 22,
            ask_probability: 0.5,
            price: PriceDistribution::Normal {
                mean: 17_000,
                std_dev: 250,
            },
            size_range: (1, 500),
        }
    }
}

impl SyntheticConfig {
    fn validate(&self) -> Result<(), SourceError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(SourceError::InvalidConfig(format!(
                "hours [{}, {}) do not form a session",
                self.start_hour, self.end_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.ask_probability) {
            return Err(SourceError::InvalidConfig(
                "ask_probability must be within [0, 1]".to_string(),
            ));
        }
        let (min_size, max_size) = self.size_range;
        if min_size == 0 || min_size > max_size {
            return Err(SourceError::InvalidConfig(format!(
                "size_range ({}, {}) must be positive and ordered",
                min_size, max_size
            )));
        }
        // Inclusive upper bound is sampled as max + 1 in i64
        if max_size >= i64::MAX as u64 {
            return Err(SourceError::InvalidConfig(format!(
                "size_range upper bound {} must be below {}",
                max_size,
                i64::MAX
            )));
        }
        match self.price {
            PriceDistribution::Uniform { min, max } => {
                if min <= 0 || min > max {
                    return Err(SourceError::InvalidConfig(format!(
                        "uniform price range ({}, {}) must be positive and ordered",
                        min, max
                    )));
                }
                if max == i64::MAX {
                    return Err(SourceError::InvalidConfig(format!(
                        "uniform price upper bound must be below {}",
                        i64::MAX
                    )));
                }
            }
            PriceDistribution::Normal { std_dev, .. } => {
                if std_dev < 0 {
                    return Err(SourceError::InvalidConfig(format!(
                        "normal std_dev {} must be non-negative",
                        std_dev
                    )));
                }
            }
            PriceDistribution::LogNormal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(SourceError::InvalidConfig(format!(
                        "log-normal parameters ({}, {}) must be finite with std_dev >= 0",
                        mean, std_dev
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Pre-generated synthetic feed, yielded in chronological order
///
/// # Example
/// ```
/// use netting_simulator_core::source::{collect_events, SyntheticConfig, SyntheticSource};
///
/// let config = SyntheticConfig { num_events: 100, ..Default::default() };
/// let mut source = SyntheticSource::new(&config).unwrap();
/// let events = collect_events(&mut source).unwrap();
/// assert_eq!(events.len(), 100);
/// assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    events: std::vec::IntoIter<TradeEvent>,
}

impl SyntheticSource {
    pub fn new(config: &SyntheticConfig) -> Result<Self, SourceError> {
        config.validate()?;

        let mut rng = RngManager::new(config.seed);
        let midnight = Utc.from_utc_datetime(&config.date.and_time(chrono::NaiveTime::MIN));
        let session_start = i64::from(config.start_hour) * 3600;
        let session_end = i64::from(config.end_hour) * 3600;

        let mut events = Vec::with_capacity(config.num_events);
        for _ in 0..config.num_events {
            let offset = rng.range(session_start, session_end);
            let side = if rng.chance(config.ask_probability) {
                Side::Ask
            } else {
                Side::Bid
            };
            let price = sample_price(&config.price, &mut rng);
            let (min_size, max_size) = config.size_range;
            let size = rng.range(min_size as i64, max_size as i64 + 1) as u64;

            events.push(TradeEvent {
                order_id: 0,
                timestamp: midnight + Duration::seconds(offset),
                side,
                price,
                size,
            });
        }

        events.sort_by_key(|e| e.timestamp);
        for (i, event) in events.iter_mut().enumerate() {
            event.order_id = i as u64 + 1;
        }

        Ok(Self {
            events: events.into_iter(),
        })
    }
}

impl TradeSource for SyntheticSource {
    fn next_event(&mut self) -> Option<Result<TradeEvent, SourceError>> {
        self.events.next().map(Ok)
    }
}

fn sample_price(distribution: &PriceDistribution, rng: &mut RngManager) -> i64 {
    match distribution {
        PriceDistribution::Uniform { min, max } => rng.range(*min, *max + 1),
        PriceDistribution::Normal { mean, std_dev } => {
            let z = standard_normal(rng);
            // f64 -> i64 casts saturate; the add must too
            mean.saturating_add(((*std_dev as f64) * z) as i64).max(1)
        }
        PriceDistribution::LogNormal { mean, std_dev } => {
            let z = standard_normal(rng);
            ((mean + std_dev * z).exp() as i64).max(1)
        }
    }
}

/// Box-Muller transform
fn standard_normal(rng: &mut RngManager) -> f64 {
    // 1 - u keeps the log argument in (0, 1]
    let u1 = 1.0 - rng.next_f64();
    let u2 = rng.next_f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

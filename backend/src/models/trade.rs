//! Trade event model
//!
//! A `TradeEvent` is one client order a broker must settle:
//! - Side (Bid = broker pays cash, Ask = broker receives cash)
//! - Price (i64 cents) and size (shares)
//! - Timestamp (UTC), whose hour picks the native settlement bucket
//!
//! CRITICAL: All money values are i64 (cents)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order side as seen by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Broker pays cash to receive the security
    #[serde(alias = "B", alias = "bid")]
    Bid,
    /// Broker receives cash by delivering the security
    #[serde(alias = "A", alias = "ask")]
    Ask,
}

impl Side {
    /// +1 for Ask, -1 for Bid
    pub fn sign(self) -> i64 {
        match self {
            Side::Ask => 1,
            Side::Bid => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "Bid",
            Side::Ask => "Ask",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by malformed trade events
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeEventError {
    #[error("Trade price must be positive, got {0}")]
    NonPositivePrice(i64),

    #[error("Trade size must be positive")]
    NonPositiveSize,

    #[error("Trade value overflows i64: price {price} x size {size}")]
    ValueOverflow { price: i64, size: u64 },
}

/// Immutable trade record
///
/// # Example
/// ```
/// use netting_simulator_core::{Side, TradeEvent};
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2024, 12, 6, 15, 30, 0).unwrap();
/// let bid = TradeEvent::new(1, ts, Side::Bid, 17_000, 10).unwrap();
///
/// assert_eq!(bid.value().unwrap(), 170_000);
/// assert_eq!(bid.cash_flow_impact().unwrap(), -170_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Upstream order identifier (informational)
    #[serde(default)]
    pub order_id: u64,

    /// Event time (UTC)
    pub timestamp: DateTime<Utc>,

    pub side: Side,

    /// Price per share (i64 cents)
    pub price: i64,

    /// Quantity (shares)
    pub size: u64,
}

impl TradeEvent {
    /// Create a validated trade event
    ///
    /// # Errors
    /// `NonPositivePrice` / `NonPositiveSize` for values the ingestion layer
    /// should have filtered out.
    pub fn new(
        order_id: u64,
        timestamp: DateTime<Utc>,
        side: Side,
        price: i64,
        size: u64,
    ) -> Result<Self, TradeEventError> {
        let event = Self {
            order_id,
            timestamp,
            side,
            price,
            size,
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the positivity preconditions
    pub fn validate(&self) -> Result<(), TradeEventError> {
        if self.price <= 0 {
            return Err(TradeEventError::NonPositivePrice(self.price));
        }
        if self.size == 0 {
            return Err(TradeEventError::NonPositiveSize);
        }
        Ok(())
    }

    /// Unsigned traded value (price × size)
    pub fn value(&self) -> Result<i64, TradeEventError> {
        i64::try_from(self.size)
            .ok()
            .and_then(|size| self.price.checked_mul(size))
            .ok_or(TradeEventError::ValueOverflow {
                price: self.price,
                size: self.size,
            })
    }

    /// Signed cash-flow impact: +value for Ask, -value for Bid
    pub fn cash_flow_impact(&self) -> Result<i64, TradeEventError> {
        Ok(self.side.sign() * self.value()?)
    }
}

//! Settlement-obligation projection for the downstream matching engine
//!
//! One record per (broker, bucket, side). Field names are PascalCase because
//! the consumer reads them as contract objects. The projection adds no
//! invariant: quantities are the post-netting bucket volumes as-is, which
//! can be negative when volume was shifted to an earlier bucket.

use crate::models::{Broker, Side};
use serde::{Deserialize, Serialize};

/// A broker's obligation to settle one side in one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettlementObligation {
    /// "Broker_{n}_{Bid|Ask}_{label}"
    pub id: String,
    pub settlement_hour: String,
    /// Externally supplied clearing price (cents)
    pub price: i64,
    /// Attributed volume (cents)
    pub quantity: i64,
    pub order_type: Side,
}

/// Project finished brokers into obligation records
///
/// Bids precede asks for each broker; buckets are in domain order.
///
/// # Example
/// ```
/// use netting_simulator_core::{settlement_obligations, Broker, BrokerId, SettlementDomain};
/// use std::sync::Arc;
///
/// let broker = Broker::new(BrokerId(3), Arc::new(SettlementDomain::default()), Vec::new());
/// let records = settlement_obligations(&[broker], 17_000);
/// assert_eq!(records.len(), 16);
/// assert_eq!(records[0].id, "Broker_3_Bid_14:00");
/// ```
pub fn settlement_obligations(brokers: &[Broker], clearing_price: i64) -> Vec<SettlementObligation> {
    let mut records = Vec::new();
    for broker in brokers {
        for (side, map) in [(Side::Bid, broker.bid_volume()), (Side::Ask, broker.ask_volume())] {
            for (label, quantity) in map.iter() {
                records.push(SettlementObligation {
                    id: format!("{}_{}_{}", broker.id(), side, label),
                    settlement_hour: label,
                    price: clearing_price,
                    quantity,
                    order_type: side,
                });
            }
        }
    }
    records
}

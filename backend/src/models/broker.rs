//! Broker (agent) model
//!
//! A broker-dealer holding one partition of the client order flow.
//! Each broker owns four bucket maps over the same settlement domain:
//! - `net_cash_flow`: signed running balance per bucket (+ = net receiver)
//! - `ask_volume` / `bid_volume`: traded value attributed to each bucket
//!   after netting (may go negative when volume is shifted away)
//! - `eod_baseline`: counterfactual cumulative series with no netting and
//!   no randomized settlement, computed from the raw order chunk
//!
//! Lifecycle: created with a fixed chunk → events processed one at a time
//! → `compute_eod_baseline` once → read-only.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::domain::{BucketIndex, DomainError, SettlementDomain, TimeBucketMap};
use crate::models::trade::{Side, TradeEvent, TradeEventError};
use crate::policy::{SettlementChoice, SettlementPolicy, StochasticOverridePolicy};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Broker identifier (position in the population)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BrokerId(pub usize);

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Broker_{}", self.0)
    }
}

/// Errors that can occur while a broker books an event
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Trade(#[from] TradeEventError),

    #[error("{0} is finalized; no further events accepted")]
    AlreadyFinalized(BrokerId),

    #[error("{broker}: {accumulator} would overflow i64")]
    BalanceOverflow { broker: BrokerId, accumulator: String },
}

/// How the target bucket absorbs the residual left after netting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualMode {
    /// Residual replaces only this event's contribution:
    /// `target = prior balance + residual`. Conserves total cash flow.
    #[default]
    Accumulate,

    /// Residual replaces the whole bucket: `target = residual`.
    /// Reproduces legacy numbers; discards any prior balance at the target.
    Overwrite,
}

/// What a broker does with an event it cannot book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidEventPolicy {
    /// Stop processing and report the broker as failed
    #[default]
    Fail,

    /// Leave the maps untouched, count the event, continue
    Skip,
}

/// Per-broker netting diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NettingStats {
    /// Events booked into a bucket
    pub events_processed: u64,

    /// Events routed by the random override
    pub random_overrides: u64,

    /// Events whose target had earlier buckets to net against
    pub netting_passes: u64,

    /// Total amount moved onto earlier buckets (cents)
    pub netted_amount: i64,

    /// Sum of traded values booked (cents)
    pub gross_value: i64,

    /// Events rejected under `InvalidEventPolicy::Skip`
    pub skipped_events: u64,
}

impl NettingStats {
    /// Share of booked events that took the random override; None without events
    pub fn override_fraction(&self) -> Option<f64> {
        (self.events_processed > 0)
            .then(|| self.random_overrides as f64 / self.events_processed as f64)
    }

    /// Netted amount relative to gross traded value; None without volume
    pub fn netting_ratio(&self) -> Option<f64> {
        (self.gross_value > 0).then(|| self.netted_amount as f64 / self.gross_value as f64)
    }
}

/// A simulated broker-dealer
///
/// # Example
/// ```
/// use netting_simulator_core::{Broker, BrokerId, SettlementDomain, Side, TradeEvent};
/// use netting_simulator_core::policy::StochasticOverridePolicy;
/// use chrono::{TimeZone, Utc};
/// use std::sync::Arc;
///
/// let domain = Arc::new(SettlementDomain::default());
/// let at = |h| Utc.with_ymd_and_hms(2024, 12, 6, h, 5, 0).unwrap();
/// let orders = vec![
///     TradeEvent::new(1, at(14), Side::Ask, 50, 1).unwrap(),
///     TradeEvent::new(2, at(15), Side::Bid, 100, 1).unwrap(),
/// ];
///
/// let mut broker = Broker::new(BrokerId(0), domain, orders)
///     .with_policy(Box::new(StochasticOverridePolicy::new(0.0)));
/// broker.process_client_orders(Default::default()).unwrap();
/// broker.compute_eod_baseline().unwrap();
///
/// assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(0));
/// assert_eq!(broker.net_cash_flow().get_label("15:00"), Some(-50));
/// ```
pub struct Broker {
    id: BrokerId,
    domain: Arc<SettlementDomain>,

    /// Chunk of client orders assigned by the harness, in arrival order
    client_orders: Vec<TradeEvent>,

    net_cash_flow: TimeBucketMap,
    ask_volume: TimeBucketMap,
    bid_volume: TimeBucketMap,
    eod_baseline: TimeBucketMap,

    policy: Box<dyn SettlementPolicy>,
    rng: RngManager,
    residual_mode: ResidualMode,
    stats: NettingStats,
    finalized: bool,
}

impl Broker {
    /// Create a broker with the default stochastic policy
    ///
    /// The RNG stream is derived from the broker id; the harness replaces it
    /// with one derived from the run seed.
    pub fn new(id: BrokerId, domain: Arc<SettlementDomain>, client_orders: Vec<TradeEvent>) -> Self {
        Self {
            id,
            net_cash_flow: TimeBucketMap::new(domain.clone()),
            ask_volume: TimeBucketMap::new(domain.clone()),
            bid_volume: TimeBucketMap::new(domain.clone()),
            eod_baseline: TimeBucketMap::new(domain.clone()),
            domain,
            client_orders,
            policy: Box::new(StochasticOverridePolicy::default()),
            rng: RngManager::new(RngManager::derive_seed(0, id.0 as u64)),
            residual_mode: ResidualMode::default(),
            stats: NettingStats::default(),
            finalized: false,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn SettlementPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rng(mut self, rng: RngManager) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_residual_mode(mut self, mode: ResidualMode) -> Self {
        self.residual_mode = mode;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> BrokerId {
        self.id
    }

    pub fn domain(&self) -> &SettlementDomain {
        &self.domain
    }

    pub fn client_orders(&self) -> &[TradeEvent] {
        &self.client_orders
    }

    pub fn net_cash_flow(&self) -> &TimeBucketMap {
        &self.net_cash_flow
    }

    pub fn ask_volume(&self) -> &TimeBucketMap {
        &self.ask_volume
    }

    pub fn bid_volume(&self) -> &TimeBucketMap {
        &self.bid_volume
    }

    pub fn eod_baseline(&self) -> &TimeBucketMap {
        &self.eod_baseline
    }

    pub fn stats(&self) -> &NettingStats {
        &self.stats
    }

    pub fn residual_mode(&self) -> ResidualMode {
        self.residual_mode
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // ========================================================================
    // Netting
    // ========================================================================

    /// Native bucket, signed impact and unsigned value of an event
    fn booking(&self, event: &TradeEvent) -> Result<(BucketIndex, i64, i64), BrokerError> {
        event.validate()?;
        let value = event.value()?;
        let native = self.domain.bucket_for(&event.timestamp)?;
        Ok((native, event.side.sign() * value, value))
    }

    /// Book one event
    ///
    /// The policy draws once per event. A random override posts the full
    /// impact to the drawn bucket and stops; otherwise the event is posted to
    /// its native bucket and netted earliest-first against earlier buckets.
    ///
    /// # Errors
    /// Out-of-domain or malformed events, and events that would push any
    /// accumulator past the `i64` range, leave every map, the stats and the
    /// RNG stream untouched.
    pub fn process_event(&mut self, event: &TradeEvent) -> Result<SettlementChoice, BrokerError> {
        if self.finalized {
            return Err(BrokerError::AlreadyFinalized(self.id));
        }

        let (native, impact, value) = self.booking(event)?;
        let rng_before = self.rng.clone();
        let choice = self.policy.choose(native, &self.domain, &mut self.rng);

        let posting = match choice {
            SettlementChoice::RandomOverride { bucket } => {
                self.plan_override(bucket, event.side, impact, value)
            }
            SettlementChoice::NativeBucketNetting { bucket } => {
                self.plan_netting(bucket, event.side, impact, value)
            }
        };
        let (posting, gross_value, netted_amount) = match posting.and_then(|p| {
            let gross = self.checked_stat(self.stats.gross_value, value, "gross_value")?;
            let netted = self.checked_stat(self.stats.netted_amount, p.netted, "netted_amount")?;
            Ok((p, gross, netted))
        }) {
            Ok(staged) => staged,
            Err(err) => {
                self.rng = rng_before;
                return Err(err);
            }
        };

        self.apply(posting);
        if choice.is_override() {
            self.stats.random_overrides += 1;
        }
        self.stats.events_processed += 1;
        self.stats.gross_value = gross_value;
        self.stats.netted_amount = netted_amount;
        Ok(choice)
    }

    /// Volume map for `side` and its name in overflow errors
    fn volume(&self, side: Side) -> (&TimeBucketMap, &'static str) {
        match side {
            Side::Ask => (&self.ask_volume, "ask_volume"),
            Side::Bid => (&self.bid_volume, "bid_volume"),
        }
    }

    fn overflow(&self, accumulator: impl Into<String>) -> BrokerError {
        BrokerError::BalanceOverflow {
            broker: self.id,
            accumulator: accumulator.into(),
        }
    }

    fn checked_stat(&self, total: i64, delta: i64, name: &str) -> Result<i64, BrokerError> {
        total.checked_add(delta).ok_or_else(|| self.overflow(name))
    }

    /// `current + delta` for one bucket of `map`, or an overflow naming it
    fn checked_bucket(
        &self,
        map: &TimeBucketMap,
        name: &str,
        bucket: BucketIndex,
        delta: i64,
    ) -> Result<i64, BrokerError> {
        map.get(bucket)
            .checked_add(delta)
            .ok_or_else(|| self.overflow(format!("{}[{}]", name, self.domain.label(bucket))))
    }

    /// Full impact and value to `bucket`, no netting
    fn plan_override(
        &self,
        bucket: BucketIndex,
        side: Side,
        impact: i64,
        value: i64,
    ) -> Result<Posting, BrokerError> {
        let net = self.checked_bucket(&self.net_cash_flow, "net_cash_flow", bucket, impact)?;
        let (volumes, name) = self.volume(side);
        let volume = self.checked_bucket(volumes, name, bucket, value)?;
        Ok(Posting {
            side,
            net: vec![(bucket, net)],
            volume: vec![(bucket, volume)],
            netted: 0,
            netting_pass: false,
        })
    }

    /// Post to `target`, then net the residual against strictly earlier buckets
    fn plan_netting(
        &self,
        target: BucketIndex,
        side: Side,
        impact: i64,
        value: i64,
    ) -> Result<Posting, BrokerError> {
        let (volumes, name) = self.volume(side);
        let mut net = Vec::new();
        let mut volume = Vec::new();
        let mut remaining = impact;
        let mut netted = 0i64;

        for bucket in (0..target.get()).map(BucketIndex) {
            if remaining == 0 {
                break;
            }
            let balance = self.net_cash_flow.get(bucket);
            let opposite = (balance > 0 && remaining < 0) || (balance < 0 && remaining > 0);
            if !opposite {
                continue;
            }

            // |remaining| <= value, so the smaller magnitude fits in i64
            let amount = balance.unsigned_abs().min(remaining.unsigned_abs()) as i64;
            let shift = remaining.signum() * amount;
            net.push((bucket, balance + shift));
            remaining -= shift;
            netted += amount;
            volume.push((bucket, self.checked_bucket(volumes, name, bucket, amount)?));
        }

        let settled = match self.residual_mode {
            ResidualMode::Accumulate => {
                self.checked_bucket(&self.net_cash_flow, "net_cash_flow", target, remaining)?
            }
            ResidualMode::Overwrite => remaining,
        };
        net.push((target, settled));
        volume.push((target, self.checked_bucket(volumes, name, target, value - netted)?));

        Ok(Posting {
            side,
            net,
            volume,
            netted,
            netting_pass: target > self.domain.first(),
        })
    }

    fn apply(&mut self, posting: Posting) {
        for (bucket, value) in posting.net {
            self.net_cash_flow.set(bucket, value);
        }
        let volumes = match posting.side {
            Side::Ask => &mut self.ask_volume,
            Side::Bid => &mut self.bid_volume,
        };
        for (bucket, value) in posting.volume {
            volumes.set(bucket, value);
        }
        if posting.netting_pass {
            self.stats.netting_passes += 1;
        }
    }

    /// Drive the assigned chunk through `process_event` in order
    ///
    /// # Errors
    /// Under `InvalidEventPolicy::Fail` the first rejected event is returned
    /// and later events are not processed.
    pub fn process_client_orders(&mut self, on_invalid: InvalidEventPolicy) -> Result<(), BrokerError> {
        for i in 0..self.client_orders.len() {
            let event = self.client_orders[i];
            match self.process_event(&event) {
                Ok(_) => {}
                Err(err @ BrokerError::AlreadyFinalized(_)) => return Err(err),
                Err(err) => match on_invalid {
                    InvalidEventPolicy::Fail => return Err(err),
                    InvalidEventPolicy::Skip => {
                        debug!(broker = %self.id, order_id = event.order_id, error = %err, "skipping event");
                        self.stats.skipped_events += 1;
                    }
                },
            }
        }

        if self.stats.skipped_events > 0 {
            warn!(
                broker = %self.id,
                skipped = self.stats.skipped_events,
                "events that could not be booked were skipped"
            );
        }
        Ok(())
    }

    // ========================================================================
    // End-of-day baseline
    // ========================================================================

    /// Compute the EOD baseline from the raw chunk and finalize the broker
    ///
    /// `eod[first] = net(first)`, `eod[h] = eod[h-1] + net(h)` where
    /// `net(h)` is ask value minus bid value of events native to `h`.
    /// Rows the netting pass would reject are ignored. Never reads the
    /// netting maps, and recomputing yields the same series.
    ///
    /// # Errors
    /// `BalanceOverflow` when a bucket or running total leaves the `i64`
    /// range; the baseline map is left as it was and the broker stays open.
    pub fn compute_eod_baseline(&mut self) -> Result<(), BrokerError> {
        let mut net_per_bucket = vec![0i64; self.domain.len()];
        for event in &self.client_orders {
            if let Ok((native, impact, _)) = self.booking(event) {
                let slot = &mut net_per_bucket[native.get()];
                *slot = slot.checked_add(impact).ok_or_else(|| {
                    self.overflow(format!("eod_baseline[{}]", self.domain.label(native)))
                })?;
            }
        }

        let mut series = Vec::with_capacity(net_per_bucket.len());
        let mut running = 0i64;
        for bucket in self.domain.indices() {
            running = running.checked_add(net_per_bucket[bucket.get()]).ok_or_else(|| {
                self.overflow(format!("eod_baseline[{}]", self.domain.label(bucket)))
            })?;
            series.push((bucket, running));
        }

        for (bucket, value) in series {
            self.eod_baseline.set(bucket, value);
        }
        self.finalized = true;
        Ok(())
    }

    /// Serializable view of the final state
    pub fn snapshot(&self) -> BrokerSnapshot {
        BrokerSnapshot {
            id: self.id,
            num_client_orders: self.client_orders.len(),
            net_cash_flow: self.net_cash_flow.clone(),
            ask_volume: self.ask_volume.clone(),
            bid_volume: self.bid_volume.clone(),
            eod_baseline: self.eod_baseline.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.id)
            .field("client_orders", &self.client_orders.len())
            .field("policy", &self.policy.name())
            .field("residual_mode", &self.residual_mode)
            .field("stats", &self.stats)
            .field("finalized", &self.finalized)
            .finish()
    }
}

/// Bucket writes for one event, staged before any map changes
struct Posting {
    side: Side,
    /// New `net_cash_flow` values
    net: Vec<(BucketIndex, i64)>,
    /// New values of the event side's volume map
    volume: Vec<(BucketIndex, i64)>,
    netted: i64,
    netting_pass: bool,
}

/// Final per-broker state for export
#[derive(Debug, Clone, Serialize)]
pub struct BrokerSnapshot {
    pub id: BrokerId,
    pub num_client_orders: usize,
    pub net_cash_flow: TimeBucketMap,
    pub ask_volume: TimeBucketMap,
    pub bid_volume: TimeBucketMap,
    pub eod_baseline: TimeBucketMap,
    pub stats: NettingStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(hour: u32, side: Side, price: i64, size: u64) -> TradeEvent {
        let ts = Utc.with_ymd_and_hms(2024, 12, 6, hour, 0, 0).unwrap();
        TradeEvent::new(0, ts, side, price, size).unwrap()
    }

    fn netting_broker() -> Broker {
        Broker::new(BrokerId(7), Arc::new(SettlementDomain::default()), Vec::new())
            .with_policy(Box::new(StochasticOverridePolicy::new(0.0)))
    }

    #[test]
    fn test_override_skips_netting() {
        let mut broker = Broker::new(BrokerId(1), Arc::new(SettlementDomain::default()), Vec::new())
            .with_policy(Box::new(StochasticOverridePolicy::new(1.0)));

        let choice = broker.process_event(&event(15, Side::Bid, 100, 1)).unwrap();
        assert!(choice.is_override());
        assert_eq!(broker.net_cash_flow().get(choice.bucket()), -100);
        assert_eq!(broker.bid_volume().get(choice.bucket()), 100);
        assert_eq!(broker.stats().random_overrides, 1);
        assert_eq!(broker.stats().netting_passes, 0);
    }

    #[test]
    fn test_netting_stops_when_fully_netted() {
        let mut broker = netting_broker();
        broker.process_event(&event(14, Side::Ask, 30, 1)).unwrap();
        broker.process_event(&event(15, Side::Ask, 40, 1)).unwrap();

        // 14:00 covers the whole bid, 15:00 must not be touched
        broker.process_event(&event(16, Side::Bid, 20, 1)).unwrap();

        let net = broker.net_cash_flow();
        assert_eq!(net.get_label("14:00"), Some(10));
        assert_eq!(net.get_label("15:00"), Some(40));
        assert_eq!(net.get_label("16:00"), Some(0));
        assert_eq!(broker.bid_volume().get_label("16:00"), Some(0));
        assert_eq!(broker.bid_volume().get_label("14:00"), Some(20));
    }

    #[test]
    fn test_overwrite_mode_discards_prior_target_balance() {
        let mut broker = netting_broker().with_residual_mode(ResidualMode::Overwrite);
        broker.process_event(&event(15, Side::Ask, 70, 1)).unwrap();
        broker.process_event(&event(15, Side::Ask, 30, 1)).unwrap();

        assert_eq!(broker.net_cash_flow().get_label("15:00"), Some(30));
    }

    #[test]
    fn test_finalized_broker_rejects_events() {
        let mut broker = netting_broker();
        broker.compute_eod_baseline().unwrap();
        assert_eq!(
            broker.process_event(&event(15, Side::Ask, 1, 1)),
            Err(BrokerError::AlreadyFinalized(BrokerId(7)))
        );
    }

    #[test]
    fn test_stats_ratios_empty_chunk() {
        let broker = netting_broker();
        assert_eq!(broker.stats().override_fraction(), None);
        assert_eq!(broker.stats().netting_ratio(), None);
    }
}

//! Simulation harness
//!
//! Drives a broker population through one settlement day:
//!
//! ```text
//! 1. Shuffle the event table (master RNG)
//! 2. Partition into N chunks of floor(M / N), drop the remainder
//! 3. Build one broker per chunk with its own derived RNG stream
//! 4. Per broker: process events in chunk order, then EOD baseline
//! 5. Join
//! 6. Aggregate across brokers that completed
//! ```
//!
//! Step 4 runs brokers in parallel (rayon) unless the `parallel` feature is
//! off or `force_sequential` is set; results are identical either way.
//! A broker that fails is reported in `failures` and left out of the
//! aggregate; the rest of the population is unaffected.
//!
//! # Example
//!
//! ```rust
//! use netting_simulator_core::orchestrator::{Simulation, SimulationConfig};
//! use netting_simulator_core::source::{SyntheticConfig, SyntheticSource};
//!
//! let config = SimulationConfig {
//!     num_brokers: 10,
//!     rng_seed: 7,
//!     ..Default::default()
//! };
//! let simulation = Simulation::new(config).unwrap();
//!
//! let mut source = SyntheticSource::new(&SyntheticConfig {
//!     num_events: 1_005,
//!     ..Default::default()
//! })
//! .unwrap();
//! let outcome = simulation.run_source(&mut source).unwrap();
//!
//! assert_eq!(outcome.brokers.len(), 10);
//! assert_eq!(outcome.chunk_size, 100);
//! assert_eq!(outcome.events_dropped, 5);
//! ```

use super::partition::partition_events;
use crate::aggregate::PopulationAggregate;
use crate::domain::SettlementDomain;
use crate::export::{settlement_obligations, SettlementObligation};
use crate::models::{Broker, BrokerError, BrokerId, InvalidEventPolicy, ResidualMode, TradeEvent};
use crate::policy::PolicyConfig;
use crate::rng::RngManager;
use crate::source::{collect_events, SourceError, TradeSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete harness configuration
///
/// Every field has a default, so a JSON config only needs the overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of independent brokers (N)
    pub num_brokers: usize,

    /// Seeds the shuffle and, via derivation, every broker's RNG stream
    pub rng_seed: u64,

    /// Settlement buckets
    pub domain: SettlementDomain,

    /// Per-event settlement decision
    pub policy: PolicyConfig,

    /// How the target bucket absorbs the netting residual. `Accumulate`
    /// conserves each broker's cash flow; `Overwrite` reproduces the legacy
    /// numbers, where the residual replaces the target bucket's balance.
    pub residual_mode: ResidualMode,

    /// Handling of events a broker cannot book
    pub invalid_events: InvalidEventPolicy,

    /// Run brokers on the calling thread even when `parallel` is enabled
    pub force_sequential: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_brokers: 3000,
            rng_seed: 12345,
            domain: SettlementDomain::default(),
            policy: PolicyConfig::default(),
            residual_mode: ResidualMode::default(),
            invalid_events: InvalidEventPolicy::default(),
            force_sequential: false,
        }
    }
}

/// Run-level errors
///
/// Only an invalid run (bad config, unreadable input) is fatal; per-broker
/// problems surface as [`BrokerFailure`]s.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A broker whose processing stopped on an error
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerFailure {
    pub broker_id: BrokerId,
    pub events_assigned: usize,
    /// Events booked before the failure
    pub events_processed: u64,
    pub error: BrokerError,
}

/// Everything a run produced
#[derive(Debug)]
pub struct SimulationOutcome {
    /// Finalized brokers, ascending id
    pub brokers: Vec<Broker>,
    pub failures: Vec<BrokerFailure>,
    pub events_received: usize,
    pub chunk_size: usize,
    pub events_assigned: usize,
    pub events_dropped: usize,
    pub aggregate: PopulationAggregate,
}

impl SimulationOutcome {
    pub fn broker(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.id() == id)
    }

    /// Obligation records for every finalized broker
    pub fn obligations(&self, clearing_price: i64) -> Vec<SettlementObligation> {
        settlement_obligations(&self.brokers, clearing_price)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Population-level simulation harness; owns no netting logic
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    domain: Arc<SettlementDomain>,
}

impl Simulation {
    /// Validate `config` and prepare a harness
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;
        let domain = Arc::new(config.domain.clone());
        Ok(Self { config, domain })
    }

    fn validate_config(config: &SimulationConfig) -> Result<(), SimulationError> {
        if config.num_brokers == 0 {
            return Err(SimulationError::InvalidConfig(
                "num_brokers must be > 0".to_string(),
            ));
        }

        config
            .policy
            .validate()
            .map_err(SimulationError::InvalidConfig)?;

        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn domain(&self) -> &SettlementDomain {
        &self.domain
    }

    /// Drain `source` and run
    pub fn run_source(&self, source: &mut dyn TradeSource) -> Result<SimulationOutcome, SimulationError> {
        let events = collect_events(source)?;
        self.run(events)
    }

    /// Run one simulated day over `events`
    pub fn run(&self, mut events: Vec<TradeEvent>) -> Result<SimulationOutcome, SimulationError> {
        let events_received = events.len();
        info!(
            events = events_received,
            brokers = self.config.num_brokers,
            seed = self.config.rng_seed,
            "starting netting simulation"
        );

        let mut shuffle_rng = RngManager::new(self.config.rng_seed);
        shuffle_rng.shuffle(&mut events);

        let partition = partition_events(events, self.config.num_brokers);
        let events_assigned = partition.assigned();
        if partition.dropped > 0 {
            warn!(
                dropped = partition.dropped,
                chunk_size = partition.chunk_size,
                "remainder events not assigned to any broker"
            );
        }

        let brokers: Vec<Broker> = partition
            .chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| self.build_broker(BrokerId(i), chunk))
            .collect();

        let results = self.drive(brokers);

        let mut finished = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(broker) => finished.push(broker),
                Err(failure) => {
                    warn!(
                        broker = %failure.broker_id,
                        processed = failure.events_processed,
                        error = %failure.error,
                        "broker failed; excluded from aggregate"
                    );
                    failures.push(failure);
                }
            }
        }

        // All brokers have joined at this point
        let aggregate = PopulationAggregate::from_brokers(&self.domain, &finished);
        info!(
            finished = finished.len(),
            failed = failures.len(),
            "netting simulation complete"
        );

        Ok(SimulationOutcome {
            brokers: finished,
            failures,
            events_received,
            chunk_size: partition.chunk_size,
            events_assigned,
            events_dropped: partition.dropped,
            aggregate,
        })
    }

    fn build_broker(&self, id: BrokerId, chunk: Vec<TradeEvent>) -> Broker {
        let seed = RngManager::derive_seed(self.config.rng_seed, id.0 as u64);
        Broker::new(id, self.domain.clone(), chunk)
            .with_policy(self.config.policy.build())
            .with_rng(RngManager::new(seed))
            .with_residual_mode(self.config.residual_mode)
    }

    fn drive(&self, brokers: Vec<Broker>) -> Vec<Result<Broker, BrokerFailure>> {
        let on_invalid = self.config.invalid_events;

        #[cfg(feature = "parallel")]
        {
            if !self.config.force_sequential {
                return brokers
                    .into_par_iter()
                    .map(|broker| drive_broker(broker, on_invalid))
                    .collect();
            }
        }

        brokers
            .into_iter()
            .map(|broker| drive_broker(broker, on_invalid))
            .collect()
    }
}

/// Netting pass over the whole chunk, then the EOD baseline
fn drive_broker(mut broker: Broker, on_invalid: InvalidEventPolicy) -> Result<Broker, BrokerFailure> {
    let finished = broker
        .process_client_orders(on_invalid)
        .and_then(|()| broker.compute_eod_baseline());

    match finished {
        Ok(()) => {
            debug!(
                broker = %broker.id(),
                events = broker.stats().events_processed,
                overrides = broker.stats().random_overrides,
                "broker finalized"
            );
            Ok(broker)
        }
        Err(error) => Err(BrokerFailure {
            broker_id: broker.id(),
            events_assigned: broker.client_orders().len(),
            events_processed: broker.stats().events_processed,
            error,
        }),
    }
}

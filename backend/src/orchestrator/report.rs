//! Run report - serializable summary of one simulation run
//!
//! Carries the config hash and seed needed to reproduce the run, partition
//! accounting, isolated broker failures and the population aggregate.
//!
//! # Reproducibility
//!
//! Same config (same hash) + same input events → same aggregate.
//! `run_id` is unique per invocation and is not part of that guarantee.

use super::engine::{SimulationConfig, SimulationError, SimulationOutcome};
use crate::aggregate::PopulationAggregate;
use crate::models::{BrokerId, BrokerSnapshot};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Failed broker, flattened for export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub broker_id: BrokerId,
    pub events_assigned: usize,
    pub events_processed: u64,
    pub error: String,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// SHA256 of the canonical JSON config
    pub config_hash: String,
    pub rng_seed: u64,
    pub num_brokers: usize,
    pub events_received: usize,
    pub events_assigned: usize,
    pub events_dropped: usize,
    pub chunk_size: usize,
    pub failures: Vec<FailureRecord>,
    pub aggregate: PopulationAggregate,
    /// Per-broker final maps, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brokers: Option<Vec<BrokerSnapshot>>,
}

impl RunReport {
    pub fn new(
        config: &SimulationConfig,
        outcome: &SimulationOutcome,
        include_brokers: bool,
    ) -> Result<Self, SimulationError> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            config_hash: compute_config_hash(config)?,
            rng_seed: config.rng_seed,
            num_brokers: config.num_brokers,
            events_received: outcome.events_received,
            events_assigned: outcome.events_assigned,
            events_dropped: outcome.events_dropped,
            chunk_size: outcome.chunk_size,
            failures: outcome
                .failures
                .iter()
                .map(|f| FailureRecord {
                    broker_id: f.broker_id,
                    events_assigned: f.events_assigned,
                    events_processed: f.events_processed,
                    error: f.error.to_string(),
                })
                .collect(),
            aggregate: outcome.aggregate.clone(),
            brokers: include_brokers
                .then(|| outcome.brokers.iter().map(|b| b.snapshot()).collect()),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, SimulationError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SimulationError::SerializationError(format!("Report serialization failed: {}", e))
        })
    }
}

/// Hex SHA-256 of the config's canonical JSON
///
/// The config goes through `serde_json::Value` first. Without the
/// `preserve_order` feature its object map is a `BTreeMap`, so keys come out
/// sorted at every depth and the digest ignores struct field order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    let canonical = serde_json::to_value(config)
        .and_then(|value| serde_json::to_vec(&value))
        .map_err(|e| SimulationError::SerializationError(format!("config hash: {}", e)))?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

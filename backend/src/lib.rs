//! Settlement Netting Simulator - Rust Engine
//!
//! Simulates a population of broker-dealers choosing hour-of-day settlement
//! buckets for their client trades, netting new obligations against earlier
//! ones, and compares the outcome with an end-of-day baseline.
//!
//! # Architecture
//!
//! - **domain**: Settlement domain and the fixed-domain `TimeBucketMap`
//! - **models**: Domain types (TradeEvent, Broker)
//! - **policy**: Per-event settlement decision (random override vs netting)
//! - **orchestrator**: Shuffle, partition, per-broker run, aggregation
//! - **aggregate**: Read-only population statistics
//! - **export**: Settlement-obligation records for downstream consumers
//! - **source**: Trade event sources (in-memory, JSON lines, synthetic)
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents)
//! 2. All randomness is deterministic (seeded RNG, one stream per broker)
//! 3. Bucket domains never change after construction
//! 4. Netting conserves each broker's total cash flow

// Module declarations
pub mod aggregate;
pub mod domain;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod source;

// Re-exports for convenience
pub use aggregate::{BucketAggregate, PopulationAggregate, PopulationDiagnostics, SummaryStats};
pub use domain::{BucketIndex, DomainError, SettlementDomain, TimeBucketMap};
pub use export::{settlement_obligations, SettlementObligation};
pub use models::{
    Broker, BrokerError, BrokerId, BrokerSnapshot, InvalidEventPolicy, NettingStats,
    ResidualMode, Side, TradeEvent, TradeEventError,
};
pub use orchestrator::{
    BrokerFailure, RunReport, Simulation, SimulationConfig, SimulationError, SimulationOutcome,
};
pub use policy::{PolicyConfig, SettlementChoice, SettlementPolicy};
pub use rng::RngManager;

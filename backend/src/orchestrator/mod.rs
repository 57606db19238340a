//! Orchestrator - population-level simulation harness
//!
//! See `engine.rs` for the run loop, `partition.rs` for chunking and
//! `report.rs` for the exported run summary.

pub mod engine;
pub mod partition;
pub mod report;

pub use engine::{
    BrokerFailure, Simulation, SimulationConfig, SimulationError, SimulationOutcome,
};
pub use partition::{partition_events, Partition};
pub use report::{compute_config_hash, FailureRecord, RunReport};

//! Settlement Policy Module
//!
//! Decides, once per trade event, which settlement bucket the event goes to
//! and whether the broker runs its netting pass afterwards.
//!
//! # Policy Interface
//!
//! All policies implement the `SettlementPolicy` trait:
//! ```rust
//! use netting_simulator_core::policy::{SettlementChoice, SettlementPolicy};
//! use netting_simulator_core::{BucketIndex, RngManager, SettlementDomain};
//!
//! struct AlwaysNative;
//!
//! impl SettlementPolicy for AlwaysNative {
//!     fn choose(
//!         &mut self,
//!         native: BucketIndex,
//!         _domain: &SettlementDomain,
//!         _rng: &mut RngManager,
//!     ) -> SettlementChoice {
//!         SettlementChoice::NativeBucketNetting { bucket: native }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "always_native"
//!     }
//! }
//! ```
//!
//! Available policies:
//! 1. **StochasticOverride**: with probability p settle in a uniformly random
//!    bucket without netting, otherwise net from the native bucket
//! 2. **NettingOnly**: StochasticOverride with p = 0

use crate::domain::{BucketIndex, SettlementDomain};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

pub mod stochastic;

pub use stochastic::StochasticOverridePolicy;

/// Where an event settles and how it is booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementChoice {
    /// Post the full impact to a randomly drawn bucket; no netting pass
    RandomOverride { bucket: BucketIndex },

    /// Post to the event's native bucket, then net against earlier buckets
    NativeBucketNetting { bucket: BucketIndex },
}

impl SettlementChoice {
    /// Bucket the event is booked into
    pub fn bucket(&self) -> BucketIndex {
        match self {
            SettlementChoice::RandomOverride { bucket }
            | SettlementChoice::NativeBucketNetting { bucket } => *bucket,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, SettlementChoice::RandomOverride { .. })
    }
}

/// Per-event settlement decision
///
/// Implementations must be `Send` so brokers can be driven on worker threads.
pub trait SettlementPolicy: Send {
    /// Choose a settlement for an event whose native bucket is `native`
    fn choose(
        &mut self,
        native: BucketIndex,
        domain: &SettlementDomain,
        rng: &mut RngManager,
    ) -> SettlementChoice;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

/// Serializable policy selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Random override with the given probability, else earliest-first netting
    StochasticOverride { override_probability: f64 },

    /// Always net from the native bucket
    NettingOnly,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::StochasticOverride {
            override_probability: StochasticOverridePolicy::DEFAULT_OVERRIDE_PROBABILITY,
        }
    }
}

impl PolicyConfig {
    /// Reject probabilities outside [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        match self {
            PolicyConfig::StochasticOverride {
                override_probability,
            } if !(0.0..=1.0).contains(override_probability) => Err(format!(
                "override_probability must be within [0, 1], got {}",
                override_probability
            )),
            _ => Ok(()),
        }
    }

    /// Instantiate a fresh policy for one broker
    pub fn build(&self) -> Box<dyn SettlementPolicy> {
        match self {
            PolicyConfig::StochasticOverride {
                override_probability,
            } => Box::new(StochasticOverridePolicy::new(*override_probability)),
            PolicyConfig::NettingOnly => Box::new(StochasticOverridePolicy::new(0.0)),
        }
    }
}

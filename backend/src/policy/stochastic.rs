//! Stochastic override policy
//!
//! Models settlement-period flexibility picked at random rather than
//! optimally: with probability `p` the event is pinned to a uniformly drawn
//! bucket (native bucket included), otherwise it settles in its native
//! bucket and the broker nets it against earlier obligations.

use super::{SettlementChoice, SettlementPolicy};
use crate::domain::{BucketIndex, SettlementDomain};
use crate::rng::RngManager;

/// Random settlement override with fixed probability
///
/// # Example
///
/// ```
/// use netting_simulator_core::policy::{SettlementChoice, SettlementPolicy, StochasticOverridePolicy};
/// use netting_simulator_core::{BucketIndex, RngManager, SettlementDomain};
///
/// let mut policy = StochasticOverridePolicy::new(0.0);
/// let mut rng = RngManager::new(1);
/// let domain = SettlementDomain::default();
///
/// let choice = policy.choose(BucketIndex(3), &domain, &mut rng);
/// assert_eq!(choice, SettlementChoice::NativeBucketNetting { bucket: BucketIndex(3) });
/// ```
#[derive(Debug, Clone)]
pub struct StochasticOverridePolicy {
    override_probability: f64,
}

impl StochasticOverridePolicy {
    pub const DEFAULT_OVERRIDE_PROBABILITY: f64 = 0.2;

    pub fn new(override_probability: f64) -> Self {
        Self {
            override_probability,
        }
    }

    pub fn override_probability(&self) -> f64 {
        self.override_probability
    }
}

impl Default for StochasticOverridePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OVERRIDE_PROBABILITY)
    }
}

impl SettlementPolicy for StochasticOverridePolicy {
    fn choose(
        &mut self,
        native: BucketIndex,
        domain: &SettlementDomain,
        rng: &mut RngManager,
    ) -> SettlementChoice {
        if rng.chance(self.override_probability) {
            SettlementChoice::RandomOverride {
                bucket: BucketIndex(rng.choose_index(domain.len())),
            }
        } else {
            SettlementChoice::NativeBucketNetting { bucket: native }
        }
    }

    fn name(&self) -> &'static str {
        "stochastic_override"
    }
}

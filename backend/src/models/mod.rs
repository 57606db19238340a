//! Domain models for the netting simulator

pub mod broker;
pub mod trade;

// Re-exports
pub use broker::{
    Broker, BrokerError, BrokerId, BrokerSnapshot, InvalidEventPolicy, NettingStats,
    ResidualMode,
};
pub use trade::{Side, TradeEvent, TradeEventError};

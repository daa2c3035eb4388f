//! Resolution pipeline: the strategy chain orchestrator and its counters

pub mod chain;
pub mod stats;

pub use chain::{NO_STRATEGY_SUCCEEDED, StrategyChain};
pub use stats::{ResolutionStats, StatsSnapshot, StrategyCounters};

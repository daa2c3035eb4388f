use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::StrategyOutcome;

/// Counters for one strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub not_applicable: u64,
}

/// Serializable snapshot of [`ResolutionStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_resolutions: u64,
    pub successful_resolutions: u64,
    pub strategies: BTreeMap<String, StrategyCounters>,
}

/// In-process resolution counters, shared by all requests
#[derive(Debug, Default)]
pub struct ResolutionStats {
    inner: Mutex<StatsSnapshot>,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters stay usable after a panic elsewhere poisoned the lock
    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_outcome(&self, strategy: &str, outcome: &StrategyOutcome) {
        let mut stats = self.lock();
        let counters = stats.strategies.entry(strategy.to_string()).or_default();
        match outcome {
            StrategyOutcome::NotApplicable => counters.not_applicable += 1,
            StrategyOutcome::Success(_) => {
                counters.attempts += 1;
                counters.successes += 1;
            }
            StrategyOutcome::Failed(_) => {
                counters.attempts += 1;
                counters.failures += 1;
            }
        }
    }

    pub fn record_resolution(&self, success: bool) {
        let mut stats = self.lock();
        stats.total_resolutions += 1;
        if success {
            stats.successful_resolutions += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().clone()
    }
}

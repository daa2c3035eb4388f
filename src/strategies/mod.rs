//! Extraction strategies
//!
//! Each strategy is a self-contained way of turning a watch page into a
//! stream URL. Strategies fold every error of their own into a
//! [`StrategyOutcome`]; nothing is raised past [`Strategy::attempt`].

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{ResolutionRequest, StrategyOutcome};

pub mod external;
pub mod pattern;

pub use external::ExternalResolver;
pub use pattern::PatternExtractor;

/// Strategy identifier reported for the external resolver
pub const RESOLVER_STRATEGY_ID: &str = "resolver";
/// Strategy identifier reported for the browser simulation engine
pub const BROWSER_STRATEGY_ID: &str = "browser";

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Identifier reported as `plan_used`
    fn id(&self) -> &str;

    /// Domain gate. Strategies without a precondition apply to everything.
    fn applies_to(&self, _request: &ResolutionRequest) -> bool {
        true
    }

    /// Total wall-clock time the orchestrator allows for one attempt
    fn budget(&self) -> Duration;

    async fn attempt(&self, request: &ResolutionRequest) -> StrategyOutcome;
}

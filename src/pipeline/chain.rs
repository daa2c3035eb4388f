use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use super::stats::ResolutionStats;
use crate::browser::{BrowserLauncher, BrowserSimulator, SimulationSettings};
use crate::config::Config;
use crate::errors::{AppResult, FailureReason};
use crate::models::{ResolutionRequest, ResolutionResult, StrategyOutcome};
use crate::rules::RuleTable;
use crate::strategies::{ExternalResolver, PatternExtractor, Strategy};
use crate::utils::http_client::PageFetcher;
use crate::utils::process::ProcessRunner;
use crate::utils::url::UrlUtils;

/// Message reported when no strategy produced a failure worth surfacing
pub const NO_STRATEGY_SUCCEEDED: &str = "no strategy succeeded";

/// Ordered strategy chain. Strategies run one at a time, in order, and the
/// first success ends the resolution.
pub struct StrategyChain {
    strategies: Vec<Arc<dyn Strategy>>,
    stats: Arc<ResolutionStats>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            strategies,
            stats: Arc::new(ResolutionStats::new()),
        }
    }

    /// Build the standard chain: external resolver, then one pattern
    /// extractor per configured rule in declaration order, then the browser.
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        runner: Arc<dyn ProcessRunner>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> AppResult<Self> {
        let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();

        if config.resolver.enabled {
            strategies.push(Arc::new(ExternalResolver::new(
                config.resolver.clone(),
                config.http.user_agent.clone(),
                runner,
            )));
        }

        for rule in RuleTable::from_config(&config.rules)?.into_rules() {
            strategies.push(Arc::new(PatternExtractor::new(
                rule,
                Arc::clone(&fetcher),
                config.http.pattern_budget,
            )));
        }

        if config.browser.enabled {
            strategies.push(Arc::new(BrowserSimulator::new(
                launcher,
                SimulationSettings::from_config(&config.browser),
            )));
        }

        Ok(Self::new(strategies))
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn stats(&self) -> &Arc<ResolutionStats> {
        &self.stats
    }

    /// Parse `page_url` and resolve it. Only a malformed URL is an error.
    pub async fn resolve(&self, page_url: &str) -> AppResult<ResolutionResult> {
        let request = ResolutionRequest::parse(page_url)?;
        Ok(self.handle(&request).await)
    }

    /// Resolve one request. Never fails: every strategy error is folded into
    /// the returned result.
    pub async fn handle(&self, request: &ResolutionRequest) -> ResolutionResult {
        let span = info_span!(
            "resolve",
            request_id = %request.id(),
            url = %UrlUtils::redact_tokens(request.as_str())
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &ResolutionRequest) -> ResolutionResult {
        let started = Instant::now();
        let mut reported: Option<(String, FailureReason)> = None;

        for strategy in &self.strategies {
            let id = strategy.id();
            let outcome = if strategy.applies_to(request) {
                self.attempt(strategy.as_ref(), request).await
            } else {
                StrategyOutcome::NotApplicable
            };
            self.stats.record_outcome(id, &outcome);

            match outcome {
                StrategyOutcome::Success(link) => {
                    info!(
                        strategy = id,
                        kind = %link.kind,
                        stream = %UrlUtils::redact_tokens(&link.url),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Resolved stream"
                    );
                    self.stats.record_resolution(true);
                    return ResolutionResult::success(request.original(), link, id);
                }
                StrategyOutcome::NotApplicable => {
                    debug!(strategy = id, "Strategy not applicable");
                }
                StrategyOutcome::Failed(reason) => {
                    if reason.is_expected() {
                        debug!(strategy = id, reason = reason.kind(), "{}", reason);
                    } else {
                        warn!(strategy = id, reason = reason.kind(), "{}", reason);
                    }

                    let more_specific = reported
                        .as_ref()
                        .is_none_or(|(_, current)| reason.specificity() >= current.specificity());
                    if more_specific {
                        reported = Some((id.to_string(), reason));
                    }
                }
            }
        }

        self.stats.record_resolution(false);
        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            "No strategy resolved a stream"
        );

        match reported {
            Some((id, reason)) => {
                ResolutionResult::failure(request.original(), reason.to_string(), Some(id))
            }
            None => ResolutionResult::failure(
                request.original(),
                NO_STRATEGY_SUCCEEDED.to_string(),
                None,
            ),
        }
    }

    async fn attempt(&self, strategy: &dyn Strategy, request: &ResolutionRequest) -> StrategyOutcome {
        let budget = strategy.budget();
        debug!(
            strategy = strategy.id(),
            budget = %humantime::format_duration(budget),
            "Starting strategy"
        );

        match tokio::time::timeout(budget, strategy.attempt(request)).await {
            Ok(outcome) => outcome,
            Err(_) => StrategyOutcome::Failed(FailureReason::BudgetExceeded {
                strategy: strategy.id().to_string(),
                budget,
            }),
        }
    }
}

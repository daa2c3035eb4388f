use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{RESOLVER_STRATEGY_ID, Strategy};
use crate::config::ResolverConfig;
use crate::errors::FailureReason;
use crate::models::{CandidateLink, ResolutionRequest, StrategyOutcome};
use crate::utils::process::ProcessRunner;
use crate::utils::url::UrlUtils;

/// Adapter around an out-of-process metadata extractor (yt-dlp compatible)
pub struct ExternalResolver {
    config: ResolverConfig,
    user_agent: String,
    runner: Arc<dyn ProcessRunner>,
}

impl ExternalResolver {
    pub fn new(config: ResolverConfig, user_agent: String, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config,
            user_agent,
            runner,
        }
    }

    /// Command-line arguments for resolving `page_url`
    pub fn build_args(&self, page_url: &str) -> Vec<String> {
        vec![
            "--get-url".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            self.config.format.clone(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout.as_secs().max(1).to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            page_url.to_string(),
        ]
    }
}

/// First stdout line that begins with an http(s) scheme and parses as a URL.
pub fn parse_first_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| UrlUtils::has_http_scheme(line))
        .find(|line| Url::parse(line).is_ok())
        .map(str::to_string)
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
}

#[async_trait]
impl Strategy for ExternalResolver {
    fn id(&self) -> &str {
        RESOLVER_STRATEGY_ID
    }

    fn budget(&self) -> Duration {
        self.config.budget
    }

    async fn attempt(&self, request: &ResolutionRequest) -> StrategyOutcome {
        let args = self.build_args(request.as_str());
        let output = match self
            .runner
            .run(&self.config.command, &args, self.config.process_timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => return StrategyOutcome::Failed(e.into()),
        };

        if !output.success {
            let code = output
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return StrategyOutcome::Failed(FailureReason::external_tool(format!(
                "exited with status {code}: {}",
                first_line(&output.stderr)
            )));
        }

        match parse_first_url(&output.stdout) {
            Some(url) => {
                debug!(url = %UrlUtils::redact_tokens(&url), "Resolver produced a URL");
                StrategyOutcome::Success(CandidateLink::from_clean(url))
            }
            None => StrategyOutcome::Failed(FailureReason::external_tool(format!(
                "output did not contain a URL: {}",
                first_line(&output.stdout)
            ))),
        }
    }
}

use async_trait::async_trait;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Strategy;
use crate::errors::FailureReason;
use crate::models::{CandidateLink, ResolutionRequest, StrategyOutcome};
use crate::rules::{ExtractionRule, first_match};
use crate::utils::http_client::PageFetcher;
use crate::utils::url::UrlUtils;

/// Fetches a page and applies one extraction rule to it, following the
/// rule's hop patterns through intermediate pages first.
pub struct PatternExtractor {
    id: String,
    rule: ExtractionRule,
    fetcher: Arc<dyn PageFetcher>,
    budget: Duration,
}

impl PatternExtractor {
    pub fn new(rule: ExtractionRule, fetcher: Arc<dyn PageFetcher>, budget: Duration) -> Self {
        Self {
            id: format!("pattern:{}", rule.name()),
            rule,
            fetcher,
            budget,
        }
    }

    fn not_found(&self, hop: usize) -> StrategyOutcome {
        debug!(rule = self.rule.name(), hop, "Pattern found no match");
        StrategyOutcome::Failed(FailureReason::PatternNotFound {
            rule: self.rule.name().to_string(),
            hop,
        })
    }

    async fn fetch(&self, url: &str, referer: Option<&Url>) -> Result<String, FailureReason> {
        self.fetcher
            .fetch_text(url, referer.map(|r| r.to_string()))
            .await
            .map_err(FailureReason::from)
    }
}

#[async_trait]
impl Strategy for PatternExtractor {
    fn id(&self) -> &str {
        &self.id
    }

    fn applies_to(&self, request: &ResolutionRequest) -> bool {
        self.rule.applies_to(request.url())
    }

    fn budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, request: &ResolutionRequest) -> StrategyOutcome {
        if !self.applies_to(request) {
            return StrategyOutcome::NotApplicable;
        }

        let mut current = request.url().clone();
        let mut body = match self.fetch(current.as_str(), None).await {
            Ok(body) => body,
            Err(reason) => return StrategyOutcome::Failed(reason),
        };

        for (hop, pattern) in self.rule.hop_patterns().iter().enumerate() {
            let Some(captured) = first_match(slice::from_ref(pattern), &body) else {
                return self.not_found(hop);
            };

            let cleaned = UrlUtils::sanitize_captured(&captured);
            let Some(next) = UrlUtils::resolve_against(&current, &cleaned)
                .and_then(|resolved| Url::parse(&resolved).ok())
            else {
                return self.not_found(hop);
            };

            debug!(
                rule = self.rule.name(),
                hop,
                next = %UrlUtils::redact_tokens(next.as_str()),
                "Following intermediate page"
            );

            body = match self.fetch(next.as_str(), Some(&current)).await {
                Ok(body) => body,
                Err(reason) => return StrategyOutcome::Failed(reason),
            };
            current = next;
        }

        let Some(captured) = self.rule.find_stream(&body) else {
            return self.not_found(self.rule.hop_count());
        };

        let cleaned = UrlUtils::sanitize_captured(&captured);
        let link = if UrlUtils::has_http_scheme(&cleaned) {
            CandidateLink::from_clean(cleaned)
        } else {
            match UrlUtils::resolve_against(&current, &cleaned) {
                Some(resolved) => CandidateLink::from_clean(resolved),
                None => return self.not_found(self.rule.hop_count()),
            }
        };

        StrategyOutcome::Success(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainMatch, RuleConfig};
    use crate::errors::FetchError;
    use crate::models::LinkKind;
    use crate::utils::http_client::MockPageFetcher;
    use crate::strategies::Strategy;
    use mockall::predicate::{always, eq};
    use proptest::prelude::*;

    fn rule(hop_patterns: &[&str], patterns: &[&str]) -> ExtractionRule {
        ExtractionRule::compile(&RuleConfig {
            name: "site".to_string(),
            domains: vec![DomainMatch::Host("watch.example".to_string())],
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            hop_patterns: hop_patterns.iter().map(|p| p.to_string()).collect(),
        })
        .unwrap()
    }

    fn extractor(rule: ExtractionRule, fetcher: MockPageFetcher) -> PatternExtractor {
        PatternExtractor::new(rule, Arc::new(fetcher), Duration::from_secs(5))
    }

    fn request(url: &str) -> ResolutionRequest {
        ResolutionRequest::parse(url).unwrap()
    }

    #[tokio::test]
    async fn test_single_hop_match() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_text()
            .with(eq("https://watch.example/v/1"), eq(None))
            .times(1)
            .returning(|_, _| Ok(r#"player.src = "https:\/\/cdn.example\/v1\/index.m3u8";"#.to_string()));

        let strategy = extractor(rule(&[], &[r#"src = "([^"]+)""#]), fetcher);
        let outcome = strategy.attempt(&request("https://watch.example/v/1")).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Success(CandidateLink {
                url: "https://cdn.example/v1/index.m3u8".to_string(),
                kind: LinkKind::Hls,
            })
        );
        assert_eq!(strategy.id(), "pattern:site");
    }

    #[tokio::test]
    async fn test_two_hop_resolves_relative_url_and_sends_referer() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_text()
            .with(eq("https://watch.example/v/1"), eq(None))
            .returning(|_, _| Ok(r#"<iframe src="//embed.example/e/77"></iframe>"#.to_string()));
        fetcher
            .expect_fetch_text()
            .with(
                eq("https://embed.example/e/77"),
                eq(Some("https://watch.example/v/1".to_string())),
            )
            .returning(|_, _| Ok(r#"file: "https://cdn.example/movie.mp4""#.to_string()));

        let strategy = extractor(
            rule(&[r#"<iframe src="([^"]+)""#], &[r#"file: "([^"]+)""#]),
            fetcher,
        );
        let outcome = strategy.attempt(&request("https://watch.example/v/1")).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Success(CandidateLink {
                url: "https://cdn.example/movie.mp4".to_string(),
                kind: LinkKind::Progressive,
            })
        );
    }

    #[tokio::test]
    async fn test_missing_hop_reports_hop_index() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_text()
            .returning(|_, _| Ok("<html>no frames</html>".to_string()));

        let strategy = extractor(rule(&[r#"<iframe src="([^"]+)""#], &["x"]), fetcher);
        let outcome = strategy.attempt(&request("https://watch.example/v/1")).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Failed(FailureReason::PatternNotFound {
                rule: "site".to_string(),
                hop: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_http_failure_is_http_error() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch_text().returning(|url, _| {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 403,
            })
        });

        let strategy = extractor(rule(&[], &["x"]), fetcher);
        let outcome = strategy.attempt(&request("https://watch.example/v/1")).await;

        assert!(matches!(
            outcome,
            StrategyOutcome::Failed(FailureReason::HttpError {
                status: Some(403),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_other_domains_are_not_applicable() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch_text().with(always(), always()).never();

        let strategy = extractor(rule(&[], &["x"]), fetcher);
        let outcome = strategy.attempt(&request("https://example.com/watch/123")).await;

        assert_eq!(outcome, StrategyOutcome::NotApplicable);
    }

    proptest! {
        #[test]
        fn prop_extraction_is_idempotent(prefix in "[a-z <>=\"]{0,64}", token in "[a-z0-9]{1,16}") {
            let body = format!("{prefix} https://hls2.cdn.example/p/master.m3u8?t={token} tail");
            let run = |body: String| {
                let mut fetcher = MockPageFetcher::new();
                fetcher.expect_fetch_text().returning(move |_, _| Ok(body.clone()));
                let strategy = extractor(
                    rule(&[], &[crate::config::defaults::GOSTREAM_PATTERN]),
                    fetcher,
                );
                tokio_test::block_on(strategy.attempt(&request("https://watch.example/v/1")))
            };

            let first = run(body.clone());
            let second = run(body);
            prop_assert!(first.is_success());
            prop_assert_eq!(first, second);
        }
    }
}

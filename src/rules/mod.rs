//! Declarative extraction rule table
//!
//! A rule pairs a domain predicate with one or more regular expressions and
//! an optional chain of hop patterns. Rules are compiled once at startup and
//! shared read-only between requests.

use regex::Regex;
use url::Url;

use crate::config::{DomainMatch, RuleConfig};
use crate::errors::{AppError, AppResult};
use crate::utils::url::UrlUtils;

/// Compiled form of a [`RuleConfig`]
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    name: String,
    domains: Vec<DomainMatch>,
    patterns: Vec<Regex>,
    hop_patterns: Vec<Regex>,
}

impl ExtractionRule {
    pub fn compile(config: &RuleConfig) -> AppResult<Self> {
        let compile_all = |sources: &[String]| -> AppResult<Vec<Regex>> {
            sources
                .iter()
                .map(|source| {
                    Regex::new(source).map_err(|e| {
                        AppError::configuration(format!(
                            "rule '{}' has an invalid pattern: {e}",
                            config.name
                        ))
                    })
                })
                .collect()
        };

        Ok(Self {
            name: config.name.clone(),
            domains: config.domains.clone(),
            patterns: compile_all(&config.patterns)?,
            hop_patterns: compile_all(&config.hop_patterns)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of intermediate pages fetched before the final patterns apply
    pub fn hop_count(&self) -> usize {
        self.hop_patterns.len()
    }

    pub fn hop_patterns(&self) -> &[Regex] {
        &self.hop_patterns
    }

    /// Whether any of the rule's domain predicates matches `page_url`
    pub fn applies_to(&self, page_url: &Url) -> bool {
        let host = page_url.host_str().unwrap_or_default();
        let full = page_url.as_str().to_ascii_lowercase();

        self.domains.iter().any(|domain| match domain {
            DomainMatch::Host(expected) => UrlUtils::host_matches(host, expected),
            DomainMatch::Contains(marker) => full.contains(&marker.to_ascii_lowercase()),
        })
    }

    /// Earliest match of the final patterns in `body`
    pub fn find_stream(&self, body: &str) -> Option<String> {
        first_match(&self.patterns, body)
    }
}

/// Earliest match across `patterns` in document order.
///
/// Capture group 1 is returned when the pattern declares one, the whole match
/// otherwise. When two patterns match, the one starting first in the body
/// wins; ties go to the pattern declared first.
pub fn first_match(patterns: &[Regex], body: &str) -> Option<String> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let captures = pattern.captures(body)?;
            let matched = captures.get(1).or_else(|| captures.get(0))?;
            Some((matched.start(), matched.as_str()))
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, text)| text.to_string())
}

/// The ordered set of compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<ExtractionRule>,
}

impl RuleTable {
    pub fn from_config(configs: &[RuleConfig]) -> AppResult<Self> {
        let rules = configs
            .iter()
            .map(ExtractionRule::compile)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn into_rules(self) -> Vec<ExtractionRule> {
        self.rules
    }
}

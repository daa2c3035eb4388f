//! Domain types shared by strategies, the orchestrator and the web layer.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use url::Url;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, FailureReason};

/// One inbound watch-page URL. Immutable for the lifetime of a resolution.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    id: Uuid,
    original: String,
    page_url: Url,
}

impl ResolutionRequest {
    /// Parse a raw page URL. Only absolute http(s) URLs are accepted.
    pub fn parse(raw: &str) -> AppResult<Self> {
        Self::parse_with_id(raw, Uuid::new_v4())
    }

    /// Like [`parse`](Self::parse), keeping an id minted upstream (the HTTP
    /// request id) so both log scopes correlate.
    pub fn parse_with_id(raw: &str, id: Uuid) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("url must not be empty"));
        }

        let page_url = Url::parse(trimmed)
            .map_err(|e| AppError::validation(format!("url is not well-formed: {e}")))?;

        match page_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AppError::validation(format!(
                    "unsupported url scheme '{other}'"
                )));
            }
        }

        if page_url.host_str().is_none() {
            return Err(AppError::validation("url has no host"));
        }

        Ok(Self {
            id,
            original: trimmed.to_string(),
            page_url,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.page_url
    }

    pub fn as_str(&self) -> &str {
        self.page_url.as_str()
    }

    /// The URL as the caller sent it, before normalisation
    pub fn original(&self) -> &str {
        &self.original
    }
}

/// Classification of a resolved stream URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkKind {
    /// HLS manifest (`.m3u8`)
    Hls,
    /// Single progressive media file
    Progressive,
}

impl LinkKind {
    /// Infer the kind from the URL text. Anything that is not a manifest is
    /// treated as a progressive file.
    pub fn classify(url: &str) -> Self {
        if url.to_ascii_lowercase().contains(".m3u8") {
            Self::Hls
        } else {
            Self::Progressive
        }
    }
}

/// A resolved stream URL plus its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub kind: LinkKind,
}

impl CandidateLink {
    /// Build a candidate from an already sanitised absolute URL
    pub fn from_clean(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = LinkKind::classify(&url);
        Self { url, kind }
    }
}

/// A request seen by the browser observer that satisfied the stream predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkObservation {
    pub url: String,
    pub kind: LinkKind,
}

impl From<NetworkObservation> for CandidateLink {
    fn from(observation: NetworkObservation) -> Self {
        Self {
            url: observation.url,
            kind: observation.kind,
        }
    }
}

/// Result of running one strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Success(CandidateLink),
    NotApplicable,
    Failed(FailureReason),
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResolutionStatus {
    Success,
    Error,
}

/// Final value for one resolution. Built once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    status: ResolutionStatus,
    original_url: String,
    link: Option<CandidateLink>,
    plan_used: Option<String>,
    message: Option<String>,
}

impl ResolutionResult {
    pub fn success(original_url: &str, link: CandidateLink, plan_used: &str) -> Self {
        Self {
            status: ResolutionStatus::Success,
            original_url: original_url.to_string(),
            link: Some(link),
            plan_used: Some(plan_used.to_string()),
            message: None,
        }
    }

    pub fn failure(original_url: &str, message: String, plan_used: Option<String>) -> Self {
        Self {
            status: ResolutionStatus::Error,
            original_url: original_url.to_string(),
            link: None,
            plan_used,
            message: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResolutionStatus::Success
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn link(&self) -> Option<&CandidateLink> {
        self.link.as_ref()
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.url.as_str())
    }

    pub fn plan_used(&self) -> Option<&str> {
        self.plan_used.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

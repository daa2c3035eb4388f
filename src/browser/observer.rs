//! Network request observer
//!
//! Watches the page's outgoing requests for the first one that looks like a
//! stream and hands it to exactly one waiting resolution through a oneshot
//! channel. The observer never blocks or modifies requests.

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

use super::RequestStream;
use crate::config::BrowserConfig;
use crate::models::{LinkKind, NetworkObservation};
use crate::utils::url::UrlUtils;

/// Decides whether an observed request URL is a stream worth reporting
#[derive(Debug, Clone)]
pub struct StreamRequestPredicate {
    manifest_markers: Vec<String>,
    progressive_markers: Vec<String>,
    excluded_markers: Vec<String>,
}

impl StreamRequestPredicate {
    pub fn new(manifest: &[String], progressive: &[String], excluded: &[String]) -> Self {
        let lower = |markers: &[String]| -> Vec<String> {
            markers
                .iter()
                .filter(|m| !m.is_empty())
                .map(|m| m.to_ascii_lowercase())
                .collect()
        };
        Self {
            manifest_markers: lower(manifest),
            progressive_markers: lower(progressive),
            excluded_markers: lower(excluded),
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(
            &config.manifest_markers,
            &config.progressive_markers,
            &config.excluded_markers,
        )
    }

    /// Kind of stream `url` points at, or `None` if it does not qualify.
    /// Exclusion markers win over everything else.
    pub fn classify(&self, url: &str) -> Option<LinkKind> {
        if !UrlUtils::has_http_scheme(url) {
            return None;
        }

        let lower = url.to_ascii_lowercase();
        if self.excluded_markers.iter().any(|m| lower.contains(m)) {
            return None;
        }

        if self.manifest_markers.iter().any(|m| lower.contains(m)) {
            Some(LinkKind::Hls)
        } else if self.progressive_markers.iter().any(|m| lower.contains(m)) {
            Some(LinkKind::Progressive)
        } else {
            None
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.classify(url).is_some()
    }

    pub fn observe(&self, url: &str) -> Option<NetworkObservation> {
        self.classify(url).map(|kind| NetworkObservation {
            url: url.to_string(),
            kind,
        })
    }
}

impl Default for StreamRequestPredicate {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// Background observer task. Aborted when dropped.
#[derive(Debug)]
pub struct ObserverHandle {
    task: JoinHandle<()>,
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start consuming `requests`, fulfilling the returned receiver with the
/// first request that satisfies `predicate`. Later matches are ignored.
pub fn spawn_observer(
    mut requests: RequestStream,
    predicate: StreamRequestPredicate,
) -> (ObserverHandle, oneshot::Receiver<NetworkObservation>) {
    let (tx, rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        while let Some(url) = requests.next().await {
            if let Some(observation) = predicate.observe(&url) {
                let _ = tx.send(observation);
                return;
            }
            trace!("Ignoring request {}", UrlUtils::redact_tokens(&url));
        }
    });

    (ObserverHandle { task }, rx)
}

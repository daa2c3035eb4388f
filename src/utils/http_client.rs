use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tracing::debug;

use crate::config::HttpConfig;
use crate::config::defaults::DEFAULT_ACCEPT;
use crate::errors::{AppError, AppResult, FetchError};
use crate::utils::url::UrlUtils;

/// Page fetch collaborator used by the pattern extractor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    async fn fetch_text(&self, url: &str, referer: Option<String>) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher presenting a desktop browser header set
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(config: &HttpConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).map_err(|e| {
                AppError::configuration(format!("invalid http.accept_language: {e}"))
            })?,
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str, referer: Option<String>) -> Result<String, FetchError> {
        debug!("Fetching page from: {}", UrlUtils::redact_tokens(url));

        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: UrlUtils::redact_tokens(&e.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("Failed to read response: {e}"),
        })?;

        debug!("Fetched {} characters of page content", body.len());
        Ok(body)
    }
}

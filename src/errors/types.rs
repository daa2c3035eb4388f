//! Error type definitions for the stream resolver
//!
//! Two families live here. `AppError` and `WebError` are ordinary errors
//! that can surface at the process or HTTP boundary. `FailureReason` is the
//! taxonomy a strategy folds its own problems into; it never propagates past
//! the strategy boundary and only ever travels inside a `StrategyOutcome`.

use std::time::Duration;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (bad TOML, invalid regex, out-of-range timeouts)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Validation errors for inbound requests
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Listener could not be bound
    #[error("Failed to bind to {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Why a single strategy did not produce a candidate link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Non-2xx response or transport failure on a page fetch
    #[error("HTTP error fetching {url}: {message}")]
    HttpError {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// A rule's regex had no match. Expected and frequent.
    #[error("Pattern '{rule}' found no match at hop {hop}")]
    PatternNotFound { rule: String, hop: usize },

    /// Non-zero exit, timeout or malformed output from the external resolver
    #[error("External resolver failed: {message}")]
    ExternalToolError { message: String },

    /// The browser could not load the page
    #[error("Navigation failed: {message}")]
    NavigationError { message: String },

    /// Click target missing or click dispatch failed. Never fatal.
    #[error("Interaction failed: {message}")]
    InteractionError { message: String },

    /// Deadline elapsed without a qualifying network request
    #[error("No stream request observed within {waited:?}")]
    ObservationTimeout { waited: Duration },

    /// The automation session failed to start or crashed
    #[error("Browser automation failed: {message}")]
    CriticalAutomationError { message: String },

    /// The strategy overran the budget the orchestrator gave it
    #[error("Strategy '{strategy}' exceeded its {budget:?} budget")]
    BudgetExceeded { strategy: String, budget: Duration },
}

impl FailureReason {
    /// Rank used when choosing which failure to report for a failed resolution.
    /// Higher is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::CriticalAutomationError { .. } => 7,
            Self::NavigationError { .. } => 6,
            Self::HttpError { .. } => 5,
            Self::ExternalToolError { .. } => 4,
            Self::BudgetExceeded { .. } => 3,
            Self::ObservationTimeout { .. } => 2,
            Self::InteractionError { .. } => 1,
            Self::PatternNotFound { .. } => 0,
        }
    }

    /// Short machine-readable name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError { .. } => "http_error",
            Self::PatternNotFound { .. } => "pattern_not_found",
            Self::ExternalToolError { .. } => "external_tool_error",
            Self::NavigationError { .. } => "navigation_error",
            Self::InteractionError { .. } => "interaction_error",
            Self::ObservationTimeout { .. } => "observation_timeout",
            Self::CriticalAutomationError { .. } => "critical_automation_error",
            Self::BudgetExceeded { .. } => "budget_exceeded",
        }
    }

    /// Whether this failure is routine and should not be logged as a warning
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::PatternNotFound { .. } | Self::ObservationTimeout { .. }
        )
    }

    pub fn external_tool<S: Into<String>>(message: S) -> Self {
        Self::ExternalToolError {
            message: message.into(),
        }
    }

    pub fn navigation<S: Into<String>>(message: S) -> Self {
        Self::NavigationError {
            message: message.into(),
        }
    }

    pub fn critical<S: Into<String>>(message: S) -> Self {
        Self::CriticalAutomationError {
            message: message.into(),
        }
    }
}

/// Errors from the page fetch collaborator
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl From<FetchError> for FailureReason {
    fn from(error: FetchError) -> Self {
        match &error {
            FetchError::Status { url, status } => FailureReason::HttpError {
                url: url.clone(),
                status: Some(*status),
                message: error.to_string(),
            },
            FetchError::Transport { url, message } => FailureReason::HttpError {
                url: url.clone(),
                status: None,
                message: message.clone(),
            },
        }
    }
}

/// Errors from the subprocess collaborator
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

impl From<ProcessError> for FailureReason {
    fn from(error: ProcessError) -> Self {
        FailureReason::external_tool(error.to_string())
    }
}

/// Errors from the browser automation collaborator
#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

//! Centralized error handling for the stream resolver
//!
//! # Error Categories
//!
//! - **Application Errors**: configuration, validation and startup failures
//! - **Strategy Failures**: the `FailureReason` taxonomy carried inside a
//!   `StrategyOutcome`; these never escape the orchestrator
//! - **Collaborator Errors**: page fetch, subprocess and browser automation
//!   failures, mapped into `FailureReason` at the strategy boundary

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

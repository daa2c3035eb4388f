//! Stream resolver
//!
//! Turns a video watch-page URL into a directly playable HLS manifest or
//! progressive media URL by running an ordered chain of strategies: an
//! external metadata extractor, declarative per-site pattern rules, and
//! finally a sandboxed browser that watches the page's network traffic.

pub mod browser;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod strategies;
pub mod utils;
pub mod web;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipeline::StrategyChain;

//! Utility modules for the stream resolver
//!
//! Reusable collaborators and helpers shared by the strategies.

pub mod http_client;
pub mod process;
pub mod url;

pub use http_client::{HttpPageFetcher, PageFetcher};
pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};

//! Web layer module
//!
//! Thin HTTP front door over the strategy chain: `POST /extract` resolves a
//! page, `GET /health` and `GET /stats` are for operators.

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::WebConfig;
use crate::errors::{AppError, AppResult, WebError};
use crate::pipeline::StrategyChain;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ErrorResponse, ExtractResponse, HealthResponse, handle_error};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<StrategyChain>,
}

impl AppState {
    pub fn new(chain: Arc<StrategyChain>) -> Self {
        Self { chain }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/extract", post(handlers::extract::extract_stream))
        .route("/health", get(handlers::health::health_check))
        .route("/stats", get(handlers::stats::get_stats))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .with_state(state)
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> AppResult<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                AppError::configuration(format!(
                    "invalid listen address {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Serve until SIGINT/SIGTERM, notifying `ready_signal` once the
    /// listener is bound (or failed to bind)
    pub async fn serve_with_signal(
        self,
        ready_signal: oneshot::Sender<Result<(), String>>,
    ) -> AppResult<()> {
        self.serve_with_cancellation(ready_signal, None).await
    }

    /// Serve with cancellation support and ready notification
    pub async fn serve_with_cancellation(
        self,
        ready_signal: oneshot::Sender<Result<(), String>>,
        cancellation_token: Option<CancellationToken>,
    ) -> AppResult<()> {
        let listener = match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                let error = WebError::Bind {
                    addr: self.addr.to_string(),
                    message: bind_error.to_string(),
                };
                let _ = ready_signal.send(Err(error.to_string()));
                return Err(error.into());
            }
        };

        let _ = ready_signal.send(Ok(()));

        let shutdown = async move {
            match cancellation_token {
                Some(token) => {
                    token.cancelled().await;
                    info!("Web server received cancellation signal, shutting down gracefully");
                }
                None => shutdown_signal().await,
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AppError::internal(format!("server error: {e}")))
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
        Err(e) => {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

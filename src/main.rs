use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stream_resolver::{
    browser::ChromiumLauncher,
    config::Config,
    pipeline::StrategyChain,
    utils::{HttpPageFetcher, TokioProcessRunner},
    web::{AppState, WebServer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "stream-resolver")]
#[command(version)]
#[command(about = "Resolves video watch pages into directly playable stream URLs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

fn init_tracing(cli: &Cli) {
    let log_filter = format!("stream_resolver={}", cli.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting stream resolver v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(Some(cli.config.as_path()))?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let fetcher = Arc::new(HttpPageFetcher::new(&config.http)?);
    let runner = Arc::new(TokioProcessRunner);
    let launcher = Arc::new(ChromiumLauncher::new(
        config.browser.clone(),
        config.http.user_agent.clone(),
    ));

    let chain = StrategyChain::from_config(&config, fetcher, runner, launcher)?;
    info!("Strategy chain: {}", chain.strategy_ids().join(" -> "));

    let web_server = WebServer::new(&config.web, AppState::new(Arc::new(chain)))?;
    info!(
        "Listening on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("Web server is ready"),
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(anyhow::anyhow!(bind_error));
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    server_handle.await?;
    info!("Stream resolver stopped");
    Ok(())
}

//! Tavern relay server binary. Wires settings, the completion backend, and
//! the HTTP/WebSocket server together.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tavern_llm::HttpCompletionBackend;
use tavern_server::metrics;
use tavern_server::server::TavernServer;

/// Tavern relay server.
#[derive(Parser, Debug)]
#[command(name = "tavern-server", about = "WebSocket relay for AI game sessions")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (defaults to `~/.tavern/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tavern_core::logging::init_subscriber(&args.log_level);

    let settings_path = args
        .settings
        .unwrap_or_else(tavern_settings::settings_path);
    let mut settings = tavern_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let api_key = tavern_settings::api_key_from_env()
        .context("no API key found; set TAVERN_API_KEY or OPENAI_API_KEY")?;
    let backend = HttpCompletionBackend::new(&settings.completion, api_key)
        .context("failed to build completion backend")?;

    let recorder = metrics::install_recorder();
    let server =
        TavernServer::new(&settings, Arc::new(backend)).with_metrics(recorder);

    let sweep_interval = Duration::from_secs(settings.relay.sweep_interval_secs);
    let sweeper = server
        .registry()
        .spawn_sweeper(sweep_interval, server.shutdown().token());

    // Settings are frozen once the server is built.
    let _ = tavern_settings::init_settings(settings);

    let (addr, serve_handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("tavern relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![serve_handle, sweeper], None)
        .await;

    tracing::info!("shutdown complete");
    Ok(())
}

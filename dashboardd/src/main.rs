use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use dashboardd::api::routes::{self, AppState};
use dashboardd::config::Config;
use dashboardd::discovery::DiscoveryClient;
use dashboardd::help::HelpCenter;
use dashboardd::price::{MarketClient, PriceCache};
use dashboardd::store::NodeStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dashboardd=info")),
        )
        .init();

    tracing::info!("Starting dashboardd");

    // Load config; without an argument the built-in defaults apply
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => Config::default(),
    };

    let store = NodeStore::open(&config.store.nodes_file).with_context(|| {
        format!("Failed to open node store at {}", config.store.nodes_file.display())
    })?;
    tracing::info!("Node store at {}", config.store.nodes_file.display());

    let http = reqwest::Client::new();
    let state = AppState {
        store: Arc::new(store),
        http: http.clone(),
        price_cache: Arc::new(PriceCache::new(config.upstream.price_ttl())),
        market: Arc::new(MarketClient::new(
            http.clone(),
            config.upstream.market_url.clone(),
        )),
        discovery: Arc::new(DiscoveryClient::new(
            http,
            config.upstream.discovery_url.clone(),
            config.upstream.discovery_timeout(),
        )),
        help: Arc::new(HelpCenter::new(config.help.content_dir.clone())),
    };
    let app = routes::router(state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("Dashboard listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();
    let _ = server_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

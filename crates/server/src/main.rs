use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_core::{
    load_config, validate_config, AdapterSet, Dispatcher, IndexerDescriptor, IndexerStore,
    ReleaseEngine, SqliteIndexerStore,
};
use scout_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);

    let store = Arc::new(
        SqliteIndexerStore::new(&config.database.path)
            .context("Failed to create indexer store")?,
    );
    let descriptors: Vec<IndexerDescriptor> =
        config.indexers.iter().map(IndexerDescriptor::from).collect();
    let imported = store
        .import(&descriptors)
        .context("Failed to import configured indexers")?;
    let enabled = store.list_enabled().map(|v| v.len()).unwrap_or(0);
    info!(imported, enabled, "Indexer registry ready");

    let adapters =
        AdapterSet::http(&config.search.user_agent).context("Failed to create indexer adapters")?;
    let store: Arc<dyn IndexerStore> = store;
    let engine = Arc::new(ReleaseEngine::new(
        Arc::clone(&store),
        adapters,
        &config.search,
    ));

    let dispatcher = Dispatcher::from_config(&config.download_clients, Arc::clone(&store))
        .context("Failed to create download clients")?;
    if dispatcher.client_names().is_empty() {
        info!("No download clients configured, grabs will be rejected");
    } else {
        info!(clients = ?dispatcher.client_names(), "Download clients ready");
    }

    let state = Arc::new(AppState::new(config.clone(), engine, Arc::new(dispatcher)));
    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let shutdown = state.shutdown_token().clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Server shutting down, cancelling in-flight searches");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convoy_core::{
    build_registry, create_authenticator, load_config, validate_config, Authenticator, BatchStore,
    PipelineManager, SqliteBatchStore,
};

use convoy_server::{create_router, metrics, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CONVOY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!(
        "Pipeline: {} stages, {} executors",
        config.stages.len(),
        config.executors.len()
    );

    // Log the config hash so deployed configs are identifiable
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("convoyd {} (config {})", VERSION, &config_hash[..16]);

    // Register metrics
    convoy_core::metrics::register(prometheus::default_registry());
    metrics::register(prometheus::default_registry());

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite batch store
    let store: Arc<dyn BatchStore> = Arc::new(
        SqliteBatchStore::new(&config.database.path).context("Failed to create batch store")?,
    );
    info!("Batch store initialized");

    // Build the executor registry from configuration
    let registry = Arc::new(
        build_registry(&config.executors).context("Failed to build executor registry")?,
    );

    // Create the pipeline manager
    let manager = Arc::new(PipelineManager::new(
        &config.engine,
        &config.stages,
        store,
        registry,
    ));

    // Any batch durably marked running has no live task after a restart;
    // reconcile to paused so two orchestrators can never race on one batch.
    let recovered = manager
        .recover_interrupted()
        .context("Startup recovery failed")?;
    if !recovered.is_empty() {
        info!(
            "Recovered {} interrupted batch(es) as paused; resume explicitly to continue",
            recovered.len()
        );
    }

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        Arc::clone(&manager),
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop orchestration tasks; each persists a paused checkpoint on its
    // way out so batches resume correctly on the next start.
    info!("Server shutting down...");
    manager.stop_all().await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

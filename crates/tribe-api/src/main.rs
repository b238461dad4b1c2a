//! tribe API Server

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tribe_api::{create_router, state::AppState};
use tribe_core::{AppConfig, LoggingConfig, MemoryStore, PgStore, Store};

#[derive(Parser)]
#[command(name = "tribe-api")]
#[command(about = "Authentication and membership gateway")]
#[command(version)]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "TRIBE_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", config.level)));

    if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.pool_size)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store
                .ensure_schema()
                .await
                .context("Failed to create database schema")?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);
    config.validate()?;

    if config.uses_development_secret() {
        tracing::warn!("Using the built-in development JWT secret; set JWT_SECRET in production");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let store = open_store(&config).await?;

    // Create application state
    let state = Arc::new(AppState::new(config, store)?);
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("tribe API server starting on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

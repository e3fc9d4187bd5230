//! loopguard-api - follow-up tracking service
//!
//! Serves the follow-up lifecycle, worklist, metrics and audit endpoints
//! over a local SQLite database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use loopguard_api::{build_router, AppState};
use loopguard_common::config::{ConfigOverrides, ConfigSource, LoopGuardConfig};
use loopguard_common::db::{init_database, SqliteAuditLogger, SqliteFollowUpStore};
use loopguard_common::services::FollowUpService;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for loopguard-api
#[derive(Parser, Debug)]
#[command(name = "loopguard-api")]
#[command(about = "Radiology follow-up tracking service")]
#[command(version)]
struct Args {
    /// TOML configuration file (also read from LOOPGUARD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "LOOPGUARD_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "LOOPGUARD_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LOOPGUARD_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = LoopGuardConfig::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            database_path: args.database,
            host: args.host,
            port: args.port,
        },
    )
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting LoopGuard API (loopguard-api) v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Missing(path) => {
            warn!("Config file {} not found, using defaults", path.display())
        }
        ConfigSource::Defaults => warn!("No configuration directory available, using defaults"),
    }

    let db_path = config.database_path().context("Failed to resolve database path")?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let store = Arc::new(SqliteFollowUpStore::new(pool.clone()));
    let audit = Arc::new(SqliteAuditLogger::new(pool));
    let service = FollowUpService::new(store, audit);

    let state = AppState::new(service, config.cors_origins.clone());
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("loopguard-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

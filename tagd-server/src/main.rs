//! TAG Diary server (tagd-server) - Main entry point
//!
//! Loads configuration, opens the database under the root folder, picks a
//! storage backend and serves the HTTP API until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tagd_common::auth::load_or_init_jwt_secret;
use tagd_common::config::{self, TomlConfig};
use tagd_common::db::init_database;
use tagd_server::storage::build_store;
use tagd_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for tagd-server
#[derive(Parser, Debug)]
#[command(name = "tagd-server")]
#[command(about = "TAG Diary family diary server")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TAGD_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and uploads
    #[arg(short, long, env = "TAGD_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Subscriber filtered by `RUST_LOG`, else the configured level
fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "{},tower_http=info,sqlx=warn",
                default_level
            ))
        });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging.level);
    info!("Starting TAG Diary server v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder);
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("Database ready at {}", db_path.display());
            pool
        }
        Err(e) => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e.into());
        }
    };

    let jwt_secret = match config.auth.secret_key.clone().filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => load_or_init_jwt_secret(&pool)
            .await
            .context("Failed to load JWT signing secret")?,
    };

    let uploads_dir = config::uploads_dir(&root_folder);
    let store = build_store(&config, &uploads_dir).context("Failed to set up file storage")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = AppState::new(pool, config, store, jwt_secret, uploads_dir);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("tagd-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
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
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

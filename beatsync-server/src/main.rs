//! beatsync-server - collaborative queue and playback coordination server

use anyhow::{Context, Result};
use beatsync_common::config::{RootFolderInitializer, TomlConfig};
use beatsync_server::config::{Args, ServerConfig};
use beatsync_server::{build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("beatsync_server=info,beatsync_common=info,tower_http=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Log build identification before any slow startup work
    info!(
        "Starting BeatSync server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file_config = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => TomlConfig::load_or_default(),
    };
    let config = ServerConfig::resolve(args, file_config);

    RootFolderInitializer::new(config.root_folder.clone())
        .ensure_directory_exists()
        .with_context(|| format!("creating root folder {}", config.root_folder.display()))?;
    info!("Database path: {}", config.database_path.display());

    let state = AppState::from_config(&config)
        .await
        .context("initializing server state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("beatsync-server listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

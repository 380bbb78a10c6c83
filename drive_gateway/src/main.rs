//! drive_gateway server - HTTP gateway to a Google Drive folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drive_gateway::api::{build_router, state::AppState};
use drive_gateway::{DriveManager, Settings};

/// HTTP gateway exposing file operations on a Google Drive folder.
#[derive(Parser)]
#[command(name = "drive_gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over config/default and config/local.
    #[arg(long, env = "DRIVE_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Path to service account JSON credentials file.
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
    credentials: Option<PathBuf>,

    /// Path to a stored user OAuth token file.
    #[arg(long, env = "GOOGLE_TOKEN_FILE")]
    token_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drive_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(credentials) = cli.credentials {
        settings.drive.credentials_file = credentials;
    }
    if let Some(token_file) = cli.token_file {
        settings.drive.token_file = token_file;
    }

    let manager = DriveManager::from_settings(&settings.drive).await;
    let app = build_router(AppState::new(manager), &settings.server);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}

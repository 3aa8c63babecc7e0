//! boxhawk-rv - photo submission review service
//!
//! Zero-config startup: resolves the root folder, loads `boxhawk-rv.toml`
//! from it, opens (or creates) the database and blob directory, backfills
//! legacy image slots once, then serves the review API.

use anyhow::{Context, Result};
use boxhawk_common::config::{RootFolderInitializer, RootFolderResolver, ServiceConfig};
use boxhawk_common::db::{backfill_legacy_image_slots, init_database};
use boxhawk_rv::storage::LocalObjectStore;
use boxhawk_rv::{build_router, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "boxhawk-rv", version, about = "BoxHawk photo submission review service")]
struct Args {
    /// Root folder holding the database, blobs and boxhawk-rv.toml
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen address, overriding bind_addr from boxhawk-rv.toml
    #[arg(long, env = "BOXHAWK_RV_BIND")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("boxhawk_rv=info,boxhawk_common=info,tower_http=info")
            }),
        )
        .init();

    info!("Starting BoxHawk review service (boxhawk-rv) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = RootFolderResolver::new("boxhawk-rv")
        .with_cli_arg(args.root_folder)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let config = ServiceConfig::load(initializer.root_folder())?;

    let db_path = initializer.database_path(&config.database_file);
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let backfilled = backfill_legacy_image_slots(&pool, &config.public_base_url).await?;
    if backfilled > 0 {
        info!("Registered {} images from legacy slots", backfilled);
    }

    let blob_root = initializer.root_folder().join(&config.blob_dir);
    let store = LocalObjectStore::new(blob_root.clone(), config.public_base_url.clone());
    store.ensure_root().await?;
    info!("Blob directory: {}", blob_root.display());

    let state = AppState::new(pool, Arc::new(store), config.default_page_size).with_media_root(blob_root);
    let app = build_router(state);

    let addr: SocketAddr = match args.bind {
        Some(addr) => addr,
        None => config
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind_addr: {}", config.bind_addr))?,
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("boxhawk-rv listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! mcat-rs (Regional Sync) - keeps the regional mirror in step with its
//! external authority
//!
//! Startup sequence:
//! 1. Parse CLI, load TOML config, initialize tracing
//! 2. Resolve root folder and open `mcat.db`
//! 3. Load the API shared secret
//! 4. Start the periodic sync scheduler
//! 5. Serve the HTTP API until Ctrl+C / SIGTERM

use anyhow::{Context, Result};
use clap::Parser;
use mcat_common::api::auth::load_shared_secret;
use mcat_common::config::{database_path, ensure_root_folder, resolve_root_folder};
use mcat_rs::config::{load_config, MODULE_NAME};
use mcat_rs::regional::{HttpRegionalSource, RegionalSource, SqliteRegionalStore, UnconfiguredSource};
use mcat_rs::sync::RegionalSyncService;
use mcat_rs::{build_router, scheduler, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for mcat-rs
#[derive(Parser, Debug)]
#[command(name = "mcat-rs")]
#[command(about = "Regional Sync microservice for mcat")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/mcat/mcat-rs.toml)
    #[arg(short, long, env = "MCAT_RS_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding mcat.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "MCAT_RS_PORT")]
    port: Option<u16>,

    /// Regional source URL (overrides TOML)
    #[arg(long, env = "MCAT_RS_SOURCE_URL")]
    source_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting mcat Regional Sync ({}) v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(url) = args.source_url {
        config.regional_sync.source_url = Some(url);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config.root_folder.as_deref());
    ensure_root_folder(&root_folder).context("Failed to initialize root folder")?;

    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());
    let pool = mcat_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load API shared secret")?;
    if shared_secret == 0 {
        info!("API authentication disabled (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }

    let sync_config = &config.regional_sync;
    let source: Arc<dyn RegionalSource> = match &sync_config.source_url {
        Some(url) => Arc::new(
            HttpRegionalSource::new(url.clone(), sync_config.fetch_timeout(), sync_config.requests_per_minute)
                .context("Failed to create regional source client")?,
        ),
        None => {
            warn!("No regional source configured; sync runs will report the source as unavailable");
            Arc::new(UnconfiguredSource)
        }
    };

    let service = Arc::new(RegionalSyncService::new(
        source,
        SqliteRegionalStore::new(pool),
        sync_config.sync_settings(),
    ));

    let shutdown = CancellationToken::new();
    let scheduler_handle = if sync_config.enabled && sync_config.source_url.is_some() {
        Some(scheduler::spawn_regional_sync(
            service.clone(),
            sync_config.interval(),
            shutdown.clone(),
        ))
    } else {
        info!("Regional sync scheduler disabled");
        None
    };

    let app = build_router(AppState::new(shared_secret, service));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("mcat-rs listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    if let Some(handle) = scheduler_handle {
        shutdown.cancel();
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM and cancel background work
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
    shutdown.cancel();
}

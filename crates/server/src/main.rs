use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teradl_core::{
    load_config, load_default_config, validate_config, ChromiumDriver, Config, LaunchOptions,
    PipelineController,
};
use teradl_server::api::{create_router, WsBroadcaster};
use teradl_server::cli;
use teradl_server::state::AppState;

/// Default config file, read from the working directory when present.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
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

    let config = load()?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Output directory: {:?}", config.downloads.output_dir);
    info!("Flow variant: {:?}", config.flow.variant);

    let driver = Arc::new(ChromiumDriver::new(LaunchOptions::from_config(&config)));
    let controller = Arc::new(PipelineController::new(driver, &config));

    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(links_path) => {
            cli::run_once(controller, &links_path).await?;
            Ok(())
        }
        None => serve(config, controller).await,
    }
}

/// Loads `TERADL_CONFIG` (must exist when set) or `config.toml` (optional),
/// with `TERADL_` environment overrides on top.
fn load() -> Result<Config> {
    match std::env::var_os("TERADL_CONFIG").map(PathBuf::from) {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                info!("Loading configuration from {:?}", path);
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                info!("No config file, using defaults");
                load_default_config().context("Failed to load default config")
            }
        }
    }
}

async fn serve(config: Config, controller: Arc<PipelineController>) -> Result<()> {
    let ws_broadcaster = WsBroadcaster::default();
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&controller),
        ws_broadcaster,
    ));

    let app = create_router(Arc::clone(&state));

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

    if controller.is_running() {
        info!("Stopping active run after its current link...");
    }
    state.finish_run().await;
    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

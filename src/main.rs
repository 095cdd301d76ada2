use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use dba_console::handlers::{create_app, AppState};
use dba_console::utils::logging::init_logging;
use dba_console::{AppConfig, HttpDashboardApi};

const CONFIG_PATH_ENV: &str = "DBA_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let _log_guard = init_logging(&config.logging)?;
    info!("Starting ShaydZ DBA Console v{}", env!("CARGO_PKG_VERSION"));
    info!(backend = %config.api.base_url, start_page = ?config.server.start_page, "configuration loaded");

    let api = Arc::new(HttpDashboardApi::new(&config.api)?);
    let state = AppState::new(api, &config);
    let app = create_app(state.clone());

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .context("invalid server.bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind HTTP listener")?;
    info!("Web server listening on http://{}", addr);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = ?err, "server terminated with error");
    }

    state.shutdown();
    info!("view unmounted, exiting");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use lib_common::core::{CacheStore, Dispatcher};
use lib_common::gateway::{self, GatewayState};
use lib_common::loggers::LoggerLocal;

mod exchange_rate_logic;
use exchange_rate_logic::{bootstrap, config};

const APP_NAME: &str = "server_exchange_rate";

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl-C received, initiating shutdown.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
                tracing::info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    // Installed before resolve() so its warnings are recorded.
    let _logger = LoggerLocal::init(APP_NAME, config.logger_options())?;
    let settings = config.resolve().context("Invalid configuration")?;

    let store = Arc::new(CacheStore::new());
    let report = bootstrap::load_cache(&settings, &store).await;
    tracing::info!(
        records = report.records,
        loaded = report.is_success(),
        "Cache ready"
    );

    let registry = bootstrap::build_registry(&settings, &store);
    let state = GatewayState::new(registry, Arc::new(Dispatcher::new()), store);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    gateway::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Shutdown complete.");
    Ok(())
}

//! Church office backend server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use church_office::app::{build_app, AppState};
use church_office::config::Config;
use church_office::logging::{init_logging, log_startup};
use church_office::services::scheduling_service::MaintenanceScheduler;
use church_office::services::time_provider::SystemTimeProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_logging(&config.log_level, config.is_production());
    log_startup(&config.bind_address(), &config.environment);
    config.log_config();

    let bind_address = config.bind_address();
    let state = AppState::initialize(config, Arc::new(SystemTimeProvider::new()))
        .await
        .context("Failed to initialize application state")?;

    let hub_tasks = state.hub.clone().start_background_tasks();

    let scheduler = MaintenanceScheduler::new(
        state.audit.clone(),
        state.chat.clone(),
        state.config.audit_log_retention_days,
        state.config.maintenance_cron.clone(),
    );
    scheduler
        .start()
        .await
        .context("Failed to start maintenance scheduler")?;

    let app = build_app(state);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = scheduler.stop().await {
        error!(error = %e, "Failed to stop maintenance scheduler");
    }
    hub_tasks.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

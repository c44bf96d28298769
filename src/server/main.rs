//! Coordinator service entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coordinator::datalake::{Datalake, NdjsonDatalake};
use coordinator::monitors;
use coordinator::server::app::{build_app, AppState};
use coordinator::services::{BotService, JobService};
use coordinator::store::Store;
use coordinator::{registry::OperationRegistry, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coordinator=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting coordinator");

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);
    tracing::info!("configuration loaded");

    let store = Store::connect(&config.database_url)
        .await
        .context("failed to connect to store")?;
    tracing::info!("connected to store, running migrations");
    store.migrate().await.context("failed to run migrations")?;

    let registry = OperationRegistry::load_from_dir(&config.operations_dir)
        .context("failed to load operation registry")?;
    tracing::info!(operations = ?registry.names(), "operation registry loaded");

    let datalake: Arc<dyn Datalake> = Arc::new(NdjsonDatalake::new(config.datalake_dir.clone()));
    let job_service = JobService::new(store.clone(), registry.clone(), datalake);
    let bot_service = BotService::new(store.clone(), config.bot_down_threshold);

    let monitors = monitors::spawn(config.clone(), job_service.clone(), bot_service.clone());

    let state = AppState {
        config: config.clone(),
        store,
        jobs: job_service,
        bots: bot_service,
        registry,
        cleaner: monitors.retention_cleaner.clone(),
    };

    let app = build_app(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    tracing::info!(%addr, "binding http listener");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind http port")?;

    tracing::info!("coordinator ready");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    monitors.shutdown.cancel();
    tracing::info!("coordinator shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

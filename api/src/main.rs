use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

mod handlers;
mod routes;
mod state;

use common::config::{Settings, StorageBackend};
use common::db::DbPool;
use common::detector::ChangeDetector;
use common::differ::SnapshotDiffer;
use common::evaluator::ChangeEvaluator;
use common::notify::{transport_from_config, NotificationSender, PushMessage};
use common::service::ChangeCheckService;
use common::store::{MemoryStore, PostgresStore, ScheduleStore};
use common::telemetry;
use common::upstream::OblenergoClient;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load()?;

    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;
    tracing::info!("Starting API server");

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        storage = ?config.storage.backend,
        transport = ?config.notifications.transport,
        "Configuration loaded"
    );

    // Initialize storage
    let store: Arc<dyn ScheduleStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db_pool = DbPool::new(&config.database).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PostgresStore::new(db_pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let fetcher = Arc::new(OblenergoClient::from_config(&config.upstream)?);
    let evaluator = ChangeEvaluator::with_lookahead(chrono::Duration::minutes(
        config.detection.lookahead_minutes,
    ));

    let mut detector = ChangeDetector::new(store, fetcher, SnapshotDiffer::new(evaluator));
    detector.populate().await?;

    // Start push notification worker
    let transport = transport_from_config(&config.notifications)?;
    let sender = Arc::new(NotificationSender::start(
        transport,
        PushMessage::from_config(&config.notifications),
    ));

    // Initialize Prometheus metrics exporter
    let metrics_handle = telemetry::init_metrics()?;

    let service = Arc::new(ChangeCheckService::new(detector, sender.clone()));
    let state = AppState::new(service, metrics_handle);
    let app = routes::create_router(state);

    // Start server
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sender.stop().await;
    telemetry::shutdown_tracer();

    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}

// Scheduler binary entry point: triggers change checks on the API periodically

use anyhow::Result;
use common::config::Settings;
use common::scheduler::{HttpCheckTrigger, TriggerEngine};
use common::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    info!("Starting change-check scheduler");

    info!(
        api_base_url = %settings.trigger.api_base_url,
        interval_seconds = settings.trigger.interval_seconds,
        timeout_seconds = settings.trigger.timeout_seconds,
        "Configuration loaded"
    );

    let trigger = HttpCheckTrigger::from_config(&settings.trigger).map_err(|e| {
        error!(error = %e, "Failed to create check trigger");
        e
    })?;

    let engine = Arc::new(TriggerEngine::new(
        Duration::from_secs(settings.trigger.interval_seconds),
        Arc::new(trigger),
    ));

    // Set up graceful shutdown
    let engine_for_shutdown = engine.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal, initiating graceful shutdown");
                engine_for_shutdown.stop();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    engine.start().await;

    telemetry::shutdown_tracer();
    info!("Scheduler stopped");
    Ok(())
}

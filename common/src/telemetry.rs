// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "outage-watch";

/// Initialize structured logging with JSON formatting and trace context
///
/// This function sets up the tracing subscriber with:
/// - JSON formatting for structured logs
/// - Log levels from `RUST_LOG` or the configured level
/// - Optional OpenTelemetry integration when an OTLP endpoint is configured
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
#[tracing::instrument(skip_all)]
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(
        endpoint = endpoint,
        "OpenTelemetry tracer initialized with OTLP exporter"
    );

    Ok(tracer)
}

/// Shutdown OpenTelemetry tracer provider
///
/// This should be called on graceful shutdown to flush remaining spans
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus recorder and describe all metrics
///
/// The returned handle renders the exposition text for the `/metrics` route.
#[tracing::instrument(skip_all)]
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!("change_cycles_total", "Total number of change-detection cycles");
    describe_counter!(
        "changed_queues_total",
        "Total number of queues flagged as significantly changed"
    );
    describe_counter!(
        "upstream_fetch_failures_total",
        "Total number of upstream requests that failed and were dropped"
    );
    describe_counter!(
        "snapshot_save_failures_total",
        "Total number of snapshots that could not be persisted"
    );
    describe_counter!(
        "notifications_enqueued_total",
        "Total number of push notifications queued for delivery"
    );
    describe_counter!("notifications_sent_total", "Total number of delivered pushes");
    describe_counter!("notifications_failed_total", "Total number of failed pushes");
    describe_histogram!(
        "change_cycle_duration_seconds",
        "Duration of change-detection cycles in seconds"
    );
    describe_gauge!("tracked_queues", "Number of tracked queues");
    describe_gauge!("registered_devices", "Number of registered devices");

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Record a finished change-detection cycle
#[inline]
pub fn record_cycle(changed_queues: usize, duration_seconds: f64) {
    counter!("change_cycles_total").increment(1);
    counter!("changed_queues_total").increment(changed_queues as u64);
    histogram!("change_cycle_duration_seconds").record(duration_seconds);
}

/// Record an upstream request that was dropped
#[inline]
pub fn record_fetch_failure(queue: &str) {
    counter!("upstream_fetch_failures_total", "queue" => queue.to_string()).increment(1);
}

/// Record a snapshot that could not be saved
#[inline]
pub fn record_save_failure(queue: &str) {
    counter!("snapshot_save_failures_total", "queue" => queue.to_string()).increment(1);
}

/// Record push notifications placed on the delivery queue
#[inline]
pub fn record_notifications_enqueued(count: usize) {
    counter!("notifications_enqueued_total").increment(count as u64);
}

/// Record the outcome of one push delivery
#[inline]
pub fn record_notification_result(delivered: bool) {
    if delivered {
        counter!("notifications_sent_total").increment(1);
    } else {
        counter!("notifications_failed_total").increment(1);
    }
}

/// Update the cached-state gauges
#[inline]
pub fn update_state_gauges(tracked_queues: usize, devices: usize) {
    gauge!("tracked_queues").set(tracked_queues as f64);
    gauge!("registered_devices").set(devices as f64);
}

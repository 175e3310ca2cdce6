use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/", get(handlers::index::index))
        .route("/health", get(handlers::health::health_check))
        .route("/devices", get(handlers::devices::list_devices))
        .route("/registerDevice", post(handlers::devices::register_device))
        .route("/intervals", get(handlers::intervals::list_intervals))
        .route("/checkChanges", get(handlers::changes::check_changes));

    // Metrics endpoint for Prometheus scraping
    let metrics_routes = Router::new().route("/metrics", get(handlers::metrics::metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use common::detector::ChangeDetector;
    use common::differ::SnapshotDiffer;
    use common::models::{FetchedRecord, TrackedQueue};
    use common::notify::{LogTransport, NotificationSender, PushMessage};
    use common::service::ChangeCheckService;
    use common::store::MemoryStore;
    use common::upstream::ScheduleFetcher;

    /// Answers every account with one fixed outage window
    struct FixedFetcher;

    #[async_trait]
    impl ScheduleFetcher for FixedFetcher {
        async fn fetch_all(&self, queues: &[TrackedQueue]) -> Vec<FetchedRecord> {
            queues
                .iter()
                .map(|tracked| {
                    FetchedRecord::new(
                        tracked.clone(),
                        json!({"aData": [{"acc_begin": "01-01-2025 10:00", "accend_plan": "01-01-2025 12:00"}]}),
                    )
                })
                .collect()
        }
    }

    async fn app() -> Router {
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedQueue::new(42, "3/1", "")],
            vec![],
        ));
        let mut detector =
            ChangeDetector::new(store, Arc::new(FixedFetcher), SnapshotDiffer::default());
        detector.populate().await.unwrap();

        let sender = Arc::new(NotificationSender::start(
            Arc::new(LogTransport),
            PushMessage::new("Schedule changed!", "body"),
        ));
        let service = Arc::new(ChangeCheckService::new(detector, sender));
        let handle = PrometheusBuilder::new().build_recorder().handle();

        create_router(AppState::new(service, handle))
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn register(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/registerDevice")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_reports_start_time() {
        let app = app().await;
        let (status, body) = call(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().starts_with("Running since "));
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let app = app().await;
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_then_check_changes() {
        let app = app().await;

        let (status, body) = call(
            &app,
            register(json!({
                "device_uuid": "d-1",
                "device_type": "ANDROID",
                "push_address": "fcm-token",
                "watched_queue": "3/1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Device saved"}));

        let (_, devices) = call(&app, get("/devices")).await;
        assert_eq!(devices.as_array().unwrap().len(), 1);
        assert_eq!(devices[0]["device_type"], "ANDROID");

        let (status, body) = call(&app, get("/checkChanges")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Success");
        assert_eq!(body["detected_changes"], json!(["3/1"]));
        assert_eq!(body["pushes_scheduled"], 1);

        let (_, intervals) = call(&app, get("/intervals")).await;
        assert_eq!(intervals[0]["account"], 42);
        assert!(intervals[0]["intervals"].as_str().unwrap().contains("acc_begin"));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_body() {
        let app = app().await;

        let (status, body) = call(
            &app,
            register(json!({
                "device_uuid": "d-1",
                "device_type": "ANDROID",
                "push_address": "fcm-token",
                "watched_queue": "9/9"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert!(body["trace_id"].is_string());

        let (status, _) = call(&app, register(json!({"device_uuid": "d-2"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, devices) = call(&app, get("/devices")).await;
        assert!(devices.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders() {
        let app = app().await;
        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

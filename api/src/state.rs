use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use common::service::ChangeCheckService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChangeCheckService>,
    pub metrics_handle: PrometheusHandle,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<ChangeCheckService>, metrics_handle: PrometheusHandle) -> Self {
        Self {
            service,
            metrics_handle,
            started_at: Utc::now(),
        }
    }
}

use axum::{extract::State, Json};
use serde::Serialize;

use crate::handlers::ErrorResponse;
use crate::state::AppState;
use common::errors::ApiError;

#[derive(Debug, Serialize)]
pub struct CheckChangesResponse {
    pub result: &'static str,
    pub detected_changes: Vec<String>,
    pub pushes_scheduled: usize,
}

/// Run one change-detection cycle and schedule pushes
///
/// Concurrent calls queue up behind the running cycle.
#[tracing::instrument(skip(state))]
pub async fn check_changes(
    State(state): State<AppState>,
) -> Result<Json<CheckChangesResponse>, ErrorResponse> {
    let report = state.service.check_changes().await.map_err(|e| {
        tracing::error!(error = %e, "Change check failed");
        ErrorResponse::from(ApiError::from(e))
    })?;

    Ok(Json(CheckChangesResponse {
        result: "Success",
        detected_changes: report.detected_changes,
        pushes_scheduled: report.pushes_scheduled,
    }))
}

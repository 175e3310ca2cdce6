use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Health check endpoint, backed by the store's own check
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    state.service.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Health check failed");
        ErrorResponse::new("service_unavailable", e.to_string())
    })?;

    Ok((StatusCode::OK, "OK"))
}

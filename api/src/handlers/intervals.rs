use axum::{extract::State, Json};

use crate::handlers::ErrorResponse;
use crate::state::AppState;
use common::errors::ApiError;
use common::models::TrackedQueue;

/// Every tracked queue with its last stored payload
#[tracing::instrument(skip(state))]
pub async fn list_intervals(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrackedQueue>>, ErrorResponse> {
    let queues = state
        .service
        .list_intervals()
        .await
        .map_err(|e| ErrorResponse::from(ApiError::from(e)))?;

    Ok(Json(queues))
}

use axum::extract::State;

use crate::handlers::MessageResponse;
use crate::state::AppState;
use common::intervals::SCHEDULE_TZ;

/// Liveness banner with the process start time
#[tracing::instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> MessageResponse {
    let started = state.started_at.with_timezone(&SCHEDULE_TZ);
    MessageResponse::new(format!(
        "Running since {}",
        started.format("%Y-%m-%d %H:%M:%S")
    ))
}

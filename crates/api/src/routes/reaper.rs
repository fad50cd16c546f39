//! Manual trigger for the expiry reaper.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::CheckoutStore;
use serde::Serialize;

use crate::auth::bearer_matches;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ReaperResponse {
    pub success: bool,
    pub reservations_processed: usize,
    pub duration_ms: u64,
}

/// POST /internal/reaper/run — runs one sweep now.
#[tracing::instrument(skip_all)]
pub async fn run<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<ReaperResponse>, ApiError> {
    let authorized = state
        .reaper_secret
        .as_deref()
        .is_some_and(|secret| bearer_matches(&headers, secret));
    if !authorized {
        return Err(ApiError::Unauthorized("Invalid reaper token".to_string()));
    }

    let report = state.reaper.sweep().await?;
    tracing::info!(
        released = report.reservations_processed,
        "Manual reaper sweep finished"
    );
    Ok(Json(ReaperResponse {
        success: true,
        reservations_processed: report.reservations_processed,
        duration_ms: report.duration.as_millis() as u64,
    }))
}

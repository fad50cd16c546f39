//! Storefront availability endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use checkout::CheckoutStore;
use common::VariantId;
use domain::Availability;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest number of ids accepted in one query.
pub const MAX_VARIANT_IDS: usize = 200;

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub variant_ids: Vec<VariantId>,
}

/// POST /variants/availability — available-to-sell per variant.
#[tracing::instrument(skip(state, payload))]
pub async fn query<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<AvailabilityRequest>, JsonRejection>,
) -> Result<Json<Vec<Availability>>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if req.variant_ids.len() > MAX_VARIANT_IDS {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_VARIANT_IDS} variant ids per request"
        )));
    }
    let availability = state.availability.availability(&req.variant_ids).await?;
    Ok(Json(availability))
}

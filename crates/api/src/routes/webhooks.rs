//! Payment gateway webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{CheckoutStore, ReconcileOutcome, ReconciliationError};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub outcome: ReconcileOutcome,
}

/// POST /webhooks/payment — applies a signed payment outcome.
#[tracing::instrument(skip_all)]
pub async fn payment<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Some(reconciler) = &state.reconciler else {
        tracing::warn!("Webhook received but no webhook secret is configured");
        return Err(ReconciliationError::InvalidSignature.into());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = reconciler.handle(&body, signature).await?;
    Ok(Json(WebhookResponse {
        status: "ok",
        outcome,
    }))
}

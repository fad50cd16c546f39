//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use checkout::{CartSource, CheckoutReceipt, CheckoutRequest, CheckoutStore};
use domain::{CartLine, PaymentMethod, ShippingAddress};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CheckoutBody {
    /// Buy a single line now instead of the saved cart.
    pub buy_now: Option<CartLine>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

/// POST /checkout — starts a checkout for the authenticated buyer.
#[tracing::instrument(skip(state, payload), fields(user_id = %user.0))]
pub async fn start<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = CheckoutRequest {
        user_id: user.0,
        source: body.buy_now.map_or(CartSource::Cart, CartSource::BuyNow),
        payment_method: body.payment_method,
        shipping_address: body.shipping_address,
    };

    let receipt = state.checkout.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

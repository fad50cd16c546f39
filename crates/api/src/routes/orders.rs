//! Buyer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use checkout::{CheckoutStore, OrderDetails};
use common::OrderId;
use domain::Order;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

fn order_id(path: Result<Path<Uuid>, PathRejection>) -> Result<OrderId, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(id))
}

/// GET /orders/{id} — an order of the authenticated buyer, with its items.
#[tracing::instrument(skip(state, path), fields(user_id = %user.0))]
pub async fn get<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id = order_id(path)?;
    let details = state.orders.get(order_id, user.0).await?;
    Ok(Json(details))
}

/// POST /orders/{id}/cancel — cancels an order still awaiting payment.
#[tracing::instrument(skip(state, path), fields(user_id = %user.0))]
pub async fn cancel<S: CheckoutStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = order_id(path)?;
    let order = state.orders.cancel(order_id, user.0).await?;
    Ok(Json(order))
}

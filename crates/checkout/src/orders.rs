//! Buyer-facing order reads and cancellation.

use std::sync::Arc;

use common::{OrderId, UserId};
use domain::{Order, OrderItem, OrderStatus};
use inventory::ReservationEngine;
use serde::Serialize;
use store::{InventoryStore, OrderStore};

use crate::error::{CheckoutError, Result};

/// An order with its price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order actions a buyer may take on their own orders.
pub struct OrderService<S> {
    store: Arc<S>,
    engine: ReservationEngine<S>,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
        }
    }
}

impl<S: InventoryStore + OrderStore> OrderService<S> {
    pub fn new(store: Arc<S>, engine: ReservationEngine<S>) -> Self {
        Self { store, engine }
    }

    /// Loads an order owned by `user_id`.
    ///
    /// Orders of other users are reported as not found.
    pub async fn get(&self, order_id: OrderId, user_id: UserId) -> Result<OrderDetails> {
        let order = self.owned_order(order_id, user_id).await?;
        let items = self.store.get_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Cancels an order still awaiting payment and lifts its holds.
    ///
    /// Cancelling an already cancelled order returns it unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let order = self.owned_order(order_id, user_id).await?;
        match order.status {
            OrderStatus::Cancelled => return Ok(order),
            OrderStatus::PaymentPending => {}
            status => return Err(CheckoutError::InvalidOrderState { status }),
        }

        let moved = self
            .store
            .transition_order(
                order_id,
                OrderStatus::PaymentPending,
                OrderStatus::Cancelled,
                order.payment_status,
            )
            .await?;
        if !moved {
            let current = self.owned_order(order_id, user_id).await?;
            return match current.status {
                OrderStatus::Cancelled => Ok(current),
                status => Err(CheckoutError::InvalidOrderState { status }),
            };
        }

        // The status already moved; a failed release is left to the reaper.
        if let Err(e) = self.engine.release(order_id).await {
            tracing::error!(error = %e, "Could not release holds of cancelled order");
        }
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!("Order cancelled by buyer");

        self.owned_order(order_id, user_id).await
    }

    async fn owned_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        match self.store.get_order(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(CheckoutError::OrderNotFound(order_id)),
        }
    }
}

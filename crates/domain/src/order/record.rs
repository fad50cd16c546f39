//! The order record.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::{Currency, Money};

use super::{OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};

/// An order as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of the items' price-at-purchase times quantity.
    pub amount: Money,
    pub shipping_fee: Money,
    pub currency: Currency,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    /// Reference of the payable order created at the payment gateway.
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a draft order in `Created` status.
    pub fn draft(
        user_id: UserId,
        amount: Money,
        shipping_fee: Money,
        currency: Currency,
        payment_method: PaymentMethod,
        shipping_address: ShippingAddress,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            amount,
            shipping_fee,
            currency,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            payment_method,
            shipping_address,
            gateway_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns what the buyer pays at the gateway: items plus shipping.
    pub fn payable_total(&self) -> Money {
        self.amount + self.shipping_fee
    }

    /// Returns true if `amount` equals the sum of the given items' line totals.
    pub fn matches_items(&self, items: &[OrderItem]) -> bool {
        items.iter().map(OrderItem::line_total).sum::<Money>() == self.amount
    }

    /// Records the gateway order and moves the order to `PaymentPending`.
    pub fn attach_gateway_order(&mut self, reference: impl Into<String>) -> Result<(), DomainError> {
        self.transition(OrderStatus::PaymentPending)?;
        self.gateway_order_id = Some(reference.into());
        Ok(())
    }

    /// Moves the order to `next` if the lifecycle allows it.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        self.status.ensure_transition(next)?;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

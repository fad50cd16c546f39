//! Integration tests for the order and reservation lifecycles.

use chrono::{Duration, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    Availability, Currency, DomainError, Money, Order, OrderItem, OrderStatus, PaymentMethod,
    Reservation, ReservationStatus, ShippingAddress, Variant, held_quantity,
};

fn draft(amount: i64) -> Order {
    Order::draft(
        UserId::new(),
        Money::from_minor(amount),
        Money::zero(),
        Currency::Inr,
        PaymentMethod::Online,
        ShippingAddress::default(),
    )
}

mod order_lifecycle {
    use super::*;

    #[test]
    fn paid_order_runs_through_fulfilment() {
        let mut order = draft(1_000);
        order.attach_gateway_order("order_1").unwrap();
        order.transition(OrderStatus::Paid).unwrap();
        order.transition(OrderStatus::Processing).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert!(order.status.is_terminal());
    }

    #[test]
    fn failed_payment_is_terminal() {
        let mut order = draft(1_000);
        order.attach_gateway_order("order_1").unwrap();
        order.transition(OrderStatus::PaymentFailed).unwrap();

        let err = order.transition(OrderStatus::Paid).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidOrderTransition {
                from: OrderStatus::PaymentFailed,
                to: OrderStatus::Paid,
            }
        );
    }

    #[test]
    fn on_hold_order_can_be_settled_later() {
        let mut order = draft(1_000);
        order.attach_gateway_order("order_1").unwrap();
        order.transition(OrderStatus::OnHold).unwrap();
        // Back office restocked and confirmed the sale.
        order.transition(OrderStatus::Paid).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let mut refunded = draft(1_000);
        refunded.attach_gateway_order("order_2").unwrap();
        refunded.transition(OrderStatus::OnHold).unwrap();
        refunded.transition(OrderStatus::Cancelled).unwrap();
        assert!(refunded.transition(OrderStatus::Paid).is_err());
    }

    #[test]
    fn amount_matches_price_snapshot() {
        let order = draft(3_497);
        let variant = Variant::new(ProductId::new(), "Socks", Money::from_minor(1_499), 10);
        let items = vec![
            OrderItem::new(order.id, variant.id, "Socks", 2, variant.price),
            OrderItem::new(order.id, variant.id, "Socks", 1, Money::from_minor(499)),
        ];
        assert!(order.matches_items(&items));
    }
}

mod hold_lifecycle {
    use super::*;

    #[test]
    fn released_hold_restores_availability() {
        let variant = Variant::new(ProductId::new(), "Scarf", Money::from_minor(2_000), 3);
        let now = Utc::now();
        let mut hold = Reservation::hold(
            OrderId::new(),
            UserId::new(),
            variant.id,
            2,
            now,
            now + Duration::minutes(15),
        );

        let before = held_quantity([&hold], variant.id, now);
        assert_eq!(Availability::for_variant(&variant, before).available_to_sell, 1);

        hold.transition(ReservationStatus::Released, now).unwrap();
        let after = held_quantity([&hold], variant.id, now);
        assert_eq!(Availability::for_variant(&variant, after).available_to_sell, 3);
    }

    #[test]
    fn expired_hold_stops_counting_before_reaping() {
        let variant = Variant::new(ProductId::new(), "Scarf", Money::from_minor(2_000), 3);
        let now = Utc::now();
        let hold = Reservation::hold(
            OrderId::new(),
            UserId::new(),
            variant.id,
            3,
            now,
            now + Duration::seconds(60),
        );

        assert_eq!(held_quantity([&hold], variant.id, now), 3);
        assert_eq!(
            held_quantity([&hold], variant.id, now + Duration::seconds(61)),
            0
        );
        assert_eq!(hold.status, ReservationStatus::Reserved);
    }
}

//! Order tests
//!
//! Pricing, totals, the status chain and client purchase statistics.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    calculate_order_totals, order_number, ClientStats, DomainError, OrderLine, OrderStatus,
    PaymentMethod, PurchaseRecord, StockLevels,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_line_pricing() {
        let line = OrderLine::price(3, dec("32.50"), 250).unwrap();
        assert_eq!(line.subtotal, dec("97.50"));
        assert_eq!(line.sold_kg, dec("0.75"));
        assert!(OrderLine::price(0, dec("32.50"), 250).is_err());
    }

    #[test]
    fn test_order_totals() {
        let lines = [
            OrderLine::price(3, dec("32.50"), 250).unwrap(),
            OrderLine::price(2, dec("18"), 500).unwrap(),
        ];
        let totals = calculate_order_totals(&lines, dec("10"), dec("8.50")).unwrap();
        assert_eq!(totals.subtotal, dec("133.50"));
        assert_eq!(totals.total, dec("132.00"));
    }

    #[test]
    fn test_discount_larger_than_order_rejected() {
        let lines = [OrderLine::price(1, dec("10"), 250).unwrap()];
        assert_eq!(
            calculate_order_totals(&lines, dec("20"), Decimal::ZERO),
            Err(DomainError::NegativeTotal)
        );
        assert_eq!(
            calculate_order_totals(&lines, dec("-1"), Decimal::ZERO),
            Err(DomainError::Negative("discount"))
        );
    }

    #[test]
    fn test_fulfilment_chain() {
        let chain = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivered,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]));
            assert!(!pair[1].can_advance_to(pair[0]));
        }
        assert!(OrderStatus::Pending.can_advance_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_cancellation_rules() {
        assert!(OrderStatus::Ready.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.is_open());
        assert!(OrderStatus::Preparing.is_open());
        assert!(matches!(
            OrderStatus::Cancelled.ensure_can_advance_to(OrderStatus::Confirmed),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_status_names_parse_back() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_order_number_uses_creation_instant() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let number = order_number(at);
        assert!(number.starts_with("ORD-"));
        assert_eq!(number, format!("ORD-{}", at.timestamp_millis()));
    }

    #[test]
    fn test_client_statistics() {
        let purchase = |day: u32, status: OrderStatus, total: &str, method: PaymentMethod| {
            PurchaseRecord {
                placed_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap(),
                status,
                total: dec(total),
                payment_method: method,
            }
        };
        let purchases = [
            purchase(20, OrderStatus::Pending, "40", PaymentMethod::Cash),
            purchase(2, OrderStatus::Delivered, "120.50", PaymentMethod::Yape),
            purchase(10, OrderStatus::Delivered, "60", PaymentMethod::Yape),
            purchase(15, OrderStatus::Cancelled, "90", PaymentMethod::Card),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();

        let stats = ClientStats::from_purchases(&purchases, today);
        assert_eq!(stats.number_of_orders, 4);
        assert_eq!(stats.total_amount_paid, dec("180.50"));
        assert_eq!(stats.first_purchase_date, Some(purchases[1].placed_at));
        assert_eq!(stats.last_purchase_date, Some(purchases[0].placed_at));
        assert_eq!(stats.days_without_orders, Some(10));
        assert_eq!(stats.favorite_payment_method, Some(PaymentMethod::Yape));
    }

    #[test]
    fn test_client_without_orders() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        let stats = ClientStats::from_purchases(&[], today);
        assert_eq!(stats.number_of_orders, 0);
        assert_eq!(stats.total_amount_paid, Decimal::ZERO);
        assert_eq!(stats.days_without_orders, None);
        assert_eq!(stats.favorite_payment_method, None);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Placing an order holds the units; delivery drops them, cancellation returns them
    #[test]
    fn prop_reservation_lifecycle(
        on_hand in 0i32..500,
        quantity in 1i32..100,
        deliver in any::<bool>(),
    ) {
        let stock = StockLevels::new(on_hand, 0, 10);
        match stock.reserve(quantity) {
            Ok(reserved) => {
                prop_assert_eq!(reserved.current + reserved.reserved, on_hand);
                prop_assert_eq!(reserved.reserved, quantity);

                let closed = if deliver {
                    reserved.release_delivered(quantity).unwrap()
                } else {
                    reserved.return_cancelled(quantity).unwrap()
                };
                prop_assert_eq!(closed.reserved, 0);
                if deliver {
                    prop_assert_eq!(closed.current, on_hand - quantity);
                } else {
                    prop_assert_eq!(closed, stock);
                }
            }
            Err(DomainError::InsufficientStock { requested, available }) => {
                prop_assert!(quantity > on_hand);
                prop_assert_eq!(requested, quantity);
                prop_assert_eq!(available, on_hand);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Totals never depend on line order and never go below zero
    #[test]
    fn prop_totals_are_order_independent(
        lines in prop::collection::vec((1i32..20, 1i64..20_000), 1..8),
        shipping_cents in 0i64..5_000,
    ) {
        let priced: Vec<OrderLine> = lines
            .iter()
            .map(|(qty, cents)| OrderLine::price(*qty, Decimal::new(*cents, 2), 250).unwrap())
            .collect();
        let mut reversed = priced.clone();
        reversed.reverse();

        let shipping = Decimal::new(shipping_cents, 2);
        let a = calculate_order_totals(&priced, Decimal::ZERO, shipping).unwrap();
        let b = calculate_order_totals(&reversed, Decimal::ZERO, shipping).unwrap();
        prop_assert_eq!(a, b);
        prop_assert!(a.total >= shipping);
    }
}

//! Inventory ledger tests
//!
//! Product counters must always agree with the movement ledger: the ledger
//! balance equals the available stock and the reserved counter equals the
//! units held by open orders.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    ledger_balance, summarize_stock, GrindType, MovementType, StockLevels, StockPosition,
    StockReconciliation,
};

/// A product with its counters, its ledger and the reservations of its open orders
#[derive(Debug)]
struct Shelf {
    stock: StockLevels,
    ledger: Vec<(MovementType, Decimal)>,
    open_orders: Vec<i32>,
}

impl Shelf {
    fn new() -> Self {
        Self {
            stock: StockLevels::new(0, 0, 5),
            ledger: Vec::new(),
            open_orders: Vec::new(),
        }
    }

    fn pack(&mut self, units: i32) {
        self.stock = self.stock.adjust(units).unwrap();
        self.ledger.push((MovementType::Inbound, Decimal::from(units)));
    }

    fn place_order(&mut self, units: i32) -> bool {
        match self.stock.reserve(units) {
            Ok(stock) => {
                self.stock = stock;
                self.ledger.push((MovementType::Outbound, Decimal::from(units)));
                self.open_orders.push(units);
                true
            }
            Err(_) => false,
        }
    }

    fn adjust(&mut self, delta: i32) -> bool {
        match self.stock.adjust(delta) {
            Ok(stock) => {
                self.stock = stock;
                self.ledger.push((MovementType::Adjustment, Decimal::from(delta)));
                true
            }
            Err(_) => false,
        }
    }

    fn cancel(&mut self, order: usize) {
        let units = self.open_orders.remove(order);
        self.stock = self.stock.return_cancelled(units).unwrap();
        self.ledger.push((MovementType::Inbound, Decimal::from(units)));
    }

    fn deliver(&mut self, order: usize) {
        let units = self.open_orders.remove(order);
        self.stock = self.stock.release_delivered(units).unwrap();
    }

    fn reconcile(&self) -> StockReconciliation {
        StockReconciliation::new(
            ledger_balance(self.ledger.iter().copied()),
            self.open_orders.iter().map(|u| i64::from(*u)).sum(),
            self.stock.current,
            self.stock.reserved,
        )
    }
}

fn position(name: &str, grind: GrindType, current: i32, reserved: i32, minimum: i32) -> StockPosition {
    StockPosition {
        catalog_name: name.to_string(),
        grind_type: grind,
        stock_current: current,
        stock_reserved: reserved,
        stock_minimum: minimum,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_pack_sell_cancel_deliver() {
        let mut shelf = Shelf::new();
        shelf.pack(40);
        assert!(shelf.place_order(5));
        assert!(shelf.place_order(3));

        let mid = shelf.reconcile();
        assert_eq!(mid.stock_current, 32);
        assert_eq!(mid.stock_reserved, 8);
        assert!(mid.consistent);

        assert!(shelf.adjust(-2));
        shelf.cancel(1);
        shelf.deliver(0);

        let end = shelf.reconcile();
        assert_eq!(end.ledger_balance, Decimal::from(33));
        assert_eq!(end.stock_current, 33);
        assert_eq!(end.stock_reserved, 0);
        assert_eq!(end.open_reservations, 0);
        assert!(end.consistent);
    }

    #[test]
    fn test_counter_drift_is_reported() {
        let ledger = [
            (MovementType::Inbound, Decimal::from(20)),
            (MovementType::Outbound, Decimal::from(4)),
        ];
        let balance = ledger_balance(ledger);
        assert_eq!(balance, Decimal::from(16));

        assert!(StockReconciliation::new(balance, 4, 16, 4).consistent);
        assert!(!StockReconciliation::new(balance, 4, 17, 4).consistent);
        assert!(!StockReconciliation::new(balance, 4, 16, 0).consistent);
    }

    #[test]
    fn test_adjustments_carry_their_own_sign() {
        let ledger = [
            (MovementType::Inbound, Decimal::from(10)),
            (MovementType::Adjustment, Decimal::from(-3)),
            (MovementType::Adjustment, Decimal::from(1)),
            (MovementType::Outbound, Decimal::from(-2)),
        ];
        assert_eq!(ledger_balance(ledger), Decimal::from(6));
    }

    #[test]
    fn test_summary_groups_by_catalog_and_grind() {
        let summary = summarize_stock(&[
            position("Geisha 250g", GrindType::WholeBean, 10, 2, 5),
            position("Geisha 250g", GrindType::WholeBean, 3, 0, 5),
            position("Geisha 250g", GrindType::Fine, 2, 1, 4),
            position("Bourbon 1kg", GrindType::Medium, 30, 0, 5),
        ]);

        assert_eq!(summary.total_products, 4);
        assert_eq!(summary.total_low_stock_products, 2);
        assert_eq!(summary.items.len(), 3);

        let geisha_whole = summary
            .items
            .iter()
            .find(|i| i.product_catalog_name == "Geisha 250g" && i.grind_type == GrindType::WholeBean)
            .unwrap();
        assert_eq!(geisha_whole.total_stock_current, 13);
        assert_eq!(geisha_whole.total_stock_reserved, 2);
        assert_eq!(geisha_whole.total_stock_minimum, 10);
        assert!(!geisha_whole.low_stock_alert);

        let geisha_fine = summary
            .items
            .iter()
            .find(|i| i.grind_type == GrindType::Fine)
            .unwrap();
        assert!(geisha_fine.low_stock_alert);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize_stock(&[]);
        assert!(summary.items.is_empty());
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.total_low_stock_products, 0);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Pack(i32),
    Order(i32),
    Adjust(i32),
    Cancel(usize),
    Deliver(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i32..50).prop_map(Op::Pack),
        (1i32..20).prop_map(Op::Order),
        (-10i32..10).prop_map(Op::Adjust),
        any::<usize>().prop_map(Op::Cancel),
        any::<usize>().prop_map(Op::Deliver),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any mix of packing, selling, correcting, cancelling and delivering keeps the books balanced
    #[test]
    fn prop_ledger_always_reconciles(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut shelf = Shelf::new();
        for op in ops {
            match op {
                Op::Pack(units) => shelf.pack(units),
                Op::Order(units) => {
                    let available = shelf.stock.current;
                    prop_assert_eq!(shelf.place_order(units), units <= available);
                }
                Op::Adjust(delta) => {
                    if delta != 0 {
                        shelf.adjust(delta);
                    }
                }
                Op::Cancel(pick) => {
                    if !shelf.open_orders.is_empty() {
                        let index = pick % shelf.open_orders.len();
                        shelf.cancel(index);
                    }
                }
                Op::Deliver(pick) => {
                    if !shelf.open_orders.is_empty() {
                        let index = pick % shelf.open_orders.len();
                        shelf.deliver(index);
                    }
                }
            }

            prop_assert!(shelf.stock.current >= 0);
            prop_assert!(shelf.stock.reserved >= 0);
            let reconciliation = shelf.reconcile();
            prop_assert!(reconciliation.consistent, "{:?}", reconciliation);
        }
    }
}

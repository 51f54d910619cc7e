//! Inventory ledger models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::product::GrindType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "movement_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Inbound,
    Outbound,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inbound => "INBOUND",
            MovementType::Outbound => "OUTBOUND",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    /// Quantity with the sign it contributes to a stock balance.
    ///
    /// Inbound and outbound rows store a positive quantity; adjustment rows
    /// store the signed correction itself.
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            MovementType::Inbound => quantity.abs(),
            MovementType::Outbound => -quantity.abs(),
            MovementType::Adjustment => quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "movement_reason", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    BatchPurchase,
    MicrobatchProduction,
    Sale,
    Adjustment,
    Return,
    Other,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::BatchPurchase => "BATCH_PURCHASE",
            MovementReason::MicrobatchProduction => "MICROBATCH_PRODUCTION",
            MovementReason::Sale => "SALE",
            MovementReason::Adjustment => "ADJUSTMENT",
            MovementReason::Return => "RETURN",
            MovementReason::Other => "OTHER",
        }
    }
}

/// Sum a sequence of ledger rows into a balance
pub fn ledger_balance<I>(movements: I) -> Decimal
where
    I: IntoIterator<Item = (MovementType, Decimal)>,
{
    movements
        .into_iter()
        .map(|(movement_type, quantity)| movement_type.signed(quantity))
        .sum()
}

/// Comparison of a product's counters with its movement ledger.
///
/// `stock_current` must equal the ledger balance and `stock_reserved` must
/// equal the units held by open orders, so together the counters account for
/// every unit the ledger has seen leave or enter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReconciliation {
    pub ledger_balance: Decimal,
    pub open_reservations: i64,
    pub stock_current: i32,
    pub stock_reserved: i32,
    pub consistent: bool,
}

impl StockReconciliation {
    pub fn new(
        ledger_balance: Decimal,
        open_reservations: i64,
        stock_current: i32,
        stock_reserved: i32,
    ) -> Self {
        let consistent = ledger_balance == Decimal::from(stock_current)
            && open_reservations == i64::from(stock_reserved);
        Self {
            ledger_balance,
            open_reservations,
            stock_current,
            stock_reserved,
            consistent,
        }
    }
}

/// One active product's stock position, as fed to [`summarize_stock`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub catalog_name: String,
    pub grind_type: GrindType,
    pub stock_current: i32,
    pub stock_reserved: i32,
    pub stock_minimum: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryItem {
    pub product_catalog_name: String,
    pub grind_type: GrindType,
    pub total_stock_current: i64,
    pub total_stock_reserved: i64,
    pub total_stock_minimum: i64,
    pub low_stock_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub items: Vec<StockSummaryItem>,
    pub total_products: usize,
    pub total_low_stock_products: usize,
}

/// Group stock positions by catalog entry and grind
pub fn summarize_stock(positions: &[StockPosition]) -> StockSummary {
    let mut groups: BTreeMap<(String, GrindType), (i64, i64, i64)> = BTreeMap::new();
    for p in positions {
        let entry = groups
            .entry((p.catalog_name.clone(), p.grind_type))
            .or_default();
        entry.0 += i64::from(p.stock_current);
        entry.1 += i64::from(p.stock_reserved);
        entry.2 += i64::from(p.stock_minimum);
    }

    let items = groups
        .into_iter()
        .map(|((name, grind), (current, reserved, minimum))| StockSummaryItem {
            product_catalog_name: name,
            grind_type: grind,
            total_stock_current: current,
            total_stock_reserved: reserved,
            total_stock_minimum: minimum,
            low_stock_alert: current <= minimum,
        })
        .collect();

    StockSummary {
        items,
        total_products: positions.len(),
        total_low_stock_products: positions
            .iter()
            .filter(|p| p.stock_current <= p.stock_minimum)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str, grind: GrindType, current: i32, minimum: i32) -> StockPosition {
        StockPosition {
            catalog_name: name.to_string(),
            grind_type: grind,
            stock_current: current,
            stock_reserved: 1,
            stock_minimum: minimum,
        }
    }

    #[test]
    fn test_signed_quantities() {
        let q = Decimal::from(5);
        assert_eq!(MovementType::Inbound.signed(q), q);
        assert_eq!(MovementType::Outbound.signed(q), -q);
        assert_eq!(MovementType::Adjustment.signed(-q), -q);
    }

    #[test]
    fn test_ledger_balance() {
        let rows = vec![
            (MovementType::Inbound, Decimal::from(40)),
            (MovementType::Outbound, Decimal::from(6)),
            (MovementType::Inbound, Decimal::from(2)),
            (MovementType::Adjustment, Decimal::from(-1)),
        ];
        assert_eq!(ledger_balance(rows), Decimal::from(35));
    }

    #[test]
    fn test_reconciliation() {
        assert!(StockReconciliation::new(Decimal::from(35), 4, 35, 4).consistent);
        assert!(!StockReconciliation::new(Decimal::from(35), 4, 36, 3).consistent);
    }

    #[test]
    fn test_summarize_stock_groups_by_catalog_and_grind() {
        let summary = summarize_stock(&[
            position("Geisha 250g", GrindType::WholeBean, 3, 5),
            position("Geisha 250g", GrindType::WholeBean, 10, 5),
            position("Geisha 250g", GrindType::Fine, 2, 2),
            position("Bourbon 1kg", GrindType::Medium, 8, 1),
        ]);

        assert_eq!(summary.total_products, 4);
        assert_eq!(summary.total_low_stock_products, 2);
        assert_eq!(summary.items.len(), 3);

        let whole = summary
            .items
            .iter()
            .find(|i| i.product_catalog_name == "Geisha 250g" && i.grind_type == GrindType::WholeBean)
            .unwrap();
        assert_eq!(whole.total_stock_current, 13);
        assert_eq!(whole.total_stock_reserved, 2);
        assert_eq!(whole.total_stock_minimum, 10);
        assert!(!whole.low_stock_alert);
    }
}

//! Expense models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "expense_category", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    Transport,
    Packaging,
    Supplies,
    Services,
    Purchase,
    Production,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Transport => "TRANSPORT",
            ExpenseCategory::Packaging => "PACKAGING",
            ExpenseCategory::Supplies => "SUPPLIES",
            ExpenseCategory::Services => "SERVICES",
            ExpenseCategory::Purchase => "PURCHASE",
            ExpenseCategory::Production => "PRODUCTION",
            ExpenseCategory::Other => "OTHER",
        }
    }

    /// Purchase expenses mirror a batch's `total_cost` and must not be
    /// counted a second time when costing.
    pub fn adds_to_batch_cost(&self) -> bool {
        *self != ExpenseCategory::Purchase
    }
}

/// Concept line of the expense booked automatically for a batch purchase
pub fn batch_purchase_concept(batch_code: &str) -> String {
    format!("Batch {} purchase", batch_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_is_not_additional_cost() {
        assert!(!ExpenseCategory::Purchase.adds_to_batch_cost());
        assert!(ExpenseCategory::Transport.adds_to_batch_cost());
        assert!(ExpenseCategory::Production.adds_to_batch_cost());
    }

    #[test]
    fn test_batch_purchase_concept() {
        assert_eq!(batch_purchase_concept("LOT-7"), "Batch LOT-7 purchase");
    }
}

//! Product costing tests
//!
//! Unit cost of a packaged product from its batch, roast and packaging, and
//! the SKU it is sold under.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    calculate_unit_cost, generate_sku, units_produced, DomainError, GrindType, StockLevels,
    UnitCostInputs,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// 60 kg bought for 1500 with 300 of extra batch expenses; 10 kg roasted down to 8 kg
fn sample_inputs() -> UnitCostInputs {
    UnitCostInputs {
        batch_green_kg: dec("60"),
        batch_total_cost: dec("1500"),
        batch_additional_expenses: dec("300"),
        green_kg_used: dec("10"),
        roasted_kg_obtained: dec("8"),
        micro_batch_expenses: dec("50"),
        weight_grams: 250,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_unit_cost_of_quarter_kilo_bags() {
        let cost = calculate_unit_cost(&sample_inputs()).unwrap();
        assert_eq!(cost.prorated_batch_cost, dec("300"));
        assert_eq!(cost.micro_batch_expenses, dec("50"));
        assert_eq!(cost.total_cost, dec("350"));
        assert_eq!(cost.units_produced, dec("32"));
        assert_eq!(cost.unit_cost, dec("10.94"));
    }

    #[test]
    fn test_larger_bags_cost_more_per_unit() {
        let mut inputs = sample_inputs();
        inputs.weight_grams = 1000;
        let cost = calculate_unit_cost(&inputs).unwrap();
        assert_eq!(cost.units_produced, dec("8"));
        assert_eq!(cost.unit_cost, dec("43.75"));
    }

    #[test]
    fn test_roast_without_output_cannot_be_costed() {
        let mut inputs = sample_inputs();
        inputs.roasted_kg_obtained = Decimal::ZERO;
        assert_eq!(calculate_unit_cost(&inputs), Err(DomainError::NoUnitsProduced));
    }

    #[test]
    fn test_package_weight_must_be_positive() {
        assert!(units_produced(dec("8"), 0).is_err());
        assert_eq!(units_produced(dec("8"), 500).unwrap(), dec("16"));
    }

    #[test]
    fn test_sku_combines_roast_grind_and_catalog() {
        assert_eq!(
            generate_sku("MB-001", GrindType::WholeBean, "CAT250"),
            "MB-001-WHOLE_BEAN-CAT250"
        );
        assert_eq!(
            generate_sku("MB-014", GrindType::ExtraFine, "ESP1K"),
            "MB-014-EXTRA_FINE-ESP1K"
        );
    }

    #[test]
    fn test_low_stock_includes_the_minimum() {
        assert!(StockLevels::new(5, 0, 5).is_low());
        assert!(StockLevels::new(4, 2, 5).is_low());
        assert!(!StockLevels::new(6, 0, 5).is_low());
    }

    #[test]
    fn test_manual_adjustment_cannot_go_negative() {
        let stock = StockLevels::new(3, 1, 2);
        assert_eq!(stock.adjust(-3).unwrap().current, 0);
        assert_eq!(
            stock.adjust(-4),
            Err(DomainError::InsufficientStock {
                requested: 4,
                available: 3,
            })
        );
        assert_eq!(stock.adjust(10).unwrap(), StockLevels::new(13, 1, 2));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Expenses booked on the roast never make a package cheaper
    #[test]
    fn prop_roast_expenses_never_lower_unit_cost(
        expenses_cents in 1i64..1_000_000,
        weight_grams in prop::sample::select(vec![250, 340, 500, 1000]),
    ) {
        let mut inputs = sample_inputs();
        inputs.weight_grams = weight_grams;
        inputs.micro_batch_expenses = Decimal::ZERO;
        let base = calculate_unit_cost(&inputs).unwrap();

        inputs.micro_batch_expenses = Decimal::new(expenses_cents, 2);
        let with_expenses = calculate_unit_cost(&inputs).unwrap();

        prop_assert!(with_expenses.unit_cost >= base.unit_cost);
        prop_assert!(with_expenses.total_cost > base.total_cost);
    }

    /// Unit cost times units produced recovers the total within rounding
    #[test]
    fn prop_unit_cost_spreads_total(
        roasted_grams in 250i64..50_000,
        expenses_cents in 0i64..100_000,
    ) {
        let mut inputs = sample_inputs();
        inputs.roasted_kg_obtained = Decimal::new(roasted_grams, 3);
        inputs.micro_batch_expenses = Decimal::new(expenses_cents, 2);
        let cost = calculate_unit_cost(&inputs).unwrap();

        let units = Decimal::new(roasted_grams, 3) / dec("0.25");
        let recovered = cost.unit_cost * units;
        let tolerance = dec("0.005") * units + dec("0.01");
        prop_assert!((recovered - cost.total_cost).abs() <= tolerance);
    }
}

//! Green coffee and roasting tests
//!
//! Covers batch costing, green coffee consumption, roast corrections and roast
//! shrinkage.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    calculate_shrinkage, consume_green_coffee, cost_per_kg, rebase_green_weight, settle_roast_weight,
    BatchStatus, DomainError, RoastCostBreakdown,
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
    fn test_batch_purchase_cost_per_kg() {
        assert_eq!(cost_per_kg(dec("1500"), dec("60")).unwrap(), dec("25"));
        assert_eq!(cost_per_kg(dec("1000"), dec("30")).unwrap(), dec("33.33"));
        assert!(cost_per_kg(dec("1000"), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_roasts_drain_a_batch_until_finished() {
        let green = dec("60");
        let mut available = green;
        assert_eq!(BatchStatus::from_availability(green, available), BatchStatus::Raw);

        available = consume_green_coffee(available, dec("25")).unwrap();
        assert_eq!(available, dec("35"));
        assert_eq!(BatchStatus::from_availability(green, available), BatchStatus::InProcess);

        available = consume_green_coffee(available, dec("35")).unwrap();
        assert_eq!(available, Decimal::ZERO);
        assert_eq!(BatchStatus::from_availability(green, available), BatchStatus::Finished);

        let err = consume_green_coffee(available, dec("0.5")).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientGreenCoffee {
                requested: dec("0.5"),
                available: Decimal::ZERO,
            }
        );
    }

    #[test]
    fn test_purchased_weight_correction_keeps_roasted_coffee_consumed() {
        // 60 kg bought, 20 kg roasted, then the purchase is corrected to 50 kg
        assert_eq!(rebase_green_weight(dec("60"), dec("40"), dec("50")).unwrap(), dec("30"));
        // Cannot shrink below the 20 kg already roasted
        assert!(matches!(
            rebase_green_weight(dec("60"), dec("40"), dec("15")),
            Err(DomainError::GreenWeightBelowConsumed { .. })
        ));
    }

    #[test]
    fn test_typical_roast_shrinkage() {
        let shrinkage = calculate_shrinkage(dec("12"), dec("10.2")).unwrap();
        assert_eq!(shrinkage.loss_kg, dec("1.8"));
        assert_eq!(shrinkage.loss_percentage, dec("15"));
    }

    #[test]
    fn test_roast_cannot_gain_weight() {
        assert!(matches!(
            calculate_shrinkage(dec("5"), dec("5.1")),
            Err(DomainError::RoastedExceedsGreen { .. })
        ));
    }

    #[test]
    fn test_roast_cost_breakdown() {
        // 10 of 60 kg roasted, batch cost 1500 + 300 extras, 50 spent on the roast itself
        let cost = RoastCostBreakdown::calculate(dec("10"), dec("8"), dec("60"), dec("1800"), dec("50"))
            .unwrap();
        assert_eq!(cost.prorated_batch_cost, dec("300"));
        assert_eq!(cost.direct_expenses, dec("50"));
        assert_eq!(cost.total_cost, dec("350"));
        assert_eq!(cost.cost_per_roasted_kg, dec("43.75"));
    }

    #[test]
    fn test_roast_cost_with_nothing_roasted_has_zero_per_kg() {
        let cost = RoastCostBreakdown::calculate(dec("10"), Decimal::ZERO, dec("60"), dec("1800"), Decimal::ZERO)
            .unwrap();
        assert_eq!(cost.total_cost, dec("300"));
        assert_eq!(cost.cost_per_roasted_kg, Decimal::ZERO);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

/// Weights in grams turned into kilograms with three decimals
fn kg_strategy(max_grams: i64) -> impl Strategy<Value = Decimal> {
    (1i64..=max_grams).prop_map(|g| Decimal::new(g, 3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Shrinkage splits the green weight exactly and stays within 0..=100 %
    #[test]
    fn prop_shrinkage_accounts_for_all_green_coffee(
        (green_g, roasted_g) in (1i64..=200_000).prop_flat_map(|g| (Just(g), 0i64..=g))
    ) {
        let green = Decimal::new(green_g, 3);
        let roasted = Decimal::new(roasted_g, 3);
        let shrinkage = calculate_shrinkage(green, roasted).unwrap();
        prop_assert_eq!(shrinkage.loss_kg + roasted, green);
        prop_assert!(shrinkage.loss_percentage >= Decimal::ZERO);
        prop_assert!(shrinkage.loss_percentage <= Decimal::ONE_HUNDRED);
    }

    /// No sequence of roasts can take more green coffee than was bought
    #[test]
    fn prop_available_green_coffee_never_negative(
        green in kg_strategy(100_000),
        roasts in prop::collection::vec(kg_strategy(30_000), 1..20),
    ) {
        let mut available = green;
        let mut roasted_total = Decimal::ZERO;
        for used in roasts {
            match consume_green_coffee(available, used) {
                Ok(left) => {
                    roasted_total += used;
                    available = left;
                }
                Err(DomainError::InsufficientGreenCoffee { .. }) => {
                    prop_assert!(used > available);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(available >= Decimal::ZERO);
            prop_assert_eq!(available + roasted_total, green);
        }

        let status = BatchStatus::from_availability(green, available);
        if available.is_zero() {
            prop_assert_eq!(status, BatchStatus::Finished);
        } else if available == green {
            prop_assert_eq!(status, BatchStatus::Raw);
        } else {
            prop_assert_eq!(status, BatchStatus::InProcess);
        }
    }

    /// Roast corrections settled one at a time, each from the roast's current
    /// weight, keep the batch balanced: available plus everything roasted is
    /// always the purchased weight.
    #[test]
    fn prop_roast_corrections_keep_batch_balanced(
        green in kg_strategy(100_000),
        roasts in prop::collection::vec(kg_strategy(20_000), 1..6),
        edits in prop::collection::vec((0usize..6, 0i64..=30_000), 1..30),
    ) {
        let mut available = green;
        let mut used: Vec<Decimal> = Vec::new();
        for roast in roasts {
            if let Ok(left) = consume_green_coffee(available, roast) {
                available = left;
                used.push(roast);
            }
        }
        prop_assume!(!used.is_empty());

        for (index, grams) in edits {
            let index = index % used.len();
            // a zeroed roast has been removed
            if used[index].is_zero() {
                continue;
            }
            let new_used = Decimal::new(grams, 3);
            match settle_roast_weight(green, available, used[index], new_used) {
                Ok(settled) => {
                    available = settled;
                    used[index] = new_used;
                }
                Err(DomainError::InsufficientGreenCoffee { requested, .. }) => {
                    prop_assert!(requested > available);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(available >= Decimal::ZERO);
            prop_assert!(available <= green);
            prop_assert_eq!(available + used.iter().copied().sum::<Decimal>(), green);
        }
    }

    /// The prorated share never exceeds the batch's total cost
    #[test]
    fn prop_prorated_cost_bounded_by_batch_cost(
        green in kg_strategy(100_000),
        share in 1u32..=100,
        cents in 0i64..10_000_000,
    ) {
        let used = green * Decimal::from(share) / Decimal::ONE_HUNDRED;
        let batch_costs = Decimal::new(cents, 2);
        let cost = RoastCostBreakdown::calculate(used, Decimal::ZERO, green, batch_costs, Decimal::ZERO).unwrap();
        prop_assert!(cost.prorated_batch_cost <= batch_costs);
        prop_assert!(cost.prorated_batch_cost >= Decimal::ZERO);
    }
}

//! Roasting run (micro-batch) models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::types::round2;

/// Roast level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "roast_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoastType {
    Light,
    Medium,
    Dark,
}

impl RoastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoastType::Light => "LIGHT",
            RoastType::Medium => "MEDIUM",
            RoastType::Dark => "DARK",
        }
    }
}

/// Weight lost while roasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shrinkage {
    pub loss_kg: Decimal,
    pub loss_percentage: Decimal,
}

/// Calculate roast shrinkage from green and roasted weight
pub fn calculate_shrinkage(
    green_kg_used: Decimal,
    roasted_kg_obtained: Decimal,
) -> Result<Shrinkage, DomainError> {
    if green_kg_used <= Decimal::ZERO {
        return Err(DomainError::NonPositive("green_kg_used"));
    }
    if roasted_kg_obtained < Decimal::ZERO {
        return Err(DomainError::Negative("roasted_kg_obtained"));
    }
    if roasted_kg_obtained > green_kg_used {
        return Err(DomainError::RoastedExceedsGreen {
            green: green_kg_used,
            roasted: roasted_kg_obtained,
        });
    }

    let loss_kg = green_kg_used - roasted_kg_obtained;
    Ok(Shrinkage {
        loss_kg,
        loss_percentage: round2(loss_kg / green_kg_used * Decimal::ONE_HUNDRED),
    })
}

/// Share of a batch's cost carried by one roast, proportional to green weight used.
///
/// `batch_costs` is the purchase price plus every additional expense booked
/// against the batch.
pub fn prorated_batch_cost(
    green_kg_used: Decimal,
    batch_green_kg: Decimal,
    batch_costs: Decimal,
) -> Result<Decimal, DomainError> {
    if batch_green_kg <= Decimal::ZERO {
        return Err(DomainError::NonPositive("green_kg"));
    }
    Ok(green_kg_used / batch_green_kg * batch_costs)
}

/// Cost picture of a single roast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoastCostBreakdown {
    pub prorated_batch_cost: Decimal,
    pub direct_expenses: Decimal,
    pub total_cost: Decimal,
    pub cost_per_roasted_kg: Decimal,
}

impl RoastCostBreakdown {
    pub fn calculate(
        green_kg_used: Decimal,
        roasted_kg_obtained: Decimal,
        batch_green_kg: Decimal,
        batch_costs: Decimal,
        direct_expenses: Decimal,
    ) -> Result<Self, DomainError> {
        let prorated = prorated_batch_cost(green_kg_used, batch_green_kg, batch_costs)?;
        let total = prorated + direct_expenses;
        let cost_per_roasted_kg = if roasted_kg_obtained > Decimal::ZERO {
            round2(total / roasted_kg_obtained)
        } else {
            Decimal::ZERO
        };

        Ok(Self {
            prorated_batch_cost: round2(prorated),
            direct_expenses: round2(direct_expenses),
            total_cost: round2(total),
            cost_per_roasted_kg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_shrinkage() {
        let s = calculate_shrinkage(dec("10"), dec("8.5")).unwrap();
        assert_eq!(s.loss_kg, dec("1.5"));
        assert_eq!(s.loss_percentage, dec("15"));

        let s = calculate_shrinkage(dec("3"), dec("2.5")).unwrap();
        assert_eq!(s.loss_percentage, dec("16.67"));
    }

    #[test]
    fn test_shrinkage_rejects_impossible_roasts() {
        assert!(calculate_shrinkage(Decimal::ZERO, Decimal::ZERO).is_err());
        assert!(matches!(
            calculate_shrinkage(dec("5"), dec("5.2")),
            Err(DomainError::RoastedExceedsGreen { .. })
        ));
        assert!(calculate_shrinkage(dec("5"), dec("-1")).is_err());
    }

    #[test]
    fn test_roast_cost_breakdown() {
        // 10 of 60 kg roasted; batch cost 1500 + 300 extra; 50 in roast expenses
        let b = RoastCostBreakdown::calculate(dec("10"), dec("8"), dec("60"), dec("1800"), dec("50"))
            .unwrap();
        assert_eq!(b.prorated_batch_cost, dec("300"));
        assert_eq!(b.total_cost, dec("350"));
        assert_eq!(b.cost_per_roasted_kg, dec("43.75"));
    }
}

//! Sellable product (stock-keeping unit) models and unit costing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::micro_batch::prorated_batch_cost;
use crate::types::round2;

/// How the roasted beans are ground before packaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "grind_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrindType {
    WholeBean,
    Coarse,
    Medium,
    Fine,
    ExtraFine,
}

impl GrindType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrindType::WholeBean => "WHOLE_BEAN",
            GrindType::Coarse => "COARSE",
            GrindType::Medium => "MEDIUM",
            GrindType::Fine => "FINE",
            GrindType::ExtraFine => "EXTRA_FINE",
        }
    }
}

/// SKU for a product: `{micro-batch code}-{grind}-{catalog code}`
pub fn generate_sku(micro_batch_code: &str, grind: GrindType, catalog_code: &str) -> String {
    format!("{}-{}-{}", micro_batch_code, grind.as_str(), catalog_code)
}

/// Package weight in kilograms
pub fn package_kg(weight_grams: i32) -> Decimal {
    Decimal::from(weight_grams) / Decimal::ONE_THOUSAND
}

/// Number of packages a roast can fill
pub fn units_produced(roasted_kg: Decimal, weight_grams: i32) -> Result<Decimal, DomainError> {
    if weight_grams <= 0 {
        return Err(DomainError::NonPositive("weight_grams"));
    }
    Ok(roasted_kg / package_kg(weight_grams))
}

/// Everything needed to cost one package of a roast
#[derive(Debug, Clone, Copy)]
pub struct UnitCostInputs {
    pub batch_green_kg: Decimal,
    pub batch_total_cost: Decimal,
    /// Batch expenses other than the purchase itself
    pub batch_additional_expenses: Decimal,
    pub green_kg_used: Decimal,
    pub roasted_kg_obtained: Decimal,
    pub micro_batch_expenses: Decimal,
    pub weight_grams: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCostBreakdown {
    pub prorated_batch_cost: Decimal,
    pub micro_batch_expenses: Decimal,
    pub total_cost: Decimal,
    pub units_produced: Decimal,
    pub unit_cost: Decimal,
}

/// Unit cost of a package: prorated batch cost plus roast expenses, spread
/// over the packages the roast fills.
pub fn calculate_unit_cost(inputs: &UnitCostInputs) -> Result<UnitCostBreakdown, DomainError> {
    let batch_costs = inputs.batch_total_cost + inputs.batch_additional_expenses;
    let prorated = prorated_batch_cost(inputs.green_kg_used, inputs.batch_green_kg, batch_costs)?;
    let total = prorated + inputs.micro_batch_expenses;

    let units = units_produced(inputs.roasted_kg_obtained, inputs.weight_grams)?;
    if units <= Decimal::ZERO {
        return Err(DomainError::NoUnitsProduced);
    }

    Ok(UnitCostBreakdown {
        prorated_batch_cost: round2(prorated),
        micro_batch_expenses: round2(inputs.micro_batch_expenses),
        total_cost: round2(total),
        units_produced: round2(units),
        unit_cost: round2(total / units),
    })
}

/// Stock counters of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub current: i32,
    pub reserved: i32,
    pub minimum: i32,
}

impl StockLevels {
    pub fn new(current: i32, reserved: i32, minimum: i32) -> Self {
        Self {
            current,
            reserved,
            minimum,
        }
    }

    pub fn is_low(&self) -> bool {
        self.current <= self.minimum
    }

    /// Move units from available stock to the reservation of an open order
    pub fn reserve(self, quantity: i32) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::NonPositive("quantity"));
        }
        if self.current < quantity {
            return Err(DomainError::InsufficientStock {
                requested: quantity,
                available: self.current,
            });
        }
        let reserved = self
            .reserved
            .checked_add(quantity)
            .ok_or(DomainError::StockOverflow("quantity"))?;
        Ok(Self {
            current: self.current - quantity,
            reserved,
            ..self
        })
    }

    /// Drop the reservation of a delivered order; the units have left the shop
    pub fn release_delivered(self, quantity: i32) -> Result<Self, DomainError> {
        self.check_reserved(quantity)?;
        Ok(Self {
            reserved: self.reserved - quantity,
            ..self
        })
    }

    /// Put the reservation of a cancelled order back on the shelf
    pub fn return_cancelled(self, quantity: i32) -> Result<Self, DomainError> {
        self.check_reserved(quantity)?;
        let current = self
            .current
            .checked_add(quantity)
            .ok_or(DomainError::StockOverflow("quantity"))?;
        Ok(Self {
            current,
            reserved: self.reserved - quantity,
            ..self
        })
    }

    /// Apply a signed manual correction to the available stock
    pub fn adjust(self, delta: i32) -> Result<Self, DomainError> {
        let current = self
            .current
            .checked_add(delta)
            .ok_or(DomainError::StockOverflow("delta"))?;
        if current < 0 {
            return Err(DomainError::InsufficientStock {
                requested: delta.saturating_neg(),
                available: self.current,
            });
        }
        Ok(Self { current, ..self })
    }

    fn check_reserved(&self, quantity: i32) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::NonPositive("quantity"));
        }
        if self.reserved < quantity {
            return Err(DomainError::ReleaseExceedsReserved {
                requested: quantity,
                reserved: self.reserved,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn inputs() -> UnitCostInputs {
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

    #[test]
    fn test_generate_sku() {
        assert_eq!(
            generate_sku("MB-001", GrindType::WholeBean, "CAT250"),
            "MB-001-WHOLE_BEAN-CAT250"
        );
    }

    #[test]
    fn test_unit_cost() {
        // (10/60 * 1800 + 50) / (8 / 0.25) = 350 / 32
        let b = calculate_unit_cost(&inputs()).unwrap();
        assert_eq!(b.prorated_batch_cost, dec("300"));
        assert_eq!(b.total_cost, dec("350"));
        assert_eq!(b.units_produced, dec("32"));
        assert_eq!(b.unit_cost, dec("10.94"));
    }

    #[test]
    fn test_unit_cost_without_output_is_rejected() {
        let mut i = inputs();
        i.roasted_kg_obtained = Decimal::ZERO;
        assert_eq!(calculate_unit_cost(&i), Err(DomainError::NoUnitsProduced));

        let mut i = inputs();
        i.weight_grams = 0;
        assert_eq!(calculate_unit_cost(&i), Err(DomainError::NonPositive("weight_grams")));
    }

    #[test]
    fn test_reserve_then_deliver() {
        let s = StockLevels::new(10, 0, 2).reserve(4).unwrap();
        assert_eq!((s.current, s.reserved), (6, 4));
        let s = s.release_delivered(4).unwrap();
        assert_eq!((s.current, s.reserved), (6, 0));
    }

    #[test]
    fn test_reserve_then_cancel_restores_stock() {
        let s = StockLevels::new(10, 1, 2).reserve(3).unwrap();
        let s = s.return_cancelled(3).unwrap();
        assert_eq!(s, StockLevels::new(10, 1, 2));
    }

    #[test]
    fn test_reserve_more_than_available() {
        assert_eq!(
            StockLevels::new(2, 0, 0).reserve(3),
            Err(DomainError::InsufficientStock {
                requested: 3,
                available: 2
            })
        );
        assert!(StockLevels::new(2, 0, 0).reserve(0).is_err());
    }

    #[test]
    fn test_adjust_and_low_stock() {
        let s = StockLevels::new(5, 0, 3);
        assert!(!s.is_low());
        let s = s.adjust(-2).unwrap();
        assert!(s.is_low());
        assert!(s.adjust(-4).is_err());
        assert_eq!(s.adjust(7).unwrap().current, 10);
    }

    #[test]
    fn test_counters_refuse_to_overflow() {
        assert_eq!(
            StockLevels::new(1, 0, 0).adjust(i32::MAX),
            Err(DomainError::StockOverflow("delta"))
        );
        assert_eq!(
            StockLevels::new(5, 0, 0).adjust(i32::MIN),
            Err(DomainError::InsufficientStock {
                requested: i32::MAX,
                available: 5
            })
        );
        assert_eq!(
            StockLevels::new(3, i32::MAX, 0).reserve(1),
            Err(DomainError::StockOverflow("quantity"))
        );
        assert_eq!(
            StockLevels::new(i32::MAX, 1, 0).return_cancelled(1),
            Err(DomainError::StockOverflow("quantity"))
        );
        // the edges themselves are still reachable
        assert_eq!(StockLevels::new(0, 0, 0).adjust(i32::MAX).unwrap().current, i32::MAX);
    }
}

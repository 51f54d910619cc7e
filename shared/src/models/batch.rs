//! Green coffee batch models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::types::round2;

/// Lifecycle of a green coffee batch, driven by how much of it is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "batch_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Raw,
    InProcess,
    Finished,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Raw => "RAW",
            BatchStatus::InProcess => "IN_PROCESS",
            BatchStatus::Finished => "FINISHED",
        }
    }

    /// Derive the status from the purchased and remaining green weight
    pub fn from_availability(green_kg: Decimal, green_kg_available: Decimal) -> Self {
        if green_kg_available <= Decimal::ZERO {
            BatchStatus::Finished
        } else if green_kg_available >= green_kg {
            BatchStatus::Raw
        } else {
            BatchStatus::InProcess
        }
    }
}

/// Purchase price per kilogram of green coffee
pub fn cost_per_kg(total_cost: Decimal, green_kg: Decimal) -> Result<Decimal, DomainError> {
    if green_kg <= Decimal::ZERO {
        return Err(DomainError::NonPositive("green_kg"));
    }
    if total_cost < Decimal::ZERO {
        return Err(DomainError::Negative("total_cost"));
    }
    Ok(round2(total_cost / green_kg))
}

/// Take `used` kg out of the available green coffee and return what is left
pub fn consume_green_coffee(available: Decimal, used: Decimal) -> Result<Decimal, DomainError> {
    if used <= Decimal::ZERO {
        return Err(DomainError::NonPositive("green_kg_used"));
    }
    if used > available {
        return Err(DomainError::InsufficientGreenCoffee {
            requested: used,
            available,
        });
    }
    Ok(available - used)
}

/// Apply a correction of the purchased weight to the available weight.
///
/// Whatever has already been roasted stays consumed, so the available weight
/// moves by the same delta as the purchased weight.
pub fn rebase_green_weight(
    old_green_kg: Decimal,
    available: Decimal,
    new_green_kg: Decimal,
) -> Result<Decimal, DomainError> {
    if new_green_kg <= Decimal::ZERO {
        return Err(DomainError::NonPositive("green_kg"));
    }
    let rebased = available + (new_green_kg - old_green_kg);
    if rebased < Decimal::ZERO {
        return Err(DomainError::GreenWeightBelowConsumed {
            consumed: old_green_kg - available,
        });
    }
    Ok(rebased)
}

/// Settle a roast's changed green weight against its batch.
///
/// `available` must be read under the batch lock and `old_used` under the
/// roast lock. A larger roast draws the difference from the batch, a smaller
/// one (or zero, when the roast is removed) hands it back, never above what
/// was purchased.
pub fn settle_roast_weight(
    green_kg: Decimal,
    available: Decimal,
    old_used: Decimal,
    new_used: Decimal,
) -> Result<Decimal, DomainError> {
    if new_used < Decimal::ZERO {
        return Err(DomainError::Negative("green_kg_used"));
    }
    let delta = new_used - old_used;
    let settled = available - delta;
    if settled < Decimal::ZERO {
        return Err(DomainError::InsufficientGreenCoffee {
            requested: delta,
            available,
        });
    }
    Ok(settled.min(green_kg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_cost_per_kg() {
        assert_eq!(cost_per_kg(dec("1500"), dec("60")).unwrap(), dec("25"));
        assert_eq!(cost_per_kg(dec("100"), dec("3")).unwrap(), dec("33.33"));
        assert_eq!(
            cost_per_kg(dec("100"), Decimal::ZERO),
            Err(DomainError::NonPositive("green_kg"))
        );
    }

    #[test]
    fn test_status_follows_availability() {
        assert_eq!(BatchStatus::from_availability(dec("60"), dec("60")), BatchStatus::Raw);
        assert_eq!(BatchStatus::from_availability(dec("60"), dec("12.5")), BatchStatus::InProcess);
        assert_eq!(BatchStatus::from_availability(dec("60"), Decimal::ZERO), BatchStatus::Finished);
    }

    #[test]
    fn test_consume_green_coffee_never_goes_negative() {
        assert_eq!(consume_green_coffee(dec("10"), dec("4.5")).unwrap(), dec("5.5"));
        assert_eq!(consume_green_coffee(dec("10"), dec("10")).unwrap(), Decimal::ZERO);
        assert!(matches!(
            consume_green_coffee(dec("10"), dec("10.01")),
            Err(DomainError::InsufficientGreenCoffee { .. })
        ));
        assert!(consume_green_coffee(dec("10"), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_rebase_green_weight() {
        // 60 kg bought, 20 kg roasted, corrected to 55 kg
        assert_eq!(rebase_green_weight(dec("60"), dec("40"), dec("55")).unwrap(), dec("35"));
        // correcting below what was already roasted is refused
        assert_eq!(
            rebase_green_weight(dec("60"), dec("40"), dec("15")),
            Err(DomainError::GreenWeightBelowConsumed { consumed: dec("20") })
        );
    }

    #[test]
    fn test_settle_roast_weight() {
        // 60 kg bought, a 20 kg roast leaves 40 kg
        assert_eq!(settle_roast_weight(dec("60"), dec("40"), dec("20"), dec("25")).unwrap(), dec("35"));
        assert_eq!(settle_roast_weight(dec("60"), dec("40"), dec("20"), dec("12")).unwrap(), dec("48"));
        // removing the roast returns all of it
        assert_eq!(settle_roast_weight(dec("60"), dec("40"), dec("20"), Decimal::ZERO).unwrap(), dec("60"));
        assert_eq!(
            settle_roast_weight(dec("60"), dec("3"), dec("20"), dec("24")),
            Err(DomainError::InsufficientGreenCoffee {
                requested: dec("4"),
                available: dec("3"),
            })
        );
        assert_eq!(
            settle_roast_weight(dec("60"), dec("40"), dec("20"), dec("-1")),
            Err(DomainError::Negative("green_kg_used"))
        );
    }

    #[test]
    fn test_settle_roast_weight_caps_at_purchase() {
        // availability never rises above the purchased weight
        assert_eq!(settle_roast_weight(dec("50"), dec("40"), dec("20"), Decimal::ZERO).unwrap(), dec("50"));
    }

    #[test]
    fn test_concurrent_edits_settle_from_locked_reads() {
        // Two edits of the same 20 kg roast, 20 -> 25 then 25 -> 30.
        let green = dec("60");
        let after_first = settle_roast_weight(green, dec("40"), dec("20"), dec("25")).unwrap();
        let after_second = settle_roast_weight(green, after_first, dec("25"), dec("30")).unwrap();
        assert_eq!(after_second, dec("30"));
        assert_eq!(after_second + dec("30"), green);

        // The second edit computed from the stale 20 kg read debits the batch twice.
        let stale = settle_roast_weight(green, after_first, dec("20"), dec("30")).unwrap();
        assert_eq!(stale, dec("25"));
        assert_ne!(stale + dec("30"), green);
    }
}

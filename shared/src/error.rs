//! Domain rule violations raised by the pure calculations in this crate

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("{0} cannot be negative")]
    Negative(&'static str),

    #[error("requested {requested} kg of green coffee but only {available} kg are available")]
    InsufficientGreenCoffee { requested: Decimal, available: Decimal },

    #[error("roasted weight {roasted} kg exceeds green weight {green} kg")]
    RoastedExceedsGreen { green: Decimal, roasted: Decimal },

    #[error("green weight cannot drop below the {consumed} kg already roasted")]
    GreenWeightBelowConsumed { consumed: Decimal },

    #[error("requested {requested} units but only {available} are in stock")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("cannot release {requested} units, only {reserved} are reserved")]
    ReleaseExceedsReserved { requested: i32, reserved: i32 },

    #[error("{0} would take the stock counters out of range")]
    StockOverflow(&'static str),

    #[error("the roast yields no sellable units for this package size")]
    NoUnitsProduced,

    #[error("order total cannot be negative")]
    NegativeTotal,

    #[error("order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl DomainError {
    /// Field name the violation refers to, when there is one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::NonPositive(field)
            | DomainError::Negative(field)
            | DomainError::StockOverflow(field) => Some(*field),
            DomainError::InsufficientGreenCoffee { .. } => Some("green_kg_used"),
            DomainError::RoastedExceedsGreen { .. } => Some("roasted_kg_obtained"),
            DomainError::GreenWeightBelowConsumed { .. } => Some("green_kg"),
            DomainError::InsufficientStock { .. } => Some("quantity"),
            DomainError::NegativeTotal => Some("discount"),
            _ => None,
        }
    }
}

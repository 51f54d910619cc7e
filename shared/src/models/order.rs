//! Sales order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;
use crate::models::product::package_kg;
use crate::types::round2;

/// Order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Open orders still hold a stock reservation
    pub fn is_open(&self) -> bool {
        !matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Whether a regular status update may move an order from `self` to `next`.
    ///
    /// Orders only move forward along the fulfilment chain (steps may be
    /// skipped). Cancellation has its own operation and is never reachable
    /// from here.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    pub fn ensure_can_advance_to(&self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub fn can_cancel(&self) -> bool {
        *self != OrderStatus::Delivered
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment methods accepted by the shop (orders and expenses)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Yape,
    Plin,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Yape => "YAPE",
            PaymentMethod::Plin => "PLIN",
            PaymentMethod::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CASH" => Some(PaymentMethod::Cash),
            "CARD" => Some(PaymentMethod::Card),
            "TRANSFER" => Some(PaymentMethod::Transfer),
            "YAPE" => Some(PaymentMethod::Yape),
            "PLIN" => Some(PaymentMethod::Plin),
            "OTHER" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// Channel through which an order arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "order_origin", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderOrigin {
    Whatsapp,
    Website,
    Instagram,
    Phone,
    Other,
}

impl OrderOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderOrigin::Whatsapp => "WHATSAPP",
            OrderOrigin::Website => "WEBSITE",
            OrderOrigin::Instagram => "INSTAGRAM",
            OrderOrigin::Phone => "PHONE",
            OrderOrigin::Other => "OTHER",
        }
    }
}

/// Order number derived from the creation instant
pub fn order_number(at: DateTime<Utc>) -> String {
    format!("ORD-{}", at.timestamp_millis())
}

/// Priced order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sold_kg: Decimal,
}

impl OrderLine {
    pub fn price(quantity: i32, unit_price: Decimal, weight_grams: i32) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::NonPositive("quantity"));
        }
        let qty = Decimal::from(quantity);
        Ok(Self {
            quantity,
            unit_price,
            subtotal: round2(unit_price * qty),
            sold_kg: package_kg(weight_grams) * qty,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Order total: line subtotals minus discount plus shipping
pub fn calculate_order_totals(
    lines: &[OrderLine],
    discount: Decimal,
    shipping: Decimal,
) -> Result<OrderTotals, DomainError> {
    if discount < Decimal::ZERO {
        return Err(DomainError::Negative("discount"));
    }
    if shipping < Decimal::ZERO {
        return Err(DomainError::Negative("shipping"));
    }

    let subtotal: Decimal = lines.iter().map(|l| l.subtotal).sum();
    let total = subtotal - discount + shipping;
    if total < Decimal::ZERO {
        return Err(DomainError::NegativeTotal);
    }

    Ok(OrderTotals {
        subtotal,
        discount,
        shipping,
        total: round2(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Pending.can_advance_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_advance_to(OrderStatus::Delivered));
        assert!(OrderStatus::Ready.can_advance_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_backward_and_cancel_transitions_rejected() {
        assert!(!OrderStatus::Ready.can_advance_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_advance_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_advance_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_advance_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.can_advance_to(OrderStatus::Ready));
        assert_eq!(
            OrderStatus::Delivered.ensure_can_advance_to(OrderStatus::Pending),
            Err(DomainError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            })
        );
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!(OrderStatus::parse("READY"), Some(OrderStatus::Ready));
        assert_eq!(OrderStatus::parse("ready"), None);
        assert_eq!(PaymentMethod::parse("YAPE"), Some(PaymentMethod::Yape));
        assert_eq!(PaymentMethod::parse("BITCOIN"), None);
    }

    #[test]
    fn test_open_and_cancellable() {
        assert!(OrderStatus::Ready.is_open());
        assert!(!OrderStatus::Delivered.is_open());
        assert!(!OrderStatus::Cancelled.is_open());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(OrderStatus::Preparing.can_cancel());
    }

    #[test]
    fn test_order_line_and_totals() {
        let a = OrderLine::price(2, dec("35.50"), 250).unwrap();
        let b = OrderLine::price(1, dec("60"), 1000).unwrap();
        assert_eq!(a.subtotal, dec("71"));
        assert_eq!(a.sold_kg, dec("0.5"));
        assert_eq!(b.sold_kg, dec("1"));

        let totals = calculate_order_totals(&[a, b], dec("11"), dec("10")).unwrap();
        assert_eq!(totals.subtotal, dec("131"));
        assert_eq!(totals.total, dec("130"));
    }

    #[test]
    fn test_negative_total_rejected() {
        let a = OrderLine::price(1, dec("20"), 250).unwrap();
        assert_eq!(
            calculate_order_totals(&[a], dec("25"), Decimal::ZERO),
            Err(DomainError::NegativeTotal)
        );
        assert!(calculate_order_totals(&[a], dec("-1"), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_order_number_uses_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(order_number(at), "ORD-1700000000123");
    }
}

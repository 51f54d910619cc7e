//! Client models and purchase statistics

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::order::{OrderStatus, PaymentMethod};

/// The parts of an order that client statistics look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    pub first_purchase_date: Option<DateTime<Utc>>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub number_of_orders: usize,
    /// Sum of delivered order totals
    pub total_amount_paid: Decimal,
    pub days_without_orders: Option<i64>,
    pub favorite_payment_method: Option<PaymentMethod>,
}

impl ClientStats {
    /// Compute statistics for a client's orders as seen on `today`.
    ///
    /// The favourite payment method is the most used one; on a tie the method
    /// used first wins.
    pub fn from_purchases(purchases: &[PurchaseRecord], today: NaiveDate) -> Self {
        let mut ordered: Vec<&PurchaseRecord> = purchases.iter().collect();
        ordered.sort_by_key(|p| p.placed_at);

        let first = ordered.first().map(|p| p.placed_at);
        let last = ordered.last().map(|p| p.placed_at);

        let total_amount_paid = ordered
            .iter()
            .filter(|p| p.status == OrderStatus::Delivered)
            .map(|p| p.total)
            .sum();

        let mut counts: HashMap<PaymentMethod, (usize, usize)> = HashMap::new();
        for (position, p) in ordered.iter().enumerate() {
            counts.entry(p.payment_method).or_insert((0, position)).0 += 1;
        }
        let favorite_payment_method = counts
            .into_iter()
            .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
                count_a.cmp(count_b).then(first_b.cmp(first_a))
            })
            .map(|(method, _)| method);

        Self {
            first_purchase_date: first,
            last_purchase_date: last,
            number_of_orders: ordered.len(),
            total_amount_paid,
            days_without_orders: last.map(|at| (today - at.date_naive()).num_days()),
            favorite_payment_method,
        }
    }
}

//! Dashboard aggregates over delivered sales, expenses and stock

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{round2, DateRange, GrindType};

const DEFAULT_TOP_LIMIT: u32 = 5;
const MAX_TOP_LIMIT: u32 = 50;

/// Dashboard service
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
}

/// Optional inclusive date window
#[derive(Debug, Default, Deserialize)]
pub struct DashboardFilter {
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

impl DashboardFilter {
    fn range(&self) -> AppResult<DateRange> {
        let range = DateRange {
            start_date: self.start_date,
            end_date: self.end_date,
        };
        if !range.is_valid() {
            return Err(AppError::validation(
                "start_date",
                "Start date must not be after end date",
                "La fecha de inicio no puede ser posterior a la fecha de fin",
            ));
        }
        Ok(range)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopFilter {
    pub limit: Option<u32>,
}

impl TopFilter {
    fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT))
    }
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SalesMetrics {
    pub delivered_orders: i64,
    pub average_revenue_per_order: Decimal,
    pub total_units_sold: i64,
}

#[derive(Debug, Serialize)]
pub struct InventoryMetrics {
    pub total_available_stock: i64,
    pub total_units_sold: i64,
    pub percentage_sold: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TopClient {
    pub id: Uuid,
    pub name: String,
    pub total_purchased: Decimal,
    pub order_count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TopProduct {
    pub id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub grind_type: GrindType,
    pub total_sold: i64,
    pub total_revenue: Decimal,
}

fn average(total: Decimal, count: i64) -> Decimal {
    if count > 0 {
        round2(total / Decimal::from(count))
    } else {
        Decimal::ZERO
    }
}

/// Share of units sold out of everything that was on offer
fn percentage_sold(sold: i64, available: i64) -> Decimal {
    let offered = sold + available;
    if offered > 0 {
        round2(Decimal::from(sold) / Decimal::from(offered) * Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    }
}

impl DashboardService {
    /// Create a new DashboardService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Delivered sales against expenses
    pub async fn overview(&self, filter: DashboardFilter) -> AppResult<Overview> {
        let range = filter.range()?;

        let total_sales = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM orders
            WHERE status = 'DELIVERED' AND deleted_at IS NULL
              AND ($1::TIMESTAMPTZ IS NULL OR order_date >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR order_date < $2)
            "#,
        )
        .bind(range.start_bound())
        .bind(range.end_bound())
        .fetch_one(&self.db)
        .await?;

        let total_expenses = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM expenses
            WHERE deleted_at IS NULL
              AND ($1::DATE IS NULL OR date >= $1)
              AND ($2::DATE IS NULL OR date <= $2)
            "#,
        )
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_one(&self.db)
        .await?;

        Ok(Overview {
            total_sales,
            total_expenses,
            net_profit: total_sales - total_expenses,
        })
    }

    pub async fn sales_metrics(&self, filter: DashboardFilter) -> AppResult<SalesMetrics> {
        let range = filter.range()?;

        let (delivered_orders, revenue) = sqlx::query_as::<_, (i64, Decimal)>(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total), 0)
            FROM orders
            WHERE status = 'DELIVERED' AND deleted_at IS NULL
              AND ($1::TIMESTAMPTZ IS NULL OR order_date >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR order_date < $2)
            "#,
        )
        .bind(range.start_bound())
        .bind(range.end_bound())
        .fetch_one(&self.db)
        .await?;

        let total_units_sold = self.delivered_units(&range).await?;

        Ok(SalesMetrics {
            delivered_orders,
            average_revenue_per_order: average(revenue, delivered_orders),
            total_units_sold,
        })
    }

    pub async fn inventory_metrics(&self, filter: DashboardFilter) -> AppResult<InventoryMetrics> {
        let range = filter.range()?;

        let total_available_stock = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(stock_current), 0)::BIGINT
            FROM products
            WHERE active = TRUE AND deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        let total_units_sold = self.delivered_units(&range).await?;

        Ok(InventoryMetrics {
            total_available_stock,
            total_units_sold,
            percentage_sold: percentage_sold(total_units_sold, total_available_stock),
        })
    }

    /// Clients ranked by delivered purchases
    pub async fn top_clients(&self, filter: TopFilter) -> AppResult<Vec<TopClient>> {
        let clients = sqlx::query_as::<_, TopClient>(
            r#"
            SELECT c.id, c.name, SUM(o.total) AS total_purchased, COUNT(o.id) AS order_count
            FROM orders o
            JOIN clients c ON c.id = o.client_id
            WHERE o.status = 'DELIVERED' AND o.deleted_at IS NULL
            GROUP BY c.id, c.name
            ORDER BY total_purchased DESC, order_count DESC
            LIMIT $1
            "#,
        )
        .bind(filter.limit())
        .fetch_all(&self.db)
        .await?;
        Ok(clients)
    }

    /// Products ranked by delivered units
    pub async fn top_products(&self, filter: TopFilter) -> AppResult<Vec<TopProduct>> {
        let products = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT p.id, p.sku, c.name AS product_name, p.grind_type,
                   SUM(oi.quantity)::BIGINT AS total_sold, SUM(oi.subtotal) AS total_revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            JOIN product_catalog c ON c.id = p.product_catalog_id
            WHERE o.status = 'DELIVERED' AND o.deleted_at IS NULL
            GROUP BY p.id, p.sku, c.name, p.grind_type
            ORDER BY total_sold DESC, total_revenue DESC
            LIMIT $1
            "#,
        )
        .bind(filter.limit())
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    async fn delivered_units(&self, range: &DateRange) -> AppResult<i64> {
        let units = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(oi.quantity), 0)::BIGINT
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.status = 'DELIVERED' AND o.deleted_at IS NULL
              AND ($1::TIMESTAMPTZ IS NULL OR o.order_date >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR o.order_date < $2)
            "#,
        )
        .bind(range.start_bound())
        .bind(range.end_bound())
        .fetch_one(&self.db)
        .await?;
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_sold() {
        assert_eq!(percentage_sold(25, 75), Decimal::from(25));
        assert_eq!(percentage_sold(1, 2), Decimal::new(3333, 2));
        assert_eq!(percentage_sold(0, 0), Decimal::ZERO);
        assert_eq!(percentage_sold(10, 0), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_average_handles_no_orders() {
        assert_eq!(average(Decimal::from(100), 0), Decimal::ZERO);
        assert_eq!(average(Decimal::from(100), 3), Decimal::new(3333, 2));
    }

    #[test]
    fn test_top_limit_is_clamped() {
        assert_eq!(TopFilter { limit: None }.limit(), 5);
        assert_eq!(TopFilter { limit: Some(0) }.limit(), 1);
        assert_eq!(TopFilter { limit: Some(500) }.limit(), 50);
    }
}

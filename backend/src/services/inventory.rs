//! Inventory ledger service: movement history, stock summary and reconciliation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    summarize_stock, DateRange, GrindType, MovementReason, MovementType, PaginatedResponse,
    Pagination, StockPosition, StockReconciliation, StockSummary,
};

/// Inventory service for the movement ledger
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Inventory movement record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_sku: Option<String>,
    pub batch_id: Option<Uuid>,
    pub batch_code: Option<String>,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit: String,
    pub reason: MovementReason,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub user_id: Uuid,
    pub user_name: String,
    pub movement_date: DateTime<Utc>,
}

/// A ledger row about to be written as part of a larger operation
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Positive for inbound/outbound rows, signed for adjustments
    pub quantity: Decimal,
    pub unit: String,
    pub reason: MovementReason,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub user_id: Uuid,
}

impl NewMovement {
    /// Green coffee entering or leaving a batch, in kilograms
    pub fn for_batch(
        batch_id: Uuid,
        movement_type: MovementType,
        quantity_kg: Decimal,
        reason: MovementReason,
        reference: impl Into<String>,
        user_id: Uuid,
    ) -> Self {
        Self {
            product_id: None,
            batch_id: Some(batch_id),
            movement_type,
            quantity: quantity_kg,
            unit: "kg".to_string(),
            reason,
            reference: Some(reference.into()),
            notes: None,
            user_id,
        }
    }

    /// Packaged units entering or leaving a product's stock
    pub fn for_product(
        product_id: Uuid,
        movement_type: MovementType,
        units: i32,
        unit: impl Into<String>,
        reason: MovementReason,
        reference: impl Into<String>,
        user_id: Uuid,
    ) -> Self {
        Self {
            product_id: Some(product_id),
            batch_id: None,
            movement_type,
            quantity: Decimal::from(units),
            unit: unit.into(),
            reason,
            reference: Some(reference.into()),
            notes: None,
            user_id,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Filters for listing movements
#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub product_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub reason: Option<MovementReason>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl MovementFilter {
    fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }

    /// Date window of the listing; an inverted one is refused
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

    fn push_conditions(&self, range: &DateRange, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(product_id) = self.product_id {
            qb.push(" AND m.product_id = ").push_bind(product_id);
        }
        if let Some(batch_id) = self.batch_id {
            qb.push(" AND m.batch_id = ").push_bind(batch_id);
        }
        if let Some(movement_type) = self.movement_type {
            qb.push(" AND m.movement_type = ").push_bind(movement_type);
        }
        if let Some(reason) = self.reason {
            qb.push(" AND m.reason = ").push_bind(reason);
        }
        if let Some(start) = range.start_bound() {
            qb.push(" AND m.movement_date >= ").push_bind(start);
        }
        if let Some(end) = range.end_bound() {
            qb.push(" AND m.movement_date < ").push_bind(end);
        }
    }
}

#[derive(Debug, FromRow)]
struct StockPositionRow {
    catalog_name: String,
    grind_type: GrindType,
    stock_current: i32,
    stock_reserved: i32,
    stock_minimum: i32,
}

#[derive(Debug, FromRow)]
struct ProductCounters {
    stock_current: i32,
    stock_reserved: i32,
}

const MOVEMENT_SELECT: &str = r#"
    SELECT m.id, m.product_id, p.sku AS product_sku, m.batch_id, b.code AS batch_code,
           m.movement_type, m.quantity, m.unit, m.reason, m.reference, m.notes,
           m.user_id, u.name AS user_name, m.movement_date
    FROM inventory_movements m
    LEFT JOIN products p ON p.id = m.product_id
    LEFT JOIN batches b ON b.id = m.batch_id
    JOIN users u ON u.id = m.user_id
"#;

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append a row to the ledger inside the caller's transaction
    pub async fn record_movement(conn: &mut PgConnection, movement: &NewMovement) -> AppResult<Uuid> {
        if movement.product_id.is_none() && movement.batch_id.is_none() {
            return Err(AppError::Internal(
                "Inventory movement without product or batch".to_string(),
            ));
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_movements (
                product_id, batch_id, movement_type, quantity, unit, reason, reference, notes, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(movement.product_id)
        .bind(movement.batch_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(&movement.unit)
        .bind(movement.reason)
        .bind(&movement.reference)
        .bind(&movement.notes)
        .bind(movement.user_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(
            movement_id = %id,
            movement_type = movement.movement_type.as_str(),
            reason = movement.reason.as_str(),
            quantity = %movement.quantity,
            "Inventory movement recorded"
        );

        Ok(id)
    }

    /// List movements, newest first
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
    ) -> AppResult<PaginatedResponse<InventoryMovement>> {
        let range = filter.range()?;
        let pagination = filter.pagination();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM inventory_movements m");
        filter.push_conditions(&range, &mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(MOVEMENT_SELECT);
        filter.push_conditions(&range, &mut query);
        query
            .push(" ORDER BY m.movement_date DESC, m.created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let movements = query
            .build_query_as::<InventoryMovement>()
            .fetch_all(&self.db)
            .await?;

        Ok(PaginatedResponse::new(movements, &pagination, total))
    }

    /// Stock of active products grouped by catalog entry and grind
    pub async fn summary(&self) -> AppResult<StockSummary> {
        let rows = sqlx::query_as::<_, StockPositionRow>(
            r#"
            SELECT c.name AS catalog_name, p.grind_type, p.stock_current, p.stock_reserved, p.stock_minimum
            FROM products p
            JOIN product_catalog c ON c.id = p.product_catalog_id
            WHERE p.active = TRUE AND p.deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let positions: Vec<StockPosition> = rows
            .into_iter()
            .map(|r| StockPosition {
                catalog_name: r.catalog_name,
                grind_type: r.grind_type,
                stock_current: r.stock_current,
                stock_reserved: r.stock_reserved,
                stock_minimum: r.stock_minimum,
            })
            .collect();

        Ok(summarize_stock(&positions))
    }

    /// Compare a product's stock counters with its ledger and open orders
    pub async fn reconcile_product(&self, product_id: Uuid) -> AppResult<StockReconciliation> {
        let counters = sqlx::query_as::<_, ProductCounters>(
            "SELECT stock_current, stock_reserved FROM products WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let ledger_balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(
                CASE movement_type
                    WHEN 'INBOUND' THEN ABS(quantity)
                    WHEN 'OUTBOUND' THEN -ABS(quantity)
                    ELSE quantity
                END
            ), 0)
            FROM inventory_movements
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let open_reservations = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(oi.quantity), 0)::BIGINT
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.product_id = $1
              AND o.status NOT IN ('DELIVERED', 'CANCELLED')
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let reconciliation = StockReconciliation::new(
            ledger_balance,
            open_reservations,
            counters.stock_current,
            counters.stock_reserved,
        );
        if !reconciliation.consistent {
            tracing::warn!(
                product_id = %product_id,
                ledger_balance = %reconciliation.ledger_balance,
                stock_current = reconciliation.stock_current,
                open_reservations = reconciliation.open_reservations,
                stock_reserved = reconciliation.stock_reserved,
                "Product stock does not reconcile with its ledger"
            );
        }

        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_movement_filter_rejects_inverted_range() {
        let filter = MovementFilter {
            start_date: date(2024, 3, 10),
            end_date: date(2024, 3, 1),
            ..Default::default()
        };
        match filter.range() {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "start_date"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_movement_filter_accepts_open_and_single_day_ranges() {
        let single_day = MovementFilter {
            start_date: date(2024, 3, 1),
            end_date: date(2024, 3, 1),
            ..Default::default()
        };
        assert!(single_day.range().is_ok());

        let open_ended = MovementFilter {
            start_date: date(2024, 3, 1),
            ..Default::default()
        };
        assert_eq!(open_ended.range().unwrap().end_date, None);
        assert!(MovementFilter::default().range().is_ok());
    }
}

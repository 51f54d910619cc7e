//! Packaged product (SKU) service
//!
//! Products are packed from a roast. Their unit cost carries the roast's
//! share of the batch cost plus every expense booked on the roast.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::batch::batch_additional_expenses;
use crate::services::expense::{ExpenseService, RoastExpenseInput};
use crate::services::inventory::{InventoryService, NewMovement};
use crate::services::micro_batch::lock_micro_batch;
use crate::services::{contains_pattern, rule_error, user_display_name};
use shared::{
    calculate_unit_cost, generate_sku, validate_amount, GrindType, MovementReason, MovementType,
    PaginatedResponse, Pagination, StockLevels, UnitCostBreakdown, UnitCostInputs,
};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product with its catalog entry and roast
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub product_catalog_id: Uuid,
    pub catalog_code: String,
    pub catalog_name: String,
    pub weight_grams: i32,
    pub package_type: String,
    pub micro_batch_id: Uuid,
    pub micro_batch_code: String,
    pub grind_type: GrindType,
    pub stock_current: i32,
    pub stock_reserved: i32,
    pub stock_minimum: i32,
    pub sale_price: Decimal,
    pub unit_cost: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn stock(&self) -> StockLevels {
        StockLevels::new(self.stock_current, self.stock_reserved, self.stock_minimum)
    }
}

/// Input for packing a product from a roast
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    pub micro_batch_id: Uuid,
    pub product_catalog_id: Uuid,
    pub grind_type: GrindType,
    /// Units packed now
    #[validate(range(min = 0))]
    pub stock_current: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock_minimum: i32,
    /// Defaults to the catalog base price
    pub sale_price: Option<Decimal>,
    pub active: Option<bool>,
    /// Roast expenses incurred while packing, booked before costing
    #[validate]
    #[serde(default)]
    pub expenses: Vec<RoastExpenseInput>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    pub sale_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock_minimum: Option<i32>,
    pub active: Option<bool>,
    /// Renames the catalog entry this product is packed in
    #[validate(length(min = 1, max = 150))]
    pub product_catalog_name: Option<String>,
}

/// Signed manual stock correction
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    #[validate(range(min = -1_000_000, max = 1_000_000))]
    pub delta: i32,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sku: Option<String>,
    pub grind_type: Option<GrindType>,
    pub active: Option<bool>,
    pub low_stock: Option<bool>,
    pub catalog_code: Option<String>,
    pub catalog_name: Option<String>,
    pub micro_batch_id: Option<Uuid>,
}

impl ProductFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE p.deleted_at IS NULL");
        for (column, term) in [
            ("p.sku", &self.sku),
            ("c.code", &self.catalog_code),
            ("c.name", &self.catalog_name),
        ] {
            if let Some(term) = term.as_deref().filter(|t| !t.trim().is_empty()) {
                qb.push(format!(" AND {} ILIKE ", column))
                    .push_bind(contains_pattern(term));
            }
        }
        if let Some(grind_type) = self.grind_type {
            qb.push(" AND p.grind_type = ").push_bind(grind_type);
        }
        if let Some(active) = self.active {
            qb.push(" AND p.active = ").push_bind(active);
        }
        match self.low_stock {
            Some(true) => {
                qb.push(" AND p.stock_current <= p.stock_minimum");
            }
            Some(false) => {
                qb.push(" AND p.stock_current > p.stock_minimum");
            }
            None => {}
        }
        if let Some(micro_batch_id) = self.micro_batch_id {
            qb.push(" AND p.micro_batch_id = ").push_bind(micro_batch_id);
        }
    }
}

/// Newly packed product and how its unit cost was reached
#[derive(Debug, Serialize)]
pub struct CreatedProduct {
    pub product: Product,
    pub cost: UnitCostBreakdown,
}

#[derive(Debug, FromRow)]
struct RoastCostRow {
    micro_batch_code: String,
    batch_id: Uuid,
    batch_green_kg: Decimal,
    batch_total_cost: Decimal,
    green_kg_used: Decimal,
    roasted_kg_obtained: Decimal,
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    code: String,
    weight_grams: i32,
    package_type: String,
    base_price: Decimal,
}

pub(crate) const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.sku, p.product_catalog_id, c.code AS catalog_code, c.name AS catalog_name,
           c.weight_grams, c.package_type, p.micro_batch_id, mb.code AS micro_batch_code,
           p.grind_type, p.stock_current, p.stock_reserved, p.stock_minimum, p.sale_price,
           p.unit_cost, p.active, p.created_at, p.updated_at
    FROM products p
    JOIN product_catalog c ON c.id = p.product_catalog_id
    JOIN micro_batches mb ON mb.id = p.micro_batch_id
"#;

async fn fetch_product(conn: &mut PgConnection, id: Uuid) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!("{} WHERE p.id = $1 AND p.deleted_at IS NULL", PRODUCT_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Lock a product's row and read it back with its catalog data
pub(crate) async fn lock_product(conn: &mut PgConnection, id: Uuid) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "{} WHERE p.id = $1 AND p.deleted_at IS NULL FOR UPDATE OF p",
        PRODUCT_SELECT
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Write new stock counters for a product
pub(crate) async fn store_stock(conn: &mut PgConnection, product_id: Uuid, stock: StockLevels) -> AppResult<()> {
    sqlx::query("UPDATE products SET stock_current = $2, stock_reserved = $3 WHERE id = $1")
        .bind(product_id)
        .bind(stock.current)
        .bind(stock.reserved)
        .execute(conn)
        .await?;
    Ok(())
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Pack a product from a roast and cost it
    pub async fn create(&self, user_id: Uuid, input: CreateProductInput) -> AppResult<CreatedProduct> {
        input.validate()?;
        if let Some(price) = input.sale_price {
            validate_amount(price).map_err(|m| rule_error("sale_price", m))?;
        }

        let mut tx = self.db.begin().await?;

        // Held until commit so the roast's weights cannot change under the costing.
        lock_micro_batch(&mut *tx, input.micro_batch_id).await?;
        let roast = sqlx::query_as::<_, RoastCostRow>(
            r#"
            SELECT mb.code AS micro_batch_code, b.id AS batch_id, b.green_kg AS batch_green_kg,
                   b.total_cost AS batch_total_cost, mb.green_kg_used, mb.roasted_kg_obtained
            FROM micro_batches mb
            JOIN batches b ON b.id = mb.batch_id
            WHERE mb.id = $1 AND mb.deleted_at IS NULL
            "#,
        )
        .bind(input.micro_batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Micro-batch".to_string()))?;

        let catalog = sqlx::query_as::<_, CatalogRow>(
            r#"
            SELECT code, weight_grams, package_type, base_price
            FROM product_catalog
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(input.product_catalog_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Catalog entry".to_string()))?;

        if !input.expenses.is_empty() {
            let responsible = user_display_name(&mut *tx, user_id).await?;
            for expense in input.expenses {
                let expense = expense.into_new_expense(input.micro_batch_id, &responsible)?;
                ExpenseService::insert(&mut *tx, &expense).await?;
            }
        }

        let batch_additional = batch_additional_expenses(&mut *tx, roast.batch_id).await?;
        let micro_batch_expenses = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE micro_batch_id = $1 AND deleted_at IS NULL",
        )
        .bind(input.micro_batch_id)
        .fetch_one(&mut *tx)
        .await?;

        let cost = calculate_unit_cost(&UnitCostInputs {
            batch_green_kg: roast.batch_green_kg,
            batch_total_cost: roast.batch_total_cost,
            batch_additional_expenses: batch_additional,
            green_kg_used: roast.green_kg_used,
            roasted_kg_obtained: roast.roasted_kg_obtained,
            micro_batch_expenses,
            weight_grams: catalog.weight_grams,
        })?;
        if Decimal::from(input.stock_current) > cost.units_produced.ceil() {
            tracing::warn!(
                micro_batch_id = %input.micro_batch_id,
                stock_current = input.stock_current,
                units_produced = %cost.units_produced,
                "Packed units exceed what the roast can fill"
            );
        }

        let sku = generate_sku(&roast.micro_batch_code, input.grind_type, &catalog.code);
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (
                product_catalog_id, micro_batch_id, sku, grind_type, stock_current,
                stock_minimum, sale_price, unit_cost, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(input.product_catalog_id)
        .bind(input.micro_batch_id)
        .bind(&sku)
        .bind(input.grind_type)
        .bind(input.stock_current)
        .bind(input.stock_minimum)
        .bind(input.sale_price.unwrap_or(catalog.base_price))
        .bind(cost.unit_cost)
        .bind(input.active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await?;

        if input.stock_current > 0 {
            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_product(
                    id,
                    MovementType::Inbound,
                    input.stock_current,
                    catalog.package_type.clone(),
                    MovementReason::MicrobatchProduction,
                    roast.micro_batch_code.clone(),
                    user_id,
                ),
            )
            .await?;
        }

        let product = fetch_product(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            product_id = %product.id,
            sku = %product.sku,
            unit_cost = %product.unit_cost,
            stock_current = product.stock_current,
            "Product created"
        );
        Ok(CreatedProduct { product, cost })
    }

    pub async fn list(&self, filter: ProductFilter) -> AppResult<PaginatedResponse<Product>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new(
            r#"
            SELECT COUNT(*)
            FROM products p
            JOIN product_catalog c ON c.id = p.product_catalog_id
            "#,
        );
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let products = query.build_query_as::<Product>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(products, &pagination, total))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Product> {
        let mut conn = self.db.acquire().await?;
        fetch_product(&mut *conn, id).await
    }

    /// Active products at or below their minimum stock
    pub async fn low_stock(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            {}
            WHERE p.deleted_at IS NULL AND p.active = TRUE AND p.stock_current <= p.stock_minimum
            ORDER BY p.stock_current ASC, p.sku ASC
            "#,
            PRODUCT_SELECT
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    pub async fn update(&self, id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;
        if let Some(price) = input.sale_price {
            validate_amount(price).map_err(|m| rule_error("sale_price", m))?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_product(&mut *tx, id).await?;

        sqlx::query(
            r#"
            UPDATE products SET
                sale_price = COALESCE($2, sale_price),
                stock_minimum = COALESCE($3, stock_minimum),
                active = COALESCE($4, active)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.sale_price)
        .bind(input.stock_minimum)
        .bind(input.active)
        .execute(&mut *tx)
        .await?;

        if let Some(name) = input.product_catalog_name.as_deref().map(str::trim) {
            sqlx::query("UPDATE product_catalog SET name = $2 WHERE id = $1")
                .bind(current.product_catalog_id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        let product = fetch_product(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Apply a manual correction to the available stock
    pub async fn adjust_stock(&self, user_id: Uuid, id: Uuid, input: AdjustStockInput) -> AppResult<Product> {
        input.validate()?;
        if input.delta == 0 {
            return Err(AppError::validation(
                "delta",
                "Adjustment must not be zero",
                "El ajuste no puede ser cero",
            ));
        }

        let mut tx = self.db.begin().await?;
        let product = lock_product(&mut *tx, id).await?;
        let stock = product.stock().adjust(input.delta)?;
        store_stock(&mut *tx, id, stock).await?;

        InventoryService::record_movement(
            &mut *tx,
            &NewMovement::for_product(
                id,
                MovementType::Adjustment,
                input.delta,
                product.package_type.clone(),
                MovementReason::Adjustment,
                product.sku.clone(),
                user_id,
            )
            .with_notes(input.notes),
        )
        .await?;

        let product = fetch_product(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, delta = input.delta, stock_current = product.stock_current, "Stock adjusted");
        Ok(product)
    }

    /// Soft-delete a product with nothing reserved
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let product = lock_product(&mut *tx, id).await?;
        if product.stock_reserved > 0 {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: "The product has units reserved by open orders".to_string(),
                message_es: "El producto tiene unidades reservadas por pedidos abiertos".to_string(),
            });
        }

        sqlx::query("UPDATE products SET deleted_at = NOW(), active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_delta_is_bounded() {
        let input = |delta| AdjustStockInput { delta, notes: None };
        assert!(input(-1_000_000).validate().is_ok());
        assert!(input(1_000_000).validate().is_ok());
        assert!(input(i32::MAX).validate().is_err());
        assert!(input(i32::MIN).validate().is_err());
    }
}

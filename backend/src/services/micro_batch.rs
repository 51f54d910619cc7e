//! Roasting run (micro-batch) service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::batch::{batch_additional_expenses, lock_batch, set_batch_availability};
use crate::services::expense::{Expense, ExpenseService, RoastExpenseInput, EXPENSE_COLUMNS};
use crate::services::inventory::{InventoryService, NewMovement};
use crate::services::{contains_pattern, rule_error, user_display_name};
use shared::{
    calculate_shrinkage, consume_green_coffee, settle_roast_weight, validate_code, validate_weight_kg,
    MovementReason, MovementType, PaginatedResponse, Pagination, RoastCostBreakdown, RoastType,
};

/// Micro-batch service
#[derive(Clone)]
pub struct MicroBatchService {
    db: PgPool,
}

/// One roast of green coffee taken from a batch
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MicroBatch {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub code: String,
    pub roast_number: i32,
    pub roast_date: NaiveDate,
    pub green_kg_used: Decimal,
    pub roasted_kg_obtained: Decimal,
    pub loss_kg: Decimal,
    pub loss_percentage: Decimal,
    pub roast_type: RoastType,
    pub roast_responsible: String,
    pub bags_obtained_250g: i32,
    pub samples_obtained_100g: i32,
    pub leftover_grams: i32,
    pub extra_bag: bool,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a roast
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMicroBatchInput {
    pub batch_id: Uuid,
    pub code: String,
    #[validate(range(min = 1))]
    pub roast_number: i32,
    pub roast_date: Option<NaiveDate>,
    pub green_kg_used: Decimal,
    pub roasted_kg_obtained: Decimal,
    pub roast_type: RoastType,
    /// Defaults to the acting user's name
    #[validate(length(min = 1, max = 150))]
    pub roast_responsible: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub bags_obtained_250g: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub samples_obtained_100g: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub leftover_grams: i32,
    #[serde(default)]
    pub extra_bag: bool,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
    #[validate]
    pub production_cost: Option<RoastExpenseInput>,
}

/// Input for correcting a roast
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMicroBatchInput {
    pub code: Option<String>,
    #[validate(range(min = 1))]
    pub roast_number: Option<i32>,
    pub roast_date: Option<NaiveDate>,
    pub green_kg_used: Option<Decimal>,
    pub roasted_kg_obtained: Option<Decimal>,
    pub roast_type: Option<RoastType>,
    #[validate(length(min = 1, max = 150))]
    pub roast_responsible: Option<String>,
    #[validate(range(min = 0))]
    pub bags_obtained_250g: Option<i32>,
    #[validate(range(min = 0))]
    pub samples_obtained_100g: Option<i32>,
    #[validate(range(min = 0))]
    pub leftover_grams: Option<i32>,
    pub extra_bag: Option<bool>,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Filters for listing roasts
#[derive(Debug, Default, Deserialize)]
pub struct MicroBatchFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub batch_id: Option<Uuid>,
    pub roast_type: Option<RoastType>,
    pub code: Option<String>,
}

impl MicroBatchFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE mb.deleted_at IS NULL");
        if let Some(batch_id) = self.batch_id {
            qb.push(" AND mb.batch_id = ").push_bind(batch_id);
        }
        if let Some(roast_type) = self.roast_type {
            qb.push(" AND mb.roast_type = ").push_bind(roast_type);
        }
        if let Some(code) = self.code.as_deref().filter(|c| !c.trim().is_empty()) {
            qb.push(" AND mb.code ILIKE ").push_bind(contains_pattern(code));
        }
    }
}

/// Cost picture of a roast together with the roast itself
#[derive(Debug, Serialize)]
pub struct MicroBatchCost {
    pub micro_batch: MicroBatch,
    pub expenses: Vec<Expense>,
    #[serde(flatten)]
    pub breakdown: RoastCostBreakdown,
}

const MICRO_BATCH_SELECT: &str = r#"
    SELECT mb.id, mb.batch_id, b.code AS batch_code, mb.code, mb.roast_number, mb.roast_date,
           mb.green_kg_used, mb.roasted_kg_obtained, mb.loss_kg, mb.loss_percentage, mb.roast_type,
           mb.roast_responsible, mb.bags_obtained_250g, mb.samples_obtained_100g, mb.leftover_grams,
           mb.extra_bag, mb.observations, mb.created_at, mb.updated_at
    FROM micro_batches mb
    JOIN batches b ON b.id = mb.batch_id
"#;

async fn fetch_micro_batch(conn: &mut PgConnection, id: Uuid) -> AppResult<MicroBatch> {
    sqlx::query_as::<_, MicroBatch>(&format!(
        "{} WHERE mb.id = $1 AND mb.deleted_at IS NULL",
        MICRO_BATCH_SELECT
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Micro-batch".to_string()))
}

fn lock_micro_batch_query() -> String {
    format!(
        "{} WHERE mb.id = $1 AND mb.deleted_at IS NULL FOR UPDATE OF mb",
        MICRO_BATCH_SELECT
    )
}

/// Lock a roast's row and read it back.
///
/// Take this before the parent batch's lock: every writer of a roast's weights,
/// its products or its expenses goes through it.
pub(crate) async fn lock_micro_batch(conn: &mut PgConnection, id: Uuid) -> AppResult<MicroBatch> {
    sqlx::query_as::<_, MicroBatch>(&lock_micro_batch_query())
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Micro-batch".to_string()))
}

async fn has_products(conn: &mut PgConnection, micro_batch_id: Uuid) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM products WHERE micro_batch_id = $1 AND deleted_at IS NULL)",
    )
    .bind(micro_batch_id)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

impl MicroBatchService {
    /// Create a new MicroBatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a roast, drawing its green coffee from the batch
    pub async fn create(&self, user_id: Uuid, input: CreateMicroBatchInput) -> AppResult<MicroBatch> {
        input.validate()?;
        validate_code(&input.code).map_err(|m| rule_error("code", m))?;
        validate_weight_kg(input.green_kg_used).map_err(|m| rule_error("green_kg_used", m))?;
        let shrinkage = calculate_shrinkage(input.green_kg_used, input.roasted_kg_obtained)?;

        let mut tx = self.db.begin().await?;

        let batch = lock_batch(&mut *tx, input.batch_id).await?;
        let remaining = consume_green_coffee(batch.green_kg_available, input.green_kg_used)?;
        set_batch_availability(&mut *tx, &batch, remaining).await?;

        let responsible = user_display_name(&mut *tx, user_id).await?;
        let roast_responsible = input
            .roast_responsible
            .as_deref()
            .map(str::trim)
            .unwrap_or(responsible.as_str())
            .to_string();

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO micro_batches (
                batch_id, code, roast_number, roast_date, green_kg_used, roasted_kg_obtained,
                loss_kg, loss_percentage, roast_type, roast_responsible, bags_obtained_250g,
                samples_obtained_100g, leftover_grams, extra_bag, observations
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(batch.id)
        .bind(&input.code)
        .bind(input.roast_number)
        .bind(input.roast_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(input.green_kg_used)
        .bind(input.roasted_kg_obtained)
        .bind(shrinkage.loss_kg)
        .bind(shrinkage.loss_percentage)
        .bind(input.roast_type)
        .bind(&roast_responsible)
        .bind(input.bags_obtained_250g)
        .bind(input.samples_obtained_100g)
        .bind(input.leftover_grams)
        .bind(input.extra_bag)
        .bind(&input.observations)
        .fetch_one(&mut *tx)
        .await?;

        InventoryService::record_movement(
            &mut *tx,
            &NewMovement::for_batch(
                batch.id,
                MovementType::Outbound,
                input.green_kg_used,
                MovementReason::MicrobatchProduction,
                input.code.clone(),
                user_id,
            ),
        )
        .await?;

        if let Some(cost) = input.production_cost {
            let expense = cost.into_new_expense(id, &responsible)?;
            ExpenseService::insert(&mut *tx, &expense).await?;
        }

        let micro_batch = fetch_micro_batch(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            micro_batch_id = %micro_batch.id,
            batch_id = %batch.id,
            green_kg_used = %micro_batch.green_kg_used,
            loss_percentage = %micro_batch.loss_percentage,
            "Micro-batch created"
        );
        Ok(micro_batch)
    }

    /// List roasts, most recent first
    pub async fn list(&self, filter: MicroBatchFilter) -> AppResult<PaginatedResponse<MicroBatch>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM micro_batches mb");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(MICRO_BATCH_SELECT);
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY mb.roast_date DESC, mb.roast_number DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let rows = query.build_query_as::<MicroBatch>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(rows, &pagination, total))
    }

    /// Get a roast by ID
    pub async fn get(&self, id: Uuid) -> AppResult<MicroBatch> {
        let mut conn = self.db.acquire().await?;
        fetch_micro_batch(&mut *conn, id).await
    }

    /// Correct a roast.
    ///
    /// Weights are frozen once products have been packed from the roast. A new
    /// green weight is settled against the parent batch under lock.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateMicroBatchInput,
    ) -> AppResult<MicroBatch> {
        input.validate()?;
        if let Some(code) = &input.code {
            validate_code(code).map_err(|m| rule_error("code", m))?;
        }
        if let Some(green) = input.green_kg_used {
            validate_weight_kg(green).map_err(|m| rule_error("green_kg_used", m))?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_micro_batch(&mut *tx, id).await?;

        let green_kg_used = input.green_kg_used.unwrap_or(current.green_kg_used);
        let roasted_kg_obtained = input.roasted_kg_obtained.unwrap_or(current.roasted_kg_obtained);
        let weights_changed = green_kg_used != current.green_kg_used
            || roasted_kg_obtained != current.roasted_kg_obtained;

        if weights_changed && has_products(&mut *tx, id).await? {
            return Err(AppError::Conflict {
                resource: "micro_batch".to_string(),
                message: "Weights cannot change once products exist for this roast".to_string(),
                message_es: "Los pesos no pueden cambiar cuando ya existen productos de este microlote"
                    .to_string(),
            });
        }
        let shrinkage = calculate_shrinkage(green_kg_used, roasted_kg_obtained)?;

        if green_kg_used != current.green_kg_used {
            let batch = lock_batch(&mut *tx, current.batch_id).await?;
            let available = settle_roast_weight(
                batch.green_kg,
                batch.green_kg_available,
                current.green_kg_used,
                green_kg_used,
            )?;
            set_batch_availability(&mut *tx, &batch, available).await?;

            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_batch(
                    batch.id,
                    MovementType::Adjustment,
                    available - batch.green_kg_available,
                    MovementReason::Adjustment,
                    input.code.clone().unwrap_or_else(|| current.code.clone()),
                    user_id,
                )
                .with_notes(Some("Roast green weight corrected".to_string())),
            )
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE micro_batches SET
                code = COALESCE($2, code),
                roast_number = COALESCE($3, roast_number),
                roast_date = COALESCE($4, roast_date),
                green_kg_used = $5,
                roasted_kg_obtained = $6,
                loss_kg = $7,
                loss_percentage = $8,
                roast_type = COALESCE($9, roast_type),
                roast_responsible = COALESCE($10, roast_responsible),
                bags_obtained_250g = COALESCE($11, bags_obtained_250g),
                samples_obtained_100g = COALESCE($12, samples_obtained_100g),
                leftover_grams = COALESCE($13, leftover_grams),
                extra_bag = COALESCE($14, extra_bag),
                observations = COALESCE($15, observations)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(input.roast_number)
        .bind(input.roast_date)
        .bind(green_kg_used)
        .bind(roasted_kg_obtained)
        .bind(shrinkage.loss_kg)
        .bind(shrinkage.loss_percentage)
        .bind(input.roast_type)
        .bind(input.roast_responsible.as_deref().map(str::trim))
        .bind(input.bags_obtained_250g)
        .bind(input.samples_obtained_100g)
        .bind(input.leftover_grams)
        .bind(input.extra_bag)
        .bind(&input.observations)
        .execute(&mut *tx)
        .await?;

        let micro_batch = fetch_micro_batch(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(micro_batch_id = %id, "Micro-batch updated");
        Ok(micro_batch)
    }

    /// Soft-delete a roast with no products, returning its green coffee to the batch
    pub async fn remove(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let current = lock_micro_batch(&mut *tx, id).await?;

        if has_products(&mut *tx, id).await? {
            return Err(AppError::Conflict {
                resource: "micro_batch".to_string(),
                message: "The micro-batch has products and cannot be deleted".to_string(),
                message_es: "El microlote tiene productos y no puede eliminarse".to_string(),
            });
        }

        let batch = lock_batch(&mut *tx, current.batch_id).await?;
        let restored = settle_roast_weight(
            batch.green_kg,
            batch.green_kg_available,
            current.green_kg_used,
            Decimal::ZERO,
        )?;
        let returned = restored - batch.green_kg_available;
        set_batch_availability(&mut *tx, &batch, restored).await?;

        if returned > Decimal::ZERO {
            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_batch(
                    batch.id,
                    MovementType::Inbound,
                    returned,
                    MovementReason::Adjustment,
                    current.code.clone(),
                    user_id,
                )
                .with_notes(Some("Roast deleted, green coffee restored".to_string())),
            )
            .await?;
        }

        sqlx::query("UPDATE micro_batches SET deleted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(micro_batch_id = %id, batch_id = %batch.id, "Micro-batch deleted");
        Ok(())
    }

    /// Book an expense against a roast
    pub async fn add_expense(&self, user_id: Uuid, id: Uuid, input: RoastExpenseInput) -> AppResult<Expense> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_micro_batch(&mut *tx, id).await?;
        let responsible = user_display_name(&mut *tx, user_id).await?;
        let expense = ExpenseService::insert(&mut *tx, &input.into_new_expense(id, &responsible)?).await?;
        tx.commit().await?;

        tracing::info!(micro_batch_id = %id, expense_id = %expense.id, amount = %expense.amount, "Roast expense added");
        Ok(expense)
    }

    /// Prorated batch cost plus the roast's own expenses
    pub async fn cost_breakdown(&self, id: Uuid) -> AppResult<MicroBatchCost> {
        let mut conn = self.db.acquire().await?;
        let micro_batch = fetch_micro_batch(&mut *conn, id).await?;

        let (batch_green_kg, batch_total_cost) = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT green_kg, total_cost FROM batches WHERE id = $1",
        )
        .bind(micro_batch.batch_id)
        .fetch_one(&mut *conn)
        .await?;
        let additional = batch_additional_expenses(&mut *conn, micro_batch.batch_id).await?;

        let expenses = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses WHERE micro_batch_id = $1 AND deleted_at IS NULL ORDER BY date ASC",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        let direct: Decimal = expenses.iter().map(|e| e.amount).sum();

        let breakdown = RoastCostBreakdown::calculate(
            micro_batch.green_kg_used,
            micro_batch.roasted_kg_obtained,
            batch_green_kg,
            batch_total_cost + additional,
            direct,
        )?;

        Ok(MicroBatchCost {
            micro_batch,
            expenses,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_query_locks_only_the_roast_row() {
        let sql = lock_micro_batch_query();
        assert!(sql.contains("WHERE mb.id = $1 AND mb.deleted_at IS NULL"));
        assert!(sql.trim_end().ends_with("FOR UPDATE OF mb"));
    }
}

//! Green coffee batch service
//!
//! A batch purchase books its cost as an expense and its weight as an inbound
//! ledger movement in the same transaction, so the purchase, its cost and the
//! green stock always appear together.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::expense::{Expense, ExpenseService, NewExpense, EXPENSE_COLUMNS};
use crate::services::inventory::{InventoryService, NewMovement};
use crate::services::{contains_pattern, rule_error, user_display_name};
use shared::{
    batch_purchase_concept, cost_per_kg, rebase_green_weight, round2, validate_amount,
    validate_code, validate_weight_kg, BatchStatus, ExpenseCategory, MovementReason,
    MovementType, PaginatedResponse, Pagination, PaymentMethod,
};

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Green coffee batch record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub code: String,
    pub purchase_date: NaiveDate,
    pub green_kg: Decimal,
    pub green_kg_available: Decimal,
    pub producer: String,
    pub origin: String,
    pub variety: String,
    pub process: String,
    pub altitude_masl: Option<i32>,
    pub total_cost: Decimal,
    pub cost_per_kg: Decimal,
    pub status: BatchStatus,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a batch purchase
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub code: String,
    pub purchase_date: NaiveDate,
    pub green_kg: Decimal,
    #[validate(length(min = 1, max = 150))]
    pub producer: String,
    #[validate(length(min = 1, max = 150))]
    pub origin: String,
    #[validate(length(min = 1, max = 100))]
    pub variety: String,
    #[validate(length(min = 1, max = 100))]
    pub process: String,
    #[validate(range(min = 0, max = 6000))]
    pub altitude_masl: Option<i32>,
    pub total_cost: Decimal,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Input for correcting a batch
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBatchInput {
    pub code: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub green_kg: Option<Decimal>,
    #[validate(length(min = 1, max = 150))]
    pub producer: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub origin: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub variety: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub process: Option<String>,
    #[validate(range(min = 0, max = 6000))]
    pub altitude_masl: Option<i32>,
    pub total_cost: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Filters for listing batches
#[derive(Debug, Default, Deserialize)]
pub struct BatchFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub code: Option<String>,
    pub producer: Option<String>,
    pub origin: Option<String>,
    pub status: Option<BatchStatus>,
}

impl BatchFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        for (column, term) in [
            ("code", &self.code),
            ("producer", &self.producer),
            ("origin", &self.origin),
        ] {
            if let Some(term) = term.as_deref().filter(|t| !t.trim().is_empty()) {
                qb.push(format!(" AND {} ILIKE ", column))
                    .push_bind(contains_pattern(term));
            }
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
    }
}

/// Batch with its expenses and full cost
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch: Batch,
    pub expenses: Vec<Expense>,
    /// Expenses other than the purchase itself
    pub total_expenses: Decimal,
    /// Purchase price plus additional expenses
    pub total_cost: Decimal,
    pub cost_per_kg: Decimal,
}

pub(crate) const BATCH_COLUMNS: &str = r#"
    id, code, purchase_date, green_kg, green_kg_available, producer, origin, variety, process,
    altitude_masl, total_cost, cost_per_kg, status, observations, created_at, updated_at
"#;

/// Lock a batch row for the rest of the caller's transaction
pub(crate) async fn lock_batch(conn: &mut PgConnection, id: Uuid) -> AppResult<Batch> {
    sqlx::query_as::<_, Batch>(&format!(
        "SELECT {} FROM batches WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        BATCH_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Batch".to_string()))
}

/// Persist a new available weight and the status it implies
pub(crate) async fn set_batch_availability(
    conn: &mut PgConnection,
    batch: &Batch,
    green_kg_available: Decimal,
) -> AppResult<()> {
    let status = BatchStatus::from_availability(batch.green_kg, green_kg_available);
    sqlx::query("UPDATE batches SET green_kg_available = $2, status = $3 WHERE id = $1")
        .bind(batch.id)
        .bind(green_kg_available)
        .bind(status)
        .execute(conn)
        .await?;

    tracing::debug!(
        batch_id = %batch.id,
        green_kg_available = %green_kg_available,
        status = status.as_str(),
        "Batch availability updated"
    );
    Ok(())
}

/// Sum of a batch's expenses excluding the purchase itself
pub(crate) async fn batch_additional_expenses(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Decimal> {
    let total = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM expenses
        WHERE batch_id = $1 AND category <> 'PURCHASE' AND deleted_at IS NULL
        "#,
    )
    .bind(batch_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a batch purchase
    pub async fn create(&self, user_id: Uuid, input: CreateBatchInput) -> AppResult<Batch> {
        input.validate()?;
        validate_code(&input.code).map_err(|m| rule_error("code", m))?;
        validate_weight_kg(input.green_kg).map_err(|m| rule_error("green_kg", m))?;
        validate_amount(input.total_cost).map_err(|m| rule_error("total_cost", m))?;
        let cost_per_kg = cost_per_kg(input.total_cost, input.green_kg)?;

        let mut tx = self.db.begin().await?;

        let batch = sqlx::query_as::<_, Batch>(&format!(
            r#"
            INSERT INTO batches (
                code, purchase_date, green_kg, green_kg_available, producer, origin, variety,
                process, altitude_masl, total_cost, cost_per_kg, status, observations
            )
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(&input.code)
        .bind(input.purchase_date)
        .bind(input.green_kg)
        .bind(input.producer.trim())
        .bind(input.origin.trim())
        .bind(input.variety.trim())
        .bind(input.process.trim())
        .bind(input.altitude_masl)
        .bind(input.total_cost)
        .bind(cost_per_kg)
        .bind(BatchStatus::Raw)
        .bind(&input.observations)
        .fetch_one(&mut *tx)
        .await?;

        let responsible = user_display_name(&mut *tx, user_id).await?;
        ExpenseService::insert(
            &mut *tx,
            &NewExpense {
                batch_id: Some(batch.id),
                micro_batch_id: None,
                date: batch.purchase_date,
                category: ExpenseCategory::Purchase,
                concept: batch_purchase_concept(&batch.code),
                description: None,
                amount: batch.total_cost,
                provider: batch.producer.clone(),
                receipt_url: "N/A".to_string(),
                payment_method: PaymentMethod::Other,
                responsible,
                observations: None,
            },
        )
        .await?;

        InventoryService::record_movement(
            &mut *tx,
            &NewMovement::for_batch(
                batch.id,
                MovementType::Inbound,
                batch.green_kg,
                MovementReason::BatchPurchase,
                batch.code.clone(),
                user_id,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(batch_id = %batch.id, code = %batch.code, green_kg = %batch.green_kg, "Batch created");
        Ok(batch)
    }

    /// List batches, most recent purchase first
    pub async fn list(&self, filter: BatchFilter) -> AppResult<PaginatedResponse<Batch>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM batches");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM batches", BATCH_COLUMNS));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY purchase_date DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let batches = query.build_query_as::<Batch>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(batches, &pagination, total))
    }

    /// Get a batch by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Batch> {
        sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM batches WHERE id = $1 AND deleted_at IS NULL",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Correct a batch.
    ///
    /// A new purchased weight moves the available weight by the same delta and
    /// is logged as an adjustment; a new total cost is mirrored on the purchase
    /// expense. The cost per kg and status are derived again.
    pub async fn update(&self, user_id: Uuid, id: Uuid, input: UpdateBatchInput) -> AppResult<Batch> {
        input.validate()?;
        if let Some(code) = &input.code {
            validate_code(code).map_err(|m| rule_error("code", m))?;
        }
        if let Some(green_kg) = input.green_kg {
            validate_weight_kg(green_kg).map_err(|m| rule_error("green_kg", m))?;
        }
        if let Some(total_cost) = input.total_cost {
            validate_amount(total_cost).map_err(|m| rule_error("total_cost", m))?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_batch(&mut *tx, id).await?;

        let green_kg = input.green_kg.unwrap_or(current.green_kg);
        let total_cost = input.total_cost.unwrap_or(current.total_cost);
        let available = rebase_green_weight(current.green_kg, current.green_kg_available, green_kg)?;
        let status = BatchStatus::from_availability(green_kg, available);
        let cost_per_kg = cost_per_kg(total_cost, green_kg)?;

        let batch = sqlx::query_as::<_, Batch>(&format!(
            r#"
            UPDATE batches SET
                code = COALESCE($2, code),
                purchase_date = COALESCE($3, purchase_date),
                green_kg = $4,
                green_kg_available = $5,
                producer = COALESCE($6, producer),
                origin = COALESCE($7, origin),
                variety = COALESCE($8, variety),
                process = COALESCE($9, process),
                altitude_masl = COALESCE($10, altitude_masl),
                total_cost = $11,
                cost_per_kg = $12,
                status = $13,
                observations = COALESCE($14, observations)
            WHERE id = $1
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(id)
        .bind(&input.code)
        .bind(input.purchase_date)
        .bind(green_kg)
        .bind(available)
        .bind(input.producer.as_deref().map(str::trim))
        .bind(input.origin.as_deref().map(str::trim))
        .bind(input.variety.as_deref().map(str::trim))
        .bind(input.process.as_deref().map(str::trim))
        .bind(input.altitude_masl)
        .bind(total_cost)
        .bind(cost_per_kg)
        .bind(status)
        .bind(&input.observations)
        .fetch_one(&mut *tx)
        .await?;

        let delta = green_kg - current.green_kg;
        if !delta.is_zero() {
            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_batch(
                    batch.id,
                    MovementType::Adjustment,
                    delta,
                    MovementReason::Adjustment,
                    batch.code.clone(),
                    user_id,
                )
                .with_notes(Some("Purchased weight corrected".to_string())),
            )
            .await?;
        }

        if total_cost != current.total_cost {
            sqlx::query(
                r#"
                UPDATE expenses SET amount = $2
                WHERE batch_id = $1 AND category = 'PURCHASE' AND deleted_at IS NULL
                "#,
            )
            .bind(batch.id)
            .bind(total_cost)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(batch_id = %batch.id, "Batch updated");
        Ok(batch)
    }

    /// Soft-delete a batch that has not been roasted
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        lock_batch(&mut *tx, id).await?;

        let roasted = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM micro_batches WHERE batch_id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if roasted {
            return Err(AppError::Conflict {
                resource: "batch".to_string(),
                message: "The batch has micro-batches and cannot be deleted".to_string(),
                message_es: "El lote tiene microlotes y no puede eliminarse".to_string(),
            });
        }

        sqlx::query("UPDATE batches SET deleted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(batch_id = %id, "Batch deleted");
        Ok(())
    }

    /// Batch with its expenses and total cost
    pub async fn summary(&self, id: Uuid) -> AppResult<BatchSummary> {
        let batch = self.get(id).await?;

        let expenses = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses WHERE batch_id = $1 AND deleted_at IS NULL ORDER BY date ASC",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let total_expenses: Decimal = expenses
            .iter()
            .filter(|e| e.category.adds_to_batch_cost())
            .map(|e| e.amount)
            .sum();
        let total_cost = batch.total_cost + total_expenses;
        let cost_per_kg = if batch.green_kg > Decimal::ZERO {
            round2(total_cost / batch.green_kg)
        } else {
            Decimal::ZERO
        };

        Ok(BatchSummary {
            batch,
            expenses,
            total_expenses,
            total_cost,
            cost_per_kg,
        })
    }
}

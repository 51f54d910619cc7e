//! Expense service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{rule_error, user_display_name};
use shared::{validate_amount, DateRange, ExpenseCategory, PaginatedResponse, Pagination, PaymentMethod};

/// Expense service
#[derive(Clone)]
pub struct ExpenseService {
    db: PgPool,
}

/// Expense record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub batch_id: Option<Uuid>,
    pub micro_batch_id: Option<Uuid>,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub concept: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub provider: String,
    pub receipt_url: String,
    pub payment_method: PaymentMethod,
    pub responsible: String,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fully resolved expense about to be inserted
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub batch_id: Option<Uuid>,
    pub micro_batch_id: Option<Uuid>,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub concept: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub provider: String,
    pub receipt_url: String,
    pub payment_method: PaymentMethod,
    pub responsible: String,
    pub observations: Option<String>,
}

/// Input for recording an expense
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseInput {
    pub batch_id: Option<Uuid>,
    pub micro_batch_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub category: ExpenseCategory,
    #[validate(length(min = 1, max = 200))]
    pub concept: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 150))]
    pub provider: String,
    #[validate(length(max = 500))]
    pub receipt_url: Option<String>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Expense attached to a roast, either on its own or while creating products.
///
/// Anything not given falls back to a production expense paid by other means.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoastExpenseInput {
    pub amount: Decimal,
    pub category: Option<ExpenseCategory>,
    #[validate(length(min = 1, max = 200))]
    pub concept: String,
    #[validate(length(max = 150))]
    pub provider: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 500))]
    pub receipt_url: Option<String>,
}

impl RoastExpenseInput {
    pub fn into_new_expense(self, micro_batch_id: Uuid, responsible: &str) -> AppResult<NewExpense> {
        validate_amount(self.amount).map_err(|m| rule_error("amount", m))?;
        Ok(NewExpense {
            batch_id: None,
            micro_batch_id: Some(micro_batch_id),
            date: self.date.unwrap_or_else(|| Utc::now().date_naive()),
            category: self.category.unwrap_or(ExpenseCategory::Production),
            concept: self.concept,
            description: self.description,
            amount: self.amount,
            provider: self.provider.unwrap_or_else(|| "N/A".to_string()),
            receipt_url: self.receipt_url.unwrap_or_else(|| "N/A".to_string()),
            payment_method: self.payment_method.unwrap_or(PaymentMethod::Other),
            responsible: responsible.to_string(),
            observations: None,
        })
    }
}

/// Input for updating an expense
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExpenseInput {
    pub date: Option<NaiveDate>,
    pub category: Option<ExpenseCategory>,
    #[validate(length(min = 1, max = 200))]
    pub concept: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    #[validate(length(min = 1, max = 150))]
    pub provider: Option<String>,
    #[validate(length(max = 500))]
    pub receipt_url: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

/// Filters for listing expenses
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<ExpenseCategory>,
    pub payment_method: Option<PaymentMethod>,
    pub batch_id: Option<Uuid>,
    pub micro_batch_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl ExpenseFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        if let Some(category) = self.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(method) = self.payment_method {
            qb.push(" AND payment_method = ").push_bind(method);
        }
        if let Some(batch_id) = self.batch_id {
            qb.push(" AND batch_id = ").push_bind(batch_id);
        }
        if let Some(micro_batch_id) = self.micro_batch_id {
            qb.push(" AND micro_batch_id = ").push_bind(micro_batch_id);
        }
        if let Some(start) = self.start_date {
            qb.push(" AND date >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            qb.push(" AND date <= ").push_bind(end);
        }
        if let Some(min) = self.min_amount {
            qb.push(" AND amount >= ").push_bind(min);
        }
        if let Some(max) = self.max_amount {
            qb.push(" AND amount <= ").push_bind(max);
        }
    }
}

pub(crate) const EXPENSE_COLUMNS: &str = r#"
    id, batch_id, micro_batch_id, date, category, concept, description, amount, provider,
    receipt_url, payment_method, responsible, observations, created_at, updated_at
"#;

impl ExpenseService {
    /// Create a new ExpenseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Insert an expense inside the caller's transaction
    pub async fn insert(conn: &mut PgConnection, expense: &NewExpense) -> AppResult<Expense> {
        let row = sqlx::query_as::<_, Expense>(&format!(
            r#"
            INSERT INTO expenses (
                batch_id, micro_batch_id, date, category, concept, description, amount,
                provider, receipt_url, payment_method, responsible, observations
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(expense.batch_id)
        .bind(expense.micro_batch_id)
        .bind(expense.date)
        .bind(expense.category)
        .bind(&expense.concept)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.provider)
        .bind(&expense.receipt_url)
        .bind(expense.payment_method)
        .bind(&expense.responsible)
        .bind(&expense.observations)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(
            expense_id = %row.id,
            category = row.category.as_str(),
            amount = %row.amount,
            "Expense recorded"
        );

        Ok(row)
    }

    /// Record an expense; the current user is the responsible
    pub async fn create(&self, user_id: Uuid, input: CreateExpenseInput) -> AppResult<Expense> {
        input.validate()?;
        validate_amount(input.amount).map_err(|m| rule_error("amount", m))?;

        let mut tx = self.db.begin().await?;

        if let Some(batch_id) = input.batch_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1 AND deleted_at IS NULL)",
            )
            .bind(batch_id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Batch".to_string()));
            }
        }
        if let Some(micro_batch_id) = input.micro_batch_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM micro_batches WHERE id = $1 AND deleted_at IS NULL)",
            )
            .bind(micro_batch_id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Micro-batch".to_string()));
            }
        }

        let responsible = user_display_name(&mut *tx, user_id).await?;
        let expense = Self::insert(
            &mut *tx,
            &NewExpense {
                batch_id: input.batch_id,
                micro_batch_id: input.micro_batch_id,
                date: input.date.unwrap_or_else(|| Utc::now().date_naive()),
                category: input.category,
                concept: input.concept,
                description: input.description,
                amount: input.amount,
                provider: input.provider,
                receipt_url: input.receipt_url.unwrap_or_else(|| "N/A".to_string()),
                payment_method: input.payment_method,
                responsible,
                observations: input.observations,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(expense)
    }

    /// List expenses, most recent first
    pub async fn list(&self, filter: ExpenseFilter) -> AppResult<PaginatedResponse<Expense>> {
        let range = DateRange {
            start_date: filter.start_date,
            end_date: filter.end_date,
        };
        if !range.is_valid() {
            return Err(AppError::validation(
                "start_date",
                "Start date must not be after end date",
                "La fecha de inicio no puede ser posterior a la fecha de fin",
            ));
        }
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM expenses");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM expenses", EXPENSE_COLUMNS));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY date DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let expenses = query.build_query_as::<Expense>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(expenses, &pagination, total))
    }

    /// Get a single expense
    pub async fn get(&self, id: Uuid) -> AppResult<Expense> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses WHERE id = $1 AND deleted_at IS NULL",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense".to_string()))
    }

    /// Update an expense
    pub async fn update(&self, id: Uuid, input: UpdateExpenseInput) -> AppResult<Expense> {
        input.validate()?;
        if let Some(amount) = input.amount {
            validate_amount(amount).map_err(|m| rule_error("amount", m))?;
        }

        sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE expenses SET
                date = COALESCE($2, date),
                category = COALESCE($3, category),
                concept = COALESCE($4, concept),
                description = COALESCE($5, description),
                amount = COALESCE($6, amount),
                provider = COALESCE($7, provider),
                receipt_url = COALESCE($8, receipt_url),
                payment_method = COALESCE($9, payment_method),
                observations = COALESCE($10, observations)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .bind(input.date)
        .bind(input.category)
        .bind(&input.concept)
        .bind(&input.description)
        .bind(input.amount)
        .bind(&input.provider)
        .bind(&input.receipt_url)
        .bind(input.payment_method)
        .bind(&input.observations)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense".to_string()))
    }

    /// Soft-delete an expense
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE expenses SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Expense".to_string()));
        }
        tracing::info!(expense_id = %id, "Expense deleted");
        Ok(())
    }
}

//! Client service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{contains_pattern, rule_error};
use shared::{
    validate_phone, ClientStats, OrderStatus, PaginatedResponse, Pagination, PaymentMethod,
    PurchaseRecord,
};

/// Client service
#[derive(Clone)]
pub struct ClientService {
    db: PgPool,
}

/// Client record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub notes: Option<String>,
    pub first_purchase: Option<NaiveDate>,
    pub last_purchase: Option<NaiveDate>,
    pub marketing_opt_in: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a client
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub district: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub marketing_opt_in: Option<bool>,
}

/// Input for updating a client
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientInput {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub district: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub marketing_opt_in: Option<bool>,
    pub active: Option<bool>,
}

/// Filters for listing clients
#[derive(Debug, Default, Deserialize)]
pub struct ClientFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub district: Option<String>,
}

impl ClientFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        for (column, term) in [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("district", &self.district),
        ] {
            if let Some(term) = term.as_deref().filter(|t| !t.trim().is_empty()) {
                qb.push(format!(" AND {} ILIKE ", column))
                    .push_bind(contains_pattern(term));
            }
        }
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    created_at: DateTime<Utc>,
    status: OrderStatus,
    total: Decimal,
    payment_method: PaymentMethod,
}

pub(crate) const CLIENT_COLUMNS: &str = r#"
    id, name, email, phone, address, district, notes, first_purchase, last_purchase,
    marketing_opt_in, active, created_at, updated_at
"#;

pub(crate) fn check_phone(phone: Option<&str>) -> AppResult<()> {
    match phone {
        Some(phone) => validate_phone(phone).map_err(|m| rule_error("phone", m)),
        None => Ok(()),
    }
}

impl ClientService {
    /// Create a new ClientService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a client
    pub async fn create(&self, input: CreateClientInput) -> AppResult<Client> {
        input.validate()?;
        check_phone(input.phone.as_deref())?;

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (name, email, phone, address, district, notes, marketing_opt_in)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.email.as_deref().map(str::trim))
        .bind(input.phone.as_deref().map(str::trim))
        .bind(&input.address)
        .bind(&input.district)
        .bind(&input.notes)
        .bind(input.marketing_opt_in.unwrap_or(false))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(client_id = %client.id, "Client created");
        Ok(client)
    }

    /// List clients alphabetically
    pub async fn list(&self, filter: ClientFilter) -> AppResult<PaginatedResponse<Client>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clients");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM clients", CLIENT_COLUMNS));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name ASC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let clients = query.build_query_as::<Client>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(clients, &pagination, total))
    }

    /// Get a client by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE id = $1 AND deleted_at IS NULL",
            CLIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    /// Update a client
    pub async fn update(&self, id: Uuid, input: UpdateClientInput) -> AppResult<Client> {
        input.validate()?;
        check_phone(input.phone.as_deref())?;

        sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                district = COALESCE($6, district),
                notes = COALESCE($7, notes),
                marketing_opt_in = COALESCE($8, marketing_opt_in),
                active = COALESCE($9, active)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.email.as_deref().map(str::trim))
        .bind(input.phone.as_deref().map(str::trim))
        .bind(&input.address)
        .bind(&input.district)
        .bind(&input.notes)
        .bind(input.marketing_opt_in)
        .bind(input.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    /// Soft-delete a client
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE clients SET deleted_at = NOW(), active = FALSE WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Client".to_string()));
        }
        tracing::info!(client_id = %id, "Client deleted");
        Ok(())
    }

    /// Purchase statistics for a client
    pub async fn stats(&self, id: Uuid) -> AppResult<ClientStats> {
        self.get(id).await?;

        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT created_at, status, total, payment_method
            FROM orders
            WHERE client_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let purchases: Vec<PurchaseRecord> = rows
            .into_iter()
            .map(|r| PurchaseRecord {
                placed_at: r.created_at,
                status: r.status,
                total: r.total,
                payment_method: r.payment_method,
            })
            .collect();

        Ok(ClientStats::from_purchases(&purchases, Utc::now().date_naive()))
    }
}

//! Product catalog service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{contains_pattern, rule_error};
use shared::{validate_amount, validate_code, PaginatedResponse, Pagination};

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Sellable package definition
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub weight_grams: i32,
    pub package_type: String,
    pub base_price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCatalogInput {
    pub code: String,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100000))]
    pub weight_grams: i32,
    #[validate(length(min = 1, max = 50))]
    pub package_type: String,
    pub base_price: Decimal,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCatalogInput {
    pub code: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100000))]
    pub weight_grams: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub package_type: Option<String>,
    pub base_price: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub package_type: Option<String>,
    pub active: Option<bool>,
}

impl CatalogFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE deleted_at IS NULL");
        for (column, term) in [
            ("code", &self.code),
            ("name", &self.name),
            ("package_type", &self.package_type),
        ] {
            if let Some(term) = term.as_deref().filter(|t| !t.trim().is_empty()) {
                qb.push(format!(" AND {} ILIKE ", column))
                    .push_bind(contains_pattern(term));
            }
        }
        if let Some(active) = self.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
}

pub(crate) const CATALOG_COLUMNS: &str = r#"
    id, code, name, description, weight_grams, package_type, base_price, active, created_at, updated_at
"#;

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateCatalogInput) -> AppResult<CatalogEntry> {
        input.validate()?;
        validate_code(&input.code).map_err(|m| rule_error("code", m))?;
        validate_amount(input.base_price).map_err(|m| rule_error("base_price", m))?;

        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            r#"
            INSERT INTO product_catalog (code, name, description, weight_grams, package_type, base_price, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CATALOG_COLUMNS
        ))
        .bind(&input.code)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.weight_grams)
        .bind(input.package_type.trim())
        .bind(input.base_price)
        .bind(input.active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(catalog_id = %entry.id, code = %entry.code, "Catalog entry created");
        Ok(entry)
    }

    pub async fn list(&self, filter: CatalogFilter) -> AppResult<PaginatedResponse<CatalogEntry>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product_catalog");
        filter.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM product_catalog", CATALOG_COLUMNS));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY name ASC, weight_grams ASC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let entries = query.build_query_as::<CatalogEntry>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(entries, &pagination, total))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<CatalogEntry> {
        sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT {} FROM product_catalog WHERE id = $1 AND deleted_at IS NULL",
            CATALOG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Catalog entry".to_string()))
    }

    /// Partial update; unspecified fields keep their value
    pub async fn update(&self, id: Uuid, input: UpdateCatalogInput) -> AppResult<CatalogEntry> {
        input.validate()?;
        if let Some(code) = &input.code {
            validate_code(code).map_err(|m| rule_error("code", m))?;
        }
        if let Some(price) = input.base_price {
            validate_amount(price).map_err(|m| rule_error("base_price", m))?;
        }

        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            r#"
            UPDATE product_catalog SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                weight_grams = COALESCE($5, weight_grams),
                package_type = COALESCE($6, package_type),
                base_price = COALESCE($7, base_price),
                active = COALESCE($8, active)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            CATALOG_COLUMNS
        ))
        .bind(id)
        .bind(&input.code)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.weight_grams)
        .bind(input.package_type.as_deref().map(str::trim))
        .bind(input.base_price)
        .bind(input.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Catalog entry".to_string()))?;

        tracing::info!(catalog_id = %id, "Catalog entry updated");
        Ok(entry)
    }

    /// Soft-delete an entry no live product is packed in
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;

        let in_use = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE product_catalog_id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        if in_use {
            return Err(AppError::Conflict {
                resource: "product_catalog".to_string(),
                message: "The catalog entry is used by products and cannot be deleted".to_string(),
                message_es: "La entrada del catálogo está en uso por productos y no puede eliminarse"
                    .to_string(),
            });
        }

        sqlx::query("UPDATE product_catalog SET deleted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(catalog_id = %id, "Catalog entry deleted");
        Ok(())
    }
}

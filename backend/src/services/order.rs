//! Order service
//!
//! Placing an order reserves its units: available stock goes down and the
//! reservation goes up by the same amount, with an outbound sale movement per
//! line. Delivery drops the reservation; cancellation returns it to the shelf.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::client::{check_phone, Client, CLIENT_COLUMNS};
use crate::services::inventory::{InventoryService, NewMovement};
use crate::services::product::{lock_product, store_stock};
use crate::services::rule_error;
use crate::services::user::UserService;
use shared::{
    calculate_order_totals, order_number, validate_amount, DateRange, MovementReason,
    MovementType, OrderLine, OrderOrigin, OrderStatus, PaginatedResponse, Pagination,
    PaymentMethod,
};

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    public_user_email: String,
}

/// Order header with its client's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub order_date: DateTime<Utc>,
    pub delivery_date_estimated: Option<NaiveDate>,
    pub delivery_date_real: Option<NaiveDate>,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_confirmed: bool,
    pub payment_receipt_url: Option<String>,
    pub notes: Option<String>,
    pub delivery_address: Option<String>,
    pub origin: OrderOrigin,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sold_kg: Decimal,
}

/// Order with its lines
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Contact details used to find or register the buyer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderClientInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub district: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Input for placing an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub client_id: Option<Uuid>,
    #[validate]
    pub client: Option<OrderClientInput>,
    #[validate]
    pub items: Vec<OrderItemInput>,
    pub discount: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500))]
    pub payment_receipt_url: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 500))]
    pub delivery_address: Option<String>,
    pub delivery_date_estimated: Option<NaiveDate>,
    pub origin: Option<OrderOrigin>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrderInput {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 500))]
    pub delivery_address: Option<String>,
    pub delivery_date_estimated: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
}

/// Filters for listing orders.
///
/// `status` and `payment_method` accept comma separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub origin: Option<OrderOrigin>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub payment_confirmed: Option<bool>,
}

struct OrderConditions {
    client_id: Option<Uuid>,
    statuses: Vec<OrderStatus>,
    payment_methods: Vec<PaymentMethod>,
    origin: Option<OrderOrigin>,
    range: DateRange,
    payment_confirmed: Option<bool>,
}

fn parse_list<T>(raw: Option<&str>, field: &str, parse: fn(&str) -> Option<T>) -> AppResult<Vec<T>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            parse(v).ok_or_else(|| {
                AppError::validation(
                    field,
                    &format!("Unknown value '{}'", v),
                    &format!("Valor desconocido '{}'", v),
                )
            })
        })
        .collect()
}

impl OrderFilter {
    fn conditions(&self, client_id: Option<Uuid>) -> AppResult<OrderConditions> {
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

        Ok(OrderConditions {
            client_id,
            statuses: parse_list(self.status.as_deref(), "status", OrderStatus::parse)?,
            payment_methods: parse_list(self.payment_method.as_deref(), "payment_method", PaymentMethod::parse)?,
            origin: self.origin,
            range,
            payment_confirmed: self.payment_confirmed,
        })
    }
}

impl OrderConditions {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE o.deleted_at IS NULL");
        if let Some(client_id) = self.client_id {
            qb.push(" AND o.client_id = ").push_bind(client_id);
        }
        if !self.statuses.is_empty() {
            qb.push(" AND o.status IN (");
            let mut separated = qb.separated(", ");
            for status in &self.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        if !self.payment_methods.is_empty() {
            qb.push(" AND o.payment_method IN (");
            let mut separated = qb.separated(", ");
            for method in &self.payment_methods {
                separated.push_bind(*method);
            }
            separated.push_unseparated(")");
        }
        if let Some(origin) = self.origin {
            qb.push(" AND o.origin = ").push_bind(origin);
        }
        if let Some(start) = self.range.start_bound() {
            qb.push(" AND o.order_date >= ").push_bind(start);
        }
        if let Some(end) = self.range.end_bound() {
            qb.push(" AND o.order_date < ").push_bind(end);
        }
        if let Some(confirmed) = self.payment_confirmed {
            qb.push(" AND o.payment_confirmed = ").push_bind(confirmed);
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DailyOrders {
    pub date: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ProductRevenue {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Order statistics
#[derive(Debug, Serialize)]
pub struct OrderStatistics {
    pub total_orders: i64,
    /// Sum of totals of orders that were not cancelled
    pub total_revenue: Decimal,
    pub status_distribution: Vec<StatusCount>,
    pub orders_last_7_days: Vec<DailyOrders>,
    pub top_products: Vec<ProductRevenue>,
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.order_number, o.client_id, c.name AS client_name, o.order_date,
           o.delivery_date_estimated, o.delivery_date_real, o.status, o.subtotal, o.discount,
           o.shipping, o.total, o.payment_method, o.payment_confirmed, o.payment_receipt_url,
           o.notes, o.delivery_address, o.origin, o.created_by, o.created_at, o.updated_at
    FROM orders o
    JOIN clients c ON c.id = o.client_id
"#;

async fn fetch_order(conn: &mut PgConnection, id: Uuid) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!("{} WHERE o.id = $1 AND o.deleted_at IS NULL", ORDER_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn lock_order(conn: &mut PgConnection, id: Uuid) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!(
        "{} WHERE o.id = $1 AND o.deleted_at IS NULL FOR UPDATE OF o",
        ORDER_SELECT
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn fetch_items(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT oi.id, oi.product_id, p.sku, c.name AS product_name, oi.quantity,
               oi.unit_price, oi.subtotal, oi.sold_kg
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        JOIN product_catalog c ON c.id = p.product_catalog_id
        WHERE oi.order_id = $1
        ORDER BY oi.product_id
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Find the buyer by id, or by email or phone, registering them when unknown.
///
/// A known buyer gets any changed contact details written back.
async fn resolve_client(
    conn: &mut PgConnection,
    client_id: Option<Uuid>,
    contact: Option<&OrderClientInput>,
) -> AppResult<Client> {
    if let Some(id) = client_id {
        return sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE id = $1 AND deleted_at IS NULL",
            CLIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()));
    }

    let contact = contact.ok_or_else(|| {
        AppError::validation(
            "client",
            "Either client_id or client details are required",
            "Se requiere client_id o los datos del cliente",
        )
    })?;
    check_phone(contact.phone.as_deref())?;
    let email = contact.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let phone = contact.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let existing = if email.is_some() || phone.is_some() {
        sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {} FROM clients
            WHERE deleted_at IS NULL
              AND (($1::TEXT IS NOT NULL AND LOWER(email) = LOWER($1)) OR ($2::TEXT IS NOT NULL AND phone = $2))
            ORDER BY created_at ASC
            LIMIT 1
            "#,
            CLIENT_COLUMNS
        ))
        .bind(email)
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        None
    };

    let client = match existing {
        Some(client) => {
            let changed = client.name != contact.name.trim()
                || (email.is_some() && client.email.as_deref() != email)
                || (phone.is_some() && client.phone.as_deref() != phone)
                || (contact.address.is_some() && client.address != contact.address)
                || (contact.district.is_some() && client.district != contact.district);
            if !changed {
                return Ok(client);
            }
            tracing::debug!(client_id = %client.id, "Updating client contact details from order");
            sqlx::query_as::<_, Client>(&format!(
                r#"
                UPDATE clients SET
                    name = $2,
                    email = COALESCE($3, email),
                    phone = COALESCE($4, phone),
                    address = COALESCE($5, address),
                    district = COALESCE($6, district)
                WHERE id = $1
                RETURNING {}
                "#,
                CLIENT_COLUMNS
            ))
            .bind(client.id)
            .bind(contact.name.trim())
            .bind(email)
            .bind(phone)
            .bind(&contact.address)
            .bind(&contact.district)
            .fetch_one(&mut *conn)
            .await?
        }
        None => {
            let client = sqlx::query_as::<_, Client>(&format!(
                r#"
                INSERT INTO clients (name, email, phone, address, district)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {}
                "#,
                CLIENT_COLUMNS
            ))
            .bind(contact.name.trim())
            .bind(email)
            .bind(phone)
            .bind(&contact.address)
            .bind(&contact.district)
            .fetch_one(&mut *conn)
            .await?;
            tracing::info!(client_id = %client.id, "Client registered from order");
            client
        }
    };
    Ok(client)
}

/// Sum quantities per product; the map's order doubles as the row lock order
fn merge_items(items: &[OrderItemInput]) -> AppResult<BTreeMap<Uuid, i32>> {
    let mut merged = BTreeMap::new();
    for item in items {
        let quantity = merged.entry(item.product_id).or_insert(0i32);
        *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
            AppError::validation("quantity", "Quantity is too large", "La cantidad es demasiado grande")
        })?;
    }
    Ok(merged)
}

fn not_open(order: &Order, action: &str, accion: &str) -> AppError {
    AppError::InvalidStateTransition(format!(
        "Order {} is {} and cannot be {} / El pedido {} está {} y no puede ser {}",
        order.order_number,
        order.status,
        action,
        order.order_number,
        order.status,
        accion
    ))
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, public_user_email: impl Into<String>) -> Self {
        Self {
            db,
            public_user_email: public_user_email.into(),
        }
    }

    /// Place an order on behalf of a staff member
    pub async fn create(&self, user_id: Uuid, input: CreateOrderInput) -> AppResult<OrderDetail> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(AppError::validation(
                "items",
                "An order needs at least one item",
                "Un pedido necesita al menos un producto",
            ));
        }
        let discount = input.discount.unwrap_or(Decimal::ZERO);
        let shipping = input.shipping.unwrap_or(Decimal::ZERO);
        validate_amount(discount).map_err(|m| rule_error("discount", m))?;
        validate_amount(shipping).map_err(|m| rule_error("shipping", m))?;
        let merged = merge_items(&input.items)?;

        let mut tx = self.db.begin().await?;

        let client = resolve_client(&mut *tx, input.client_id, input.client.as_ref()).await?;

        let mut lines = Vec::with_capacity(merged.len());
        for (&product_id, &quantity) in &merged {
            let product = lock_product(&mut *tx, product_id).await?;
            if !product.active {
                return Err(AppError::validation(
                    "product_id",
                    &format!("Product {} is not available for sale", product.sku),
                    &format!("El producto {} no está disponible para la venta", product.sku),
                ));
            }
            let stock = product.stock().reserve(quantity)?;
            let line = OrderLine::price(quantity, product.sale_price, product.weight_grams)?;
            lines.push((product, stock, line));
        }

        let priced: Vec<OrderLine> = lines.iter().map(|(_, _, line)| *line).collect();
        let totals = calculate_order_totals(&priced, discount, shipping)?;
        let number = order_number(Utc::now());

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (
                order_number, client_id, delivery_date_estimated, status, subtotal, discount,
                shipping, total, payment_method, payment_receipt_url, notes, delivery_address,
                origin, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(client.id)
        .bind(input.delivery_date_estimated)
        .bind(OrderStatus::Pending)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.shipping)
        .bind(totals.total)
        .bind(input.payment_method)
        .bind(&input.payment_receipt_url)
        .bind(&input.notes)
        .bind(input.delivery_address.as_ref().or(client.address.as_ref()))
        .bind(input.origin.unwrap_or(OrderOrigin::Other))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for (product, stock, line) in &lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, subtotal, sold_kg)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(product.id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .bind(line.sold_kg)
            .execute(&mut *tx)
            .await?;

            store_stock(&mut *tx, product.id, *stock).await?;

            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_product(
                    product.id,
                    MovementType::Outbound,
                    line.quantity,
                    product.package_type.clone(),
                    MovementReason::Sale,
                    number.clone(),
                    user_id,
                ),
            )
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE clients SET
                first_purchase = COALESCE(first_purchase, CURRENT_DATE),
                last_purchase = CURRENT_DATE
            WHERE id = $1
            "#,
        )
        .bind(client.id)
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut *tx, order_id).await?;
        let items = fetch_items(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            client_id = %order.client_id,
            total = %order.total,
            lines = items.len(),
            "Order created"
        );
        Ok(OrderDetail { order, items })
    }

    /// Place an order from the public storefront as the system account
    pub async fn create_public(&self, input: CreateOrderInput) -> AppResult<OrderDetail> {
        let system_user = UserService::new(self.db.clone())
            .find_active_by_email(&self.public_user_email)
            .await?
            .ok_or_else(|| {
                tracing::error!(email = %self.public_user_email, "System user for public orders is missing");
                AppError::Configuration(format!(
                    "system user {} for public orders does not exist",
                    self.public_user_email
                ))
            })?;

        self.create(system_user.id, input).await
    }

    /// List orders, newest first
    pub async fn list(&self, filter: OrderFilter) -> AppResult<PaginatedResponse<Order>> {
        let conditions = filter.conditions(None)?;
        self.list_matching(&filter, conditions).await
    }

    /// List a client's orders, newest first
    pub async fn list_by_client(
        &self,
        client_id: Uuid,
        filter: OrderFilter,
    ) -> AppResult<PaginatedResponse<Order>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(client_id)
        .fetch_one(&self.db)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Client".to_string()));
        }

        let conditions = filter.conditions(Some(client_id))?;
        self.list_matching(&filter, conditions).await
    }

    async fn list_matching(
        &self,
        filter: &OrderFilter,
        conditions: OrderConditions,
    ) -> AppResult<PaginatedResponse<Order>> {
        let pagination = Pagination {
            page: filter.page,
            limit: filter.limit,
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        conditions.push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(ORDER_SELECT);
        conditions.push_conditions(&mut query);
        query
            .push(" ORDER BY o.order_date DESC LIMIT ")
            .push_bind(i64::from(pagination.per_page()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let orders = query.build_query_as::<Order>().fetch_all(&self.db).await?;

        Ok(PaginatedResponse::new(orders, &pagination, total))
    }

    /// Get an order with its lines
    pub async fn get(&self, id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut *conn, id).await?;
        let items = fetch_items(&mut *conn, id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Edit delivery details and notes
    pub async fn update(&self, id: Uuid, input: UpdateOrderInput) -> AppResult<OrderDetail> {
        input.validate()?;
        if input.notes.is_none() && input.delivery_address.is_none() && input.delivery_date_estimated.is_none() {
            return Err(AppError::validation(
                "body",
                "Nothing to update: give notes, delivery_address or delivery_date_estimated",
                "Nada que actualizar: indique notes, delivery_address o delivery_date_estimated",
            ));
        }

        let mut tx = self.db.begin().await?;
        lock_order(&mut *tx, id).await?;
        sqlx::query(
            r#"
            UPDATE orders SET
                notes = COALESCE($2, notes),
                delivery_address = COALESCE($3, delivery_address),
                delivery_date_estimated = COALESCE($4, delivery_date_estimated)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.notes)
        .bind(&input.delivery_address)
        .bind(input.delivery_date_estimated)
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut *tx, id).await?;
        let items = fetch_items(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, "Order updated");
        Ok(OrderDetail { order, items })
    }

    /// Move an order forward through its lifecycle.
    ///
    /// Delivering an order drops its reservation and confirms payment.
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<OrderDetail> {
        if status == OrderStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(
                "Use the cancel operation to cancel an order / Use la operación de cancelación para anular un pedido"
                    .to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut *tx, id).await?;

        if order.status != status {
            order.status.ensure_can_advance_to(status)?;

            if status == OrderStatus::Delivered {
                let items = fetch_items(&mut *tx, id).await?;
                for item in &items {
                    let product = lock_product(&mut *tx, item.product_id).await?;
                    let stock = product.stock().release_delivered(item.quantity)?;
                    store_stock(&mut *tx, product.id, stock).await?;
                }
                sqlx::query(
                    r#"
                    UPDATE orders SET status = $2, delivery_date_real = CURRENT_DATE, payment_confirmed = TRUE
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(status)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
                    .bind(id)
                    .bind(status)
                    .execute(&mut *tx)
                    .await?;
            }

            tracing::info!(
                order_id = %id,
                from = order.status.as_str(),
                to = status.as_str(),
                "Order status changed"
            );
        }

        let order = fetch_order(&mut *tx, id).await?;
        let items = fetch_items(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(OrderDetail { order, items })
    }

    /// Mark an order as paid
    pub async fn confirm_payment(&self, id: Uuid) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut *tx, id).await?;

        if order.payment_confirmed {
            return Err(AppError::validation(
                "payment_confirmed",
                "Payment is already confirmed",
                "El pago ya está confirmado",
            ));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(not_open(&order, "paid", "pagado"));
        }

        sqlx::query("UPDATE orders SET payment_confirmed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let order = fetch_order(&mut *tx, id).await?;
        let items = fetch_items(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, total = %order.total, "Order payment confirmed");
        Ok(OrderDetail { order, items })
    }

    /// Cancel an order and put its reserved units back on the shelf
    pub async fn cancel(&self, user_id: Uuid, id: Uuid) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut *tx, id).await?;
        let items = fetch_items(&mut *tx, id).await?;

        match order.status {
            OrderStatus::Cancelled => {
                tx.commit().await?;
                return Ok(OrderDetail { order, items });
            }
            status if !status.can_cancel() => {
                return Err(not_open(&order, "cancelled", "cancelado"));
            }
            _ => {}
        }

        for item in &items {
            let product = lock_product(&mut *tx, item.product_id).await?;
            let stock = product.stock().return_cancelled(item.quantity)?;
            store_stock(&mut *tx, product.id, stock).await?;

            InventoryService::record_movement(
                &mut *tx,
                &NewMovement::for_product(
                    product.id,
                    MovementType::Inbound,
                    item.quantity,
                    product.package_type.clone(),
                    MovementReason::Return,
                    order.order_number.clone(),
                    user_id,
                )
                .with_notes(Some("Order cancelled".to_string())),
            )
            .await?;
        }

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(OrderStatus::Cancelled)
            .execute(&mut *tx)
            .await?;

        let order = fetch_order(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, order_number = %order.order_number, "Order cancelled");
        Ok(OrderDetail { order, items })
    }

    /// Soft-delete a closed order
    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut *tx, id).await?;
        if order.status.is_open() {
            return Err(AppError::Conflict {
                resource: "order".to_string(),
                message: "Only cancelled or delivered orders can be deleted".to_string(),
                message_es: "Solo se pueden eliminar pedidos cancelados o entregados".to_string(),
            });
        }

        sqlx::query("UPDATE orders SET deleted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// Totals, status distribution, the last week by day and best sellers
    pub async fn statistics(&self) -> AppResult<OrderStatistics> {
        let (total_orders, total_revenue) = sqlx::query_as::<_, (i64, Decimal)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(total) FILTER (WHERE status <> 'CANCELLED'), 0)
            FROM orders
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let counted = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM orders
            WHERE deleted_at IS NULL
            GROUP BY status
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        let status_distribution = OrderStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                status,
                count: counted
                    .iter()
                    .find(|c| c.status == status)
                    .map(|c| c.count)
                    .unwrap_or(0),
            })
            .collect();

        let since = Utc::now().date_naive() - Duration::days(6);
        let orders_last_7_days = sqlx::query_as::<_, DailyOrders>(
            r#"
            SELECT d::DATE AS date,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.total) FILTER (WHERE o.status <> 'CANCELLED'), 0) AS revenue
            FROM generate_series($1::DATE, CURRENT_DATE, INTERVAL '1 day') AS d
            LEFT JOIN orders o
                ON (o.order_date AT TIME ZONE 'UTC')::DATE = d::DATE AND o.deleted_at IS NULL
            GROUP BY d
            ORDER BY d ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let top_products = sqlx::query_as::<_, ProductRevenue>(
            r#"
            SELECT p.id AS product_id, p.sku, c.name AS product_name,
                   SUM(oi.quantity)::BIGINT AS units_sold, SUM(oi.subtotal) AS revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            JOIN product_catalog c ON c.id = p.product_catalog_id
            WHERE o.deleted_at IS NULL AND o.status <> 'CANCELLED'
            GROUP BY p.id, p.sku, c.name
            ORDER BY revenue DESC
            LIMIT 5
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(OrderStatistics {
            total_orders,
            total_revenue,
            status_distribution,
            orders_last_7_days,
            top_products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_items_sums_duplicates_in_id_order() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let items = vec![
            OrderItemInput { product_id: a, quantity: 2 },
            OrderItemInput { product_id: b, quantity: 1 },
            OrderItemInput { product_id: a, quantity: 3 },
        ];

        let merged = merge_items(&items).unwrap();
        let entries: Vec<_> = merged.into_iter().collect();
        assert_eq!(entries, vec![(b, 1), (a, 5)]);
    }

    #[test]
    fn test_merge_items_rejects_overflow() {
        let id = Uuid::from_u128(7);
        let items = vec![
            OrderItemInput { product_id: id, quantity: i32::MAX },
            OrderItemInput { product_id: id, quantity: 1 },
        ];
        assert!(matches!(merge_items(&items), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_status_and_method_lists_parse() {
        let filter = OrderFilter {
            status: Some("PENDING, READY".to_string()),
            payment_method: Some("YAPE".to_string()),
            ..Default::default()
        };
        let conditions = filter.conditions(None).unwrap();
        assert_eq!(conditions.statuses, vec![OrderStatus::Pending, OrderStatus::Ready]);
        assert_eq!(conditions.payment_methods, vec![PaymentMethod::Yape]);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let filter = OrderFilter {
            status: Some("SHIPPED".to_string()),
            ..Default::default()
        };
        assert!(matches!(filter.conditions(None), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_inverted_date_range_is_rejected() {
        let filter = OrderFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 5, 2),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert!(filter.conditions(None).is_err());
    }
}

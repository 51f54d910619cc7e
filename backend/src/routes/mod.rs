//! Route definitions for the roastery API

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login/register public, profile protected)
        .nest("/auth", auth_routes(state.clone()))
        // Storefront orders (public)
        .route("/orders/public", post(handlers::create_public_order))
        .merge(protected_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .merge(
            Router::new()
                .route("/profile", get(handlers::profile))
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

/// Everything behind a Bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/clients", client_routes())
        .nest("/batches", batch_routes())
        .nest("/micro-batches", micro_batch_routes())
        .nest("/product-catalog", catalog_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/inventory", inventory_routes())
        .nest("/expenses", expense_routes())
        .nest("/dashboard", dashboard_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}

fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_clients).post(handlers::create_client))
        .route(
            "/:client_id",
            get(handlers::get_client)
                .patch(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route("/:client_id/stats", get(handlers::client_stats))
        .route("/:client_id/orders", get(handlers::list_client_orders))
}

fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route(
            "/:batch_id",
            get(handlers::get_batch)
                .patch(handlers::update_batch)
                .delete(handlers::delete_batch),
        )
        .route("/:batch_id/summary", get(handlers::batch_summary))
}

fn micro_batch_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_micro_batches).post(handlers::create_micro_batch),
        )
        .route(
            "/:micro_batch_id",
            get(handlers::get_micro_batch)
                .patch(handlers::update_micro_batch)
                .delete(handlers::delete_micro_batch),
        )
        .route(
            "/:micro_batch_id/expenses",
            post(handlers::add_micro_batch_expense),
        )
        .route("/:micro_batch_id/costs", get(handlers::micro_batch_costs))
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_catalog).post(handlers::create_catalog_entry),
        )
        .route(
            "/:entry_id",
            get(handlers::get_catalog_entry)
                .patch(handlers::update_catalog_entry)
                .delete(handlers::delete_catalog_entry),
        )
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/low-stock", get(handlers::low_stock_products))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/adjust-stock", post(handlers::adjust_product_stock))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/statistics", get(handlers::order_statistics))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .patch(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/status", patch(handlers::update_order_status))
        .route("/:order_id/confirm-payment", patch(handlers::confirm_order_payment))
        .route("/:order_id/cancel", patch(handlers::cancel_order))
}

fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/movements", get(handlers::list_movements))
        .route("/summary", get(handlers::stock_summary))
        .route(
            "/products/:product_id/reconcile",
            get(handlers::reconcile_product_stock),
        )
}

fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_expenses).post(handlers::create_expense))
        .route(
            "/:expense_id",
            get(handlers::get_expense)
                .patch(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(handlers::dashboard_overview))
        .route("/sales-metrics", get(handlers::dashboard_sales_metrics))
        .route("/inventory-metrics", get(handlers::dashboard_inventory_metrics))
        .route("/top-clients", get(handlers::dashboard_top_clients))
        .route("/top-products", get(handlers::dashboard_top_products))
}

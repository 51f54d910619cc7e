//! Business logic services for the roastery backend

pub mod auth;
pub mod batch;
pub mod catalog;
pub mod client;
pub mod dashboard;
pub mod expense;
pub mod inventory;
pub mod micro_batch;
pub mod order;
pub mod product;
pub mod user;

pub use auth::AuthService;
pub use batch::BatchService;
pub use catalog::CatalogService;
pub use client::ClientService;
pub use dashboard::DashboardService;
pub use expense::ExpenseService;
pub use inventory::InventoryService;
pub use micro_batch::MicroBatchService;
pub use order::OrderService;
pub use product::ProductService;
pub use user::UserService;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Name recorded as responsible on expenses created by a user
pub(crate) async fn user_display_name(conn: &mut PgConnection, user_id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in the term escaped
pub(crate) fn contains_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Validation error for a rule checked by `shared::validation`
pub(crate) fn rule_error(field: &str, message: &'static str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
        message_es: spanish_validation_message(message).to_string(),
    }
}

fn spanish_validation_message(message: &str) -> &'static str {
    match message {
        "Weight must be greater than zero" => "El peso debe ser mayor que cero",
        "Weight supports at most three decimal places (grams)" => {
            "El peso admite como máximo tres decimales (gramos)"
        }
        "Weight is too large" => "El peso es demasiado grande",
        "Amount cannot be negative" => "El monto no puede ser negativo",
        "Amount is too large" => "El monto es demasiado grande",
        "Amount supports at most two decimal places" => "El monto admite como máximo dos decimales",
        "Amount must be greater than zero" => "El monto debe ser mayor que cero",
        "Code must be between 1 and 50 characters" => "El código debe tener entre 1 y 50 caracteres",
        "Code may only contain letters, digits, '-' and '_'" => {
            "El código solo puede contener letras, dígitos, '-' y '_'"
        }
        "Phone number must contain between 6 and 15 digits" => {
            "El teléfono debe contener entre 6 y 15 dígitos"
        }
        "Phone number contains invalid characters" => "El teléfono contiene caracteres no válidos",
        _ => "Datos no válidos",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("geisha"), "%geisha%");
        assert_eq!(contains_pattern(" 100%_arabica "), "%100\\%\\_arabica%");
    }

    #[test]
    fn test_rule_error_is_bilingual() {
        match rule_error("amount", "Amount cannot be negative") {
            AppError::Validation {
                field, message_es, ..
            } => {
                assert_eq!(field, "amount");
                assert_eq!(message_es, "El monto no puede ser negativo");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_quantities_are_translated() {
        assert_eq!(spanish_validation_message("Weight is too large"), "El peso es demasiado grande");
        assert_eq!(spanish_validation_message("Amount is too large"), "El monto es demasiado grande");
        let err = shared::validate_amount(shared::MAX_AMOUNT + rust_decimal::Decimal::ONE)
            .map_err(|m| rule_error("total_cost", m));
        assert!(matches!(err, Err(AppError::Validation { .. })));
    }
}

//! Error handling for the roastery backend
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String, message_es: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient green coffee: {0}")]
    InsufficientGreenCoffee(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[source] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field validation error
    pub fn validation(field: &str, message: &str, message_es: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_es: message_es.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default();
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => return AppError::DuplicateEntry(field_from_constraint(constraint)),
                // foreign_key_violation
                Some("23503") => {
                    return AppError::Conflict {
                        resource: field_from_constraint(constraint),
                        message: "The record is referenced by or references missing data"
                            .to_string(),
                        message_es: "El registro está referenciado o referencia datos inexistentes"
                            .to_string(),
                    }
                }
                // check_violation
                Some("23514") => {
                    return AppError::Validation {
                        field: field_from_constraint(constraint),
                        message: "Value violates a data constraint".to_string(),
                        message_es: "El valor viola una restricción de datos".to_string(),
                    }
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }
}

/// Turn a constraint name like `batches_code_key` into the field it guards
fn field_from_constraint(constraint: &str) -> String {
    let trimmed = constraint
        .trim_end_matches("_fkey")
        .trim_end_matches("_key")
        .trim_end_matches("_check");
    const TABLES: &[&str] = &[
        "inventory_movements_",
        "product_catalog_",
        "micro_batches_",
        "order_items_",
        "expenses_",
        "products_",
        "batches_",
        "clients_",
        "orders_",
        "users_",
    ];
    let field = TABLES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    if field.is_empty() {
        "record".to_string()
    } else {
        field.to_string()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&&str> = field_errors.keys().collect();
        fields.sort();

        match fields.first() {
            Some(field) => {
                let detail = field_errors
                    .get(**field)
                    .and_then(|errs| errs.first())
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .unwrap_or_default();
                AppError::Validation {
                    field: field.to_string(),
                    message: format!("Invalid value for {}: {}", field, detail),
                    message_es: format!("Valor no válido para {}: {}", field, detail),
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::InsufficientGreenCoffee { .. } => {
                AppError::InsufficientGreenCoffee(err.to_string())
            }
            DomainError::InsufficientStock { .. } | DomainError::ReleaseExceedsReserved { .. } => {
                AppError::InsufficientStock(err.to_string())
            }
            DomainError::InvalidTransition { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
            _ => AppError::Validation {
                field: err.field().unwrap_or("input").to_string(),
                message: err.to_string(),
                message_es: spanish_domain_message(&err),
            },
        }
    }
}

fn spanish_domain_message(err: &DomainError) -> String {
    match err {
        DomainError::NonPositive(field) => format!("{} debe ser mayor que cero", field),
        DomainError::Negative(field) => format!("{} no puede ser negativo", field),
        DomainError::RoastedExceedsGreen { green, roasted } => format!(
            "El peso tostado {} kg supera el peso verde {} kg",
            roasted, green
        ),
        DomainError::GreenWeightBelowConsumed { consumed } => format!(
            "El peso verde no puede ser menor que los {} kg ya tostados",
            consumed
        ),
        DomainError::NoUnitsProduced => {
            "El tueste no produce unidades vendibles para este empaque".to_string()
        }
        DomainError::NegativeTotal => "El total del pedido no puede ser negativo".to_string(),
        DomainError::StockOverflow(field) => {
            format!("{} deja los contadores de stock fuera de rango", field)
        }
        other => format!("Datos no válidos: {}", other),
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_CREDENTIALS".to_string(),
                    message_en: "Invalid email or password".to_string(),
                    message_es: "Correo o contraseña incorrectos".to_string(),
                    field: None,
                },
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_es: "El token ha expirado".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_es: "Token no válido".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_es: "No tiene permiso para realizar esta acción".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized {
                message,
                message_es,
            } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: None,
                },
            ),
            AppError::Forbidden {
                message,
                message_es,
            } => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "FORBIDDEN".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Datos no válidos: {}", msg),
                    field: None,
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_es: format!("Ya existe un registro con este {}", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("No se puede cambiar el estado: {}", msg),
                    field: None,
                },
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Stock insuficiente: {}", msg),
                    field: None,
                },
            ),
            AppError::InsufficientGreenCoffee(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_GREEN_COFFEE".to_string(),
                    message_en: msg.clone(),
                    message_es: format!("Café verde insuficiente: {}", msg),
                    field: Some("green_kg_used".to_string()),
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_es: format!("Error de configuración: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error en la base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::OrderStatus;
    use validator::Validate;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::InsufficientPermissions), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::NotFound("Batch".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::DuplicateEntry("code".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::InsufficientStock("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_business_errors() {
        let err: AppError = DomainError::InsufficientGreenCoffee {
            requested: Decimal::from(5),
            available: Decimal::from(2),
        }
        .into();
        assert!(matches!(err, AppError::InsufficientGreenCoffee(_)));

        let err: AppError = DomainError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        }
        .into();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));

        let err: AppError = DomainError::NegativeTotal.into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "discount"),
            other => panic!("unexpected error: {:?}", other),
        }

        let err: AppError = DomainError::StockOverflow("delta").into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "delta"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            status_of(DomainError::StockOverflow("quantity").into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_field_from_constraint() {
        assert_eq!(field_from_constraint("orders_client_id_fkey"), "client_id");
        assert_eq!(field_from_constraint("batches_code_key"), "code");
        assert_eq!(field_from_constraint("product_catalog_code_key"), "code");
        assert_eq!(field_from_constraint("users_email_key"), "email");
        assert_eq!(field_from_constraint("products_sku_key"), "sku");
        assert_eq!(field_from_constraint(""), "record");
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_validator_errors_name_the_field() {
        let signup = Signup {
            email: "not-an-email".to_string(),
        };
        let err: AppError = signup.validate().unwrap_err().into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "email"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

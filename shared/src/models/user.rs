//! User accounts and roles

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Manager,
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Manager => "MANAGER",
            UserRole::Staff => "STAFF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(UserRole::Admin),
            "MANAGER" => Some(UserRole::Manager),
            "STAFF" => Some(UserRole::Staff),
            _ => None,
        }
    }
}

/// Roles allowed to manage stock, costs and reports
pub const MANAGEMENT_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Manager];

/// Every role
pub const ALL_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Manager, UserRole::Staff];

const SELF_EDITABLE_FIELDS: &[&str] = &["name", "email", "password"];
const ADMIN_EDITABLE_FIELDS: &[&str] = &["role", "active"];

/// Fields of a user update the caller is not allowed to change.
///
/// Users may edit their own name, email and password; admins may change
/// anyone's role and active flag.
pub fn forbidden_user_fields<'a>(
    requested: &[&'a str],
    is_self: bool,
    is_admin: bool,
) -> Vec<&'a str> {
    requested
        .iter()
        .copied()
        .filter(|field| {
            let self_ok = is_self && SELF_EDITABLE_FIELDS.contains(field);
            let admin_ok = is_admin && ADMIN_EDITABLE_FIELDS.contains(field);
            !(self_ok || admin_ok)
        })
        .collect()
}

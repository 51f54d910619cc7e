//! Shared types and domain rules for the roastery operations backend
//!
//! Everything in this crate is pure: enums persisted by the backend, the
//! arithmetic that links batches, roasts, stock and orders, and small input
//! validators. The backend crate owns all I/O.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;

//! HTTP handlers

pub mod auth;
pub mod batches;
pub mod catalog;
pub mod clients;
pub mod dashboard;
pub mod expenses;
pub mod health;
pub mod inventory;
pub mod micro_batches;
pub mod orders;
pub mod products;
pub mod users;

pub use auth::*;
pub use batches::*;
pub use catalog::*;
pub use clients::*;
pub use dashboard::*;
pub use expenses::*;
pub use health::*;
pub use inventory::*;
pub use micro_batches::*;
pub use orders::*;
pub use products::*;
pub use users::*;

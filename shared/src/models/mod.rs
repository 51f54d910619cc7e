//! Domain models shared between the backend and its tests

pub mod batch;
pub mod client;
pub mod expense;
pub mod inventory;
pub mod micro_batch;
pub mod order;
pub mod product;
pub mod user;

pub use batch::*;
pub use client::*;
pub use expense::*;
pub use inventory::*;
pub use micro_batch::*;
pub use order::*;
pub use product::*;
pub use user::*;

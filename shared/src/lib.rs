//! Shared domain types and rules for the PDI Control Center
//!
//! This crate holds the branch hierarchy, stock, transfer, sales/PDI and reporting rules.
//! It is synchronous and performs no I/O; the backend loads rows, applies these rules and
//! persists the result.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;

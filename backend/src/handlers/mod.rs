//! HTTP request handlers

pub mod auth;
pub mod branch;
pub mod health;
pub mod pdi;
pub mod reporting;
pub mod stock;
pub mod transfer;

pub use auth::*;
pub use branch::*;
pub use health::*;
pub use pdi::*;
pub use reporting::*;
pub use stock::*;
pub use transfer::*;

//! Domain models for the dealership back office

mod branch;
mod context;
mod inventory;
mod report;
mod sales;
mod stock;
mod transfer;
mod user;
mod vehicle;

pub use branch::*;
pub use context::*;
pub use inventory::*;
pub use report::*;
pub use sales::*;
pub use stock::*;
pub use transfer::*;
pub use user::*;
pub use vehicle::*;

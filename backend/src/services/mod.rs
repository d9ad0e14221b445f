//! Business logic services for the PDI Control Center

pub mod auth;
pub mod branch;
pub mod reporting;
pub mod sales;
pub mod stock;
pub mod store;
pub mod transfer;

pub use auth::AuthService;
pub use branch::BranchService;
pub use reporting::ReportingService;
pub use sales::SalesService;
pub use stock::StockService;
pub use transfer::TransferService;

//! Domain errors raised by the stock, transfer and PDI rules
//!
//! Every variant describes a rejected operation. Rules validate before they mutate, so a
//! returned error always means nothing was changed.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Capability, TransferStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid state transition for {subject}: {from} -> {to}")]
    InvalidStateTransition {
        subject: String,
        from: String,
        to: String,
    },

    #[error("Branch not found: {0}")]
    BranchNotFound(Uuid),

    #[error("Branch hierarchy cycle detected at branch {0}")]
    BranchCycle(Uuid),

    #[error("Duplicate chassis number: {0}")]
    DuplicateChassis(String),

    #[error("Transfer {reference} is not pending (status: {status})")]
    TransferNotPending {
        reference: String,
        status: TransferStatus,
    },

    #[error("Branch {0} is outside the caller's scope")]
    UnauthorizedScope(Uuid),

    #[error("Role lacks capability: {0}")]
    MissingCapability(Capability),

    #[error("Only the assigned mechanic can complete this PDI")]
    NotAssignedMechanic,

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("Vehicle {chassis_no} is already part of a pending transfer")]
    VehicleAlreadyInTransfer { chassis_no: String },

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Sales record not found: {0}")]
    SaleNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    pub fn transition(subject: impl Into<String>, from: impl ToString, to: impl ToString) -> Self {
        DomainError::InvalidStateTransition {
            subject: subject.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            DomainError::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            DomainError::BranchCycle(_) => "BRANCH_CYCLE",
            DomainError::DuplicateChassis(_) => "DUPLICATE_CHASSIS",
            DomainError::TransferNotPending { .. } => "TRANSFER_NOT_PENDING",
            DomainError::UnauthorizedScope(_) => "UNAUTHORIZED_SCOPE",
            DomainError::MissingCapability(_) => "MISSING_CAPABILITY",
            DomainError::NotAssignedMechanic => "NOT_ASSIGNED_MECHANIC",
            DomainError::VehicleNotFound(_) => "VEHICLE_NOT_FOUND",
            DomainError::VehicleAlreadyInTransfer { .. } => "VEHICLE_ALREADY_IN_TRANSFER",
            DomainError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            DomainError::SaleNotFound(_) => "SALE_NOT_FOUND",
            DomainError::UserNotFound(_) => "USER_NOT_FOUND",
            DomainError::Validation { .. } => "VALIDATION_ERROR",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

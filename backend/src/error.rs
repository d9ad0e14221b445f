//! Error handling for the PDI Control Center
//!
//! Provides consistent JSON error responses. Domain rejections from `shared` map onto
//! HTTP statuses here.

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

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Rejected by a domain rule
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Validation errors
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Unique-violation on `vehicles.chassis_no` means the chassis is already on file
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() && db_err.constraint() == Some("vehicles_chassis_no_key") {
                // detail reads: Key (chassis_no)=(ME4JF50AAB1234567) already exists.
                let chassis = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .and_then(|detail| detail.split_once(")=(").map(|(_, rest)| rest))
                    .and_then(|rest| rest.split_once(')').map(|(value, _)| value.to_string()))
                    .unwrap_or_default();
                return AppError::Domain(DomainError::DuplicateChassis(chassis));
            }
        }
        AppError::DatabaseError(err)
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
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::InvalidStateTransition { .. }
        | DomainError::VehicleAlreadyInTransfer { .. }
        | DomainError::TransferNotPending { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::DuplicateChassis(_) => StatusCode::CONFLICT,
        DomainError::BranchNotFound(_)
        | DomainError::VehicleNotFound(_)
        | DomainError::TransferNotFound(_)
        | DomainError::SaleNotFound(_)
        | DomainError::UserNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::UnauthorizedScope(_)
        | DomainError::MissingCapability(_)
        | DomainError::NotAssignedMechanic => StatusCode::FORBIDDEN,
        DomainError::Validation { .. } | DomainError::BranchCycle(_) => StatusCode::BAD_REQUEST,
    }
}

fn first_invalid_field(errors: &validator::ValidationErrors) -> Option<String> {
    errors.field_errors().keys().next().map(|field| field.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_CREDENTIALS", "Invalid username or password"),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::Domain(err) => {
                let field = match err {
                    DomainError::Validation { field, .. } => Some(field.clone()),
                    _ => None,
                };
                (
                    domain_status(err),
                    ErrorDetail {
                        code: err.code().to_string(),
                        message: err.to_string(),
                        field,
                    },
                )
            }
            AppError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: errors.to_string(),
                    field: first_invalid_field(errors),
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

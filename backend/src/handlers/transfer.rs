//! Transfer (load) handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::Ctx;
use crate::models::{Transfer, TransferReceipt, TransferRequest};
use crate::services::transfer::{PartialReceipt, TransferListQuery, TransferService};
use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct CreateTransferRequest {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub chassis_numbers: Vec<String>,
}

#[derive(Deserialize, Validate)]
pub struct PartialReceiptRequest {
    #[validate(length(min = 1))]
    pub chassis_numbers: Vec<String>,
}

fn service(state: &AppState) -> TransferService {
    TransferService::new(state.db.clone(), state.config.business.clone())
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<TransferListQuery>,
) -> AppResult<Json<Vec<Transfer>>> {
    Ok(Json(service(&state).list(&ctx, query).await?))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateTransferRequest>,
) -> AppResult<(StatusCode, Json<Transfer>)> {
    body.validate()?;
    let request = TransferRequest {
        source_branch_id: body.source_branch_id,
        destination_branch_id: body.destination_branch_id,
        chassis_numbers: body.chassis_numbers,
    };
    let transfer = service(&state).create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Fetch by id or by load reference
pub async fn get_transfer(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(key): Path<String>,
) -> AppResult<Json<Transfer>> {
    Ok(Json(service(&state).get(&ctx, &key).await?))
}

pub async fn receive_transfer(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferReceipt>> {
    Ok(Json(service(&state).receive(&ctx, transfer_id).await?))
}

pub async fn receive_partial(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(transfer_id): Path<Uuid>,
    Json(body): Json<PartialReceiptRequest>,
) -> AppResult<Json<TransferReceipt>> {
    body.validate()?;
    let receipt = PartialReceipt {
        chassis_numbers: body.chassis_numbers,
    };
    Ok(Json(service(&state).receive_partial(&ctx, transfer_id, receipt).await?))
}

pub async fn cancel_transfer(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Transfer>> {
    Ok(Json(service(&state).cancel(&ctx, transfer_id).await?))
}

//! Sales and PDI workflow handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::Ctx;
use crate::models::{MechanicQueue, NewSale, PdiBoard, PdiCompletion, SalesRecord, User};
use crate::services::sales::{AssignMechanic, SalesService};
use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct CreateSaleRequest {
    #[validate(length(min = 3, max = 25))]
    pub chassis_no: String,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    #[validate(length(max = 40))]
    pub dc_number: Option<String>,
}

#[derive(Deserialize, Validate, Default)]
pub struct CompletePdiRequest {
    #[validate(length(max = 40))]
    pub engine_no: Option<String>,
    #[validate(length(max = 40))]
    pub dc_number: Option<String>,
}

fn service(state: &AppState) -> SalesService {
    SalesService::new(state.db.clone(), state.config.business.clone())
}

pub async fn record_sale(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateSaleRequest>,
) -> AppResult<(StatusCode, Json<SalesRecord>)> {
    body.validate()?;
    let sale = NewSale {
        chassis_no: body.chassis_no,
        customer_name: body.customer_name,
        customer_phone: body.customer_phone,
        dc_number: body.dc_number,
    };
    let record = service(&state).record_sale(&ctx, sale).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SalesRecord>> {
    Ok(Json(service(&state).get(&ctx, sale_id).await?))
}

/// Manager task board
pub async fn get_board(State(state): State<AppState>, Ctx(ctx): Ctx) -> AppResult<Json<PdiBoard>> {
    Ok(Json(service(&state).board(&ctx).await?))
}

/// The calling mechanic's queue
pub async fn my_tasks(State(state): State<AppState>, Ctx(ctx): Ctx) -> AppResult<Json<MechanicQueue>> {
    Ok(Json(service(&state).my_tasks(&ctx).await?))
}

pub async fn list_mechanics(State(state): State<AppState>, Ctx(ctx): Ctx) -> AppResult<Json<Vec<User>>> {
    Ok(Json(service(&state).mechanics(&ctx).await?))
}

pub async fn assign(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(vehicle_id): Path<Uuid>,
    Json(body): Json<AssignMechanic>,
) -> AppResult<Json<SalesRecord>> {
    Ok(Json(service(&state).assign(&ctx, vehicle_id, body.mechanic_id).await?))
}

pub async fn reassign(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(vehicle_id): Path<Uuid>,
    Json(body): Json<AssignMechanic>,
) -> AppResult<Json<SalesRecord>> {
    Ok(Json(service(&state).reassign(&ctx, vehicle_id, body.mechanic_id).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(vehicle_id): Path<Uuid>,
    body: Option<Json<CompletePdiRequest>>,
) -> AppResult<Json<SalesRecord>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()?;
    let completion = PdiCompletion {
        engine_no: body.engine_no,
        dc_number: body.dc_number,
    };
    Ok(Json(service(&state).complete(&ctx, vehicle_id, completion).await?))
}

pub async fn deliver(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<SalesRecord>> {
    Ok(Json(service(&state).deliver(&ctx, vehicle_id).await?))
}

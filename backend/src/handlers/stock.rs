//! Stock, search and OEM inward handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::Ctx;
use crate::models::{
    InwardReceipt, MasterData, NewVehicle, SearchResults, StockFilter, StockOverview, StockView,
    Vehicle,
};
use crate::services::stock::{StockQuery, StockService};
use crate::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Deserialize)]
pub struct OverviewQuery {
    pub branch_id: Option<Uuid>,
}

/// OEM shipment manifest
#[derive(Deserialize, Validate)]
pub struct InwardRequest {
    pub branch_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub load_reference: String,
    #[validate(length(min = 1, max = 500))]
    pub vehicles: Vec<NewVehicle>,
}

fn service(state: &AppState) -> StockService {
    StockService::new(state.db.clone(), state.config.business.clone())
}

/// Stock grouped model -> variant -> color
pub async fn get_stock(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<StockQuery>,
) -> AppResult<Json<StockView>> {
    Ok(Json(service(&state).stock(&ctx, query).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    Ok(Json(service(&state).search(&ctx, &query.q).await?))
}

pub async fn locate(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<Vehicle>>> {
    Ok(Json(service(&state).locate(&ctx, filter).await?))
}

pub async fn get_master_data(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> AppResult<Json<MasterData>> {
    Ok(Json(service(&state).master_data(&ctx).await?))
}

pub async fn get_overview(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(query): Query<OverviewQuery>,
) -> AppResult<Json<StockOverview>> {
    Ok(Json(service(&state).overview(&ctx, query.branch_id).await?))
}

pub async fn receive_inward(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<InwardRequest>,
) -> AppResult<(StatusCode, Json<Vec<Vehicle>>)> {
    body.validate()?;
    let receipt = InwardReceipt {
        branch_id: body.branch_id,
        load_reference: body.load_reference,
        vehicles: body.vehicles,
    };
    let vehicles = service(&state).receive_inward(&ctx, receipt).await?;
    Ok((StatusCode::CREATED, Json(vehicles)))
}

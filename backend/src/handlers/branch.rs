//! Branch hierarchy handlers

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
use crate::models::Branch;
use crate::services::branch::{BranchService, CreateBranchInput, ScopeView};
use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 2, max = 10))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct MoveBranchRequest {
    /// `null` makes the branch a head branch
    pub parent_id: Option<Uuid>,
}

pub async fn list_branches(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> AppResult<Json<Vec<Branch>>> {
    let service = BranchService::new(state.db.clone());
    Ok(Json(service.list(&ctx).await?))
}

/// The caller's home branch, its neighbours and everything in scope
pub async fn get_scope(State(state): State<AppState>, Ctx(ctx): Ctx) -> AppResult<Json<ScopeView>> {
    let service = BranchService::new(state.db.clone());
    Ok(Json(service.scope(&ctx).await?))
}

pub async fn create_branch(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<CreateBranchRequest>,
) -> AppResult<(StatusCode, Json<Branch>)> {
    body.validate()?;
    let service = BranchService::new(state.db.clone());
    let branch = service
        .create(
            &ctx,
            CreateBranchInput {
                code: body.code,
                name: body.name,
                parent_id: body.parent_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn move_branch(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(branch_id): Path<Uuid>,
    Json(body): Json<MoveBranchRequest>,
) -> AppResult<Json<Branch>> {
    let service = BranchService::new(state.db.clone());
    Ok(Json(service.move_branch(&ctx, branch_id, body.parent_id).await?))
}

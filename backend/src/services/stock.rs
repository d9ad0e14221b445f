//! Stock service: scoped stock views, search, locator and OEM inward receipts

use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::BusinessConfig;
use crate::error::AppResult;
use crate::models::{
    self as domain, Capability, InwardReceipt, MasterData, RequestContext, SearchResults,
    StockFilter, StockOverview, StockView, Vehicle,
};
use crate::services::store;

/// Stock service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    business: BusinessConfig,
}

/// Stock query parameters; `branch_id` narrows the caller's scope to one branch
#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub branch_id: Option<Uuid>,
    #[serde(flatten)]
    pub filter: StockFilter,
}

impl StockService {
    pub fn new(db: PgPool, business: BusinessConfig) -> Self {
        Self { db, business }
    }

    /// In-stock counts grouped model -> variant -> color
    pub async fn stock(&self, ctx: &RequestContext, query: StockQuery) -> AppResult<StockView> {
        ctx.require(Capability::ViewStock)?;
        let scope = ctx.narrowed_to(query.branch_id)?;

        let mut conn = self.db.acquire().await?;
        let vehicles = store::vehicles_in_scope(&mut conn, &scope).await?;
        let sales = if query.filter.customer_name.is_some() {
            store::sales_in_scope(&mut conn, &scope).await?
        } else {
            Vec::new()
        };

        Ok(domain::aggregate_stock(&scope, &query.filter, &vehicles, &sales))
    }

    pub async fn search(&self, ctx: &RequestContext, query: &str) -> AppResult<SearchResults> {
        ctx.require(Capability::ViewStock)?;
        let mut conn = self.db.acquire().await?;
        let vehicles = store::vehicles_in_scope(&mut conn, &ctx.scope).await?;
        let sales = store::sales_in_scope(&mut conn, &ctx.scope).await?;

        Ok(domain::universal_search(
            &ctx.scope,
            query,
            &vehicles,
            &sales,
            self.business.search_limit,
        )?)
    }

    pub async fn locate(&self, ctx: &RequestContext, filter: StockFilter) -> AppResult<Vec<Vehicle>> {
        ctx.require(Capability::ViewStock)?;
        let mut conn = self.db.acquire().await?;
        let vehicles = store::vehicles_in_scope(&mut conn, &ctx.scope).await?;
        let sales = store::sales_in_scope(&mut conn, &ctx.scope).await?;

        Ok(domain::locate_vehicles(&ctx.scope, &filter, &vehicles, &sales)?)
    }

    pub async fn master_data(&self, ctx: &RequestContext) -> AppResult<MasterData> {
        ctx.require(Capability::ViewStock)?;
        let mut conn = self.db.acquire().await?;
        let vehicles = store::vehicles_in_scope(&mut conn, &ctx.scope).await?;
        Ok(domain::master_data(&ctx.scope, &vehicles))
    }

    pub async fn overview(&self, ctx: &RequestContext, branch_id: Option<Uuid>) -> AppResult<StockOverview> {
        ctx.require(Capability::ViewStock)?;
        let scope = ctx.narrowed_to(branch_id)?;
        let mut conn = self.db.acquire().await?;
        let vehicles = store::vehicles_in_scope(&mut conn, &scope).await?;
        let sales = store::sales_in_scope(&mut conn, &scope).await?;
        Ok(domain::stock_overview(&scope, &vehicles, &sales))
    }

    /// Register an OEM shipment in one transaction
    pub async fn receive_inward(
        &self,
        ctx: &RequestContext,
        receipt: InwardReceipt,
    ) -> AppResult<Vec<Vehicle>> {
        let clock = self.business.clock()?;
        let now = Utc::now();

        let chassis: Vec<String> = receipt
            .vehicles
            .iter()
            .map(|v| shared::normalize_chassis(&v.chassis_no))
            .collect::<Result<_, _>>()?;

        let mut tx = self.db.begin().await?;
        let known: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT chassis_no FROM vehicles WHERE chassis_no = ANY($1)")
                .bind(&chassis)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let load_reference = receipt.load_reference.clone();
        let branch_id = receipt.branch_id;
        let (vehicles, movements) =
            match domain::receive_inward(ctx, receipt, &known, clock.business_date(now), now) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(%branch_id, %load_reference, error = %err, "Inward receipt rejected");
                    return Err(err.into());
                }
            };

        for vehicle in &vehicles {
            store::insert_vehicle(&mut tx, vehicle).await?;
        }
        store::insert_movements(&mut tx, &movements).await?;
        tx.commit().await?;

        tracing::info!(
            %branch_id,
            %load_reference,
            vehicles = vehicles.len(),
            user_id = %ctx.user_id,
            "OEM inward received"
        );
        Ok(vehicles)
    }
}

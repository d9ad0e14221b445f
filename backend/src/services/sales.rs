//! Sales and PDI service
//!
//! Every workflow step locks the vehicle first and then its sales record, matching the
//! order used by transfers, so a sale and a transfer touching the same chassis serialize.

use chrono::Utc;
use serde::Deserialize;
use shared::DomainError;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::BusinessConfig;
use crate::error::AppResult;
use crate::models::{
    collect_domain, record_sale, Capability, MechanicQueue, NewSale, PdiBoard, PdiCompletion,
    RequestContext, SalesRecord, SalesRow, User, UserRole, UserRow, Vehicle,
};
use crate::services::store;

/// Body for assigning or reassigning a mechanic
#[derive(Debug, Deserialize)]
pub struct AssignMechanic {
    pub mechanic_id: Uuid,
}

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
    business: BusinessConfig,
}

impl SalesService {
    pub fn new(db: PgPool, business: BusinessConfig) -> Self {
        Self { db, business }
    }

    /// Sell an in-stock vehicle
    pub async fn record_sale(&self, ctx: &RequestContext, sale: NewSale) -> AppResult<SalesRecord> {
        ctx.require(Capability::RecordSales)?;
        let clock = self.business.clock()?;
        let now = Utc::now();
        let chassis_no = shared::normalize_chassis(&sale.chassis_no)?;

        let mut tx = self.db.begin().await?;
        let mut vehicle = store::lock_vehicles_by_chassis(&mut tx, std::slice::from_ref(&chassis_no))
            .await?
            .pop()
            .ok_or_else(|| DomainError::VehicleNotFound(chassis_no.clone()))?;

        let (record, movement) = match record_sale(ctx, &mut vehicle, sale, clock.business_date(now), now) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(%chassis_no, error = %err, "Sale rejected");
                return Err(err.into());
            }
        };

        store::insert_sale(&mut tx, &record).await?;
        store::update_vehicle(&mut tx, &vehicle).await?;
        store::insert_movements(&mut tx, std::slice::from_ref(&movement)).await?;
        tx.commit().await?;

        tracing::info!(sale_id = %record.id, %chassis_no, branch_id = %record.branch_id, "Sale recorded");
        Ok(record)
    }

    pub async fn get(&self, ctx: &RequestContext, sale_id: Uuid) -> AppResult<SalesRecord> {
        ctx.require(Capability::ViewStock)?;
        let sql = format!("SELECT {} FROM sales_records WHERE id = $1", store::SALES_COLUMNS);
        let record = sqlx::query_as::<_, SalesRow>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DomainError::SaleNotFound(sale_id.to_string()))?
            .into_domain()?;
        ctx.ensure_in_scope(record.branch_id)?;
        Ok(record)
    }

    /// Pending and in-progress PDIs across the caller's scope
    pub async fn board(&self, ctx: &RequestContext) -> AppResult<PdiBoard> {
        ctx.require(Capability::AssignPdi)?;
        let mut conn = self.db.acquire().await?;
        let records = store::sales_in_scope(&mut conn, &ctx.scope).await?;
        Ok(PdiBoard::build(ctx, records))
    }

    /// The calling mechanic's queue
    pub async fn my_tasks(&self, ctx: &RequestContext) -> AppResult<MechanicQueue> {
        ctx.require(Capability::CompletePdi)?;
        let now = Utc::now();
        let window = self.business.completed_window();
        let sql = format!(
            "SELECT {} FROM sales_records WHERE assigned_mechanic_id = $1 ORDER BY assigned_at",
            store::SALES_COLUMNS
        );
        let rows = sqlx::query_as::<_, SalesRow>(&sql)
            .bind(ctx.user_id)
            .fetch_all(&self.db)
            .await?;
        let records = collect_domain(rows, SalesRow::into_domain)?;
        Ok(MechanicQueue::build(ctx.user_id, records, now, window))
    }

    /// Active mechanics a manager may assign within the caller's scope
    pub async fn mechanics(&self, ctx: &RequestContext) -> AppResult<Vec<User>> {
        ctx.require(Capability::AssignPdi)?;
        let sql = format!(
            "SELECT {} FROM users WHERE role = $1 AND is_active AND branch_id = ANY($2) ORDER BY username",
            store::USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(UserRole::Mechanic.as_str())
            .bind(ctx.scope.ids())
            .fetch_all(&self.db)
            .await?;
        collect_domain(rows, UserRow::into_domain)
    }

    pub async fn assign(&self, ctx: &RequestContext, vehicle_id: Uuid, mechanic_id: Uuid) -> AppResult<SalesRecord> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let (mut vehicle, mut record) = lock_sold_vehicle(&mut tx, vehicle_id).await?;
        let mechanic = store::load_user(&mut tx, mechanic_id).await?;

        record.assign_mechanic(ctx, &mut vehicle, &mechanic, now)?;

        store::update_vehicle(&mut tx, &vehicle).await?;
        store::update_sale(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(sale_id = %record.id, chassis_no = %record.chassis_no, %mechanic_id, "PDI assigned");
        Ok(record)
    }

    pub async fn reassign(&self, ctx: &RequestContext, vehicle_id: Uuid, mechanic_id: Uuid) -> AppResult<SalesRecord> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let (vehicle, mut record) = lock_sold_vehicle(&mut tx, vehicle_id).await?;
        let mechanic = store::load_user(&mut tx, mechanic_id).await?;
        let previous = record.assigned_mechanic_id;

        record.reassign_mechanic(ctx, &vehicle, &mechanic, now)?;

        store::update_sale(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(sale_id = %record.id, ?previous, %mechanic_id, "PDI reassigned");
        Ok(record)
    }

    /// Mechanic sign-off
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        vehicle_id: Uuid,
        completion: PdiCompletion,
    ) -> AppResult<SalesRecord> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let (mut vehicle, mut record) = lock_sold_vehicle(&mut tx, vehicle_id).await?;

        if let Err(err) = record.complete_pdi(ctx, &mut vehicle, completion, now) {
            tracing::warn!(sale_id = %record.id, user_id = %ctx.user_id, error = %err, "PDI completion rejected");
            return Err(err.into());
        }

        store::update_vehicle(&mut tx, &vehicle).await?;
        store::update_sale(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(sale_id = %record.id, chassis_no = %record.chassis_no, "PDI completed");
        Ok(record)
    }

    pub async fn deliver(&self, ctx: &RequestContext, vehicle_id: Uuid) -> AppResult<SalesRecord> {
        let clock = self.business.clock()?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let (mut vehicle, mut record) = lock_sold_vehicle(&mut tx, vehicle_id).await?;

        let movement = record.confirm_delivery(ctx, &mut vehicle, clock.business_date(now), now)?;

        store::update_vehicle(&mut tx, &vehicle).await?;
        store::update_sale(&mut tx, &record).await?;
        store::insert_movements(&mut tx, std::slice::from_ref(&movement)).await?;
        tx.commit().await?;

        tracing::info!(sale_id = %record.id, chassis_no = %record.chassis_no, "Vehicle delivered");
        Ok(record)
    }
}

/// Lock a vehicle and then the sales record it points at
async fn lock_sold_vehicle(conn: &mut PgConnection, vehicle_id: Uuid) -> AppResult<(Vehicle, SalesRecord)> {
    let vehicle = store::lock_vehicles(conn, &[vehicle_id])
        .await?
        .pop()
        .ok_or_else(|| DomainError::VehicleNotFound(vehicle_id.to_string()))?;
    let sale_id = vehicle
        .sale_id
        .ok_or_else(|| DomainError::SaleNotFound(vehicle.chassis_no.clone()))?;
    let record = store::lock_sale(conn, sale_id).await?;
    Ok((vehicle, record))
}

//! Transfer service: dispatch, receipt and cancellation of inter-branch loads
//!
//! Each operation runs in one transaction. The transfer row is locked before its vehicles,
//! and vehicles are always locked in id order.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;
use shared::DomainError;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::BusinessConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    generate_load_reference, Capability, RequestContext, Transfer, TransferLineRow, TransferRequest,
    TransferReceipt, TransferRow, TransferStatus,
};
use crate::services::store;

const TRANSFER_COLUMNS: &str = "id, reference, source_branch_id, destination_branch_id, status, \
     created_by, created_at, received_at, cancelled_at";

/// Which side of a load the caller is looking from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferListQuery {
    pub status: Option<TransferStatus>,
    pub direction: Option<TransferDirection>,
}

/// Chassis numbers taken off a load in a partial receipt
#[derive(Debug, Deserialize)]
pub struct PartialReceipt {
    pub chassis_numbers: Vec<String>,
}

/// Transfer service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
    business: BusinessConfig,
}

impl TransferService {
    pub fn new(db: PgPool, business: BusinessConfig) -> Self {
        Self { db, business }
    }

    /// Create a pending load; its vehicles go in transit at the source
    pub async fn create(&self, ctx: &RequestContext, request: TransferRequest) -> AppResult<Transfer> {
        // Refuse before any chassis lookup; dispatch checks again under the lock
        ctx.authorize(Capability::ManageTransfers, request.source_branch_id)?;
        let clock = self.business.clock()?;
        let now = Utc::now();
        let business_date = clock.business_date(now);

        let mut chassis_numbers = Vec::with_capacity(request.chassis_numbers.len());
        let mut seen = HashSet::new();
        for raw in &request.chassis_numbers {
            let chassis_no = shared::normalize_chassis(raw)?;
            if !seen.insert(chassis_no.clone()) {
                return Err(DomainError::validation(
                    "chassis_numbers",
                    format!("{} listed twice", chassis_no),
                )
                .into());
            }
            chassis_numbers.push(chassis_no);
        }

        let mut tx = self.db.begin().await?;
        let tree = store::load_tree(&mut tx).await?;
        let source = tree.get(request.source_branch_id)?;
        tree.get(request.destination_branch_id)?;

        let mut vehicles = store::lock_vehicles_by_chassis(&mut tx, &chassis_numbers).await?;
        if let Some(missing) = chassis_numbers
            .iter()
            .find(|c| !vehicles.iter().any(|v| &v.chassis_no == *c))
        {
            return Err(DomainError::VehicleNotFound(missing.clone()).into());
        }
        // Keep lines in the order the caller listed them
        vehicles.sort_by_key(|v| chassis_numbers.iter().position(|c| *c == v.chassis_no));

        let sequence = next_load_sequence(&mut tx, source.id, business_date).await?;
        let reference = generate_load_reference(&source.code, business_date, sequence);

        let (transfer, movements) = match Transfer::dispatch(
            ctx,
            reference,
            request.source_branch_id,
            request.destination_branch_id,
            &mut vehicles,
            business_date,
            now,
        ) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    source = %request.source_branch_id,
                    destination = %request.destination_branch_id,
                    error = %err,
                    "Transfer rejected"
                );
                return Err(err.into());
            }
        };

        insert_transfer(&mut tx, &transfer).await?;
        for vehicle in &vehicles {
            store::update_vehicle(&mut tx, vehicle).await?;
        }
        store::insert_movements(&mut tx, &movements).await?;
        tx.commit().await?;

        tracing::info!(
            reference = %transfer.reference,
            source = %transfer.source_branch_id,
            destination = %transfer.destination_branch_id,
            vehicles = transfer.lines.len(),
            "Transfer dispatched"
        );
        Ok(transfer)
    }

    /// Look a load up by id or load reference
    pub async fn get(&self, ctx: &RequestContext, key: &str) -> AppResult<Transfer> {
        ctx.require(Capability::ViewStock)?;
        let mut conn = self.db.acquire().await?;
        let transfer = find_transfer(&mut conn, key, false).await?;
        ensure_party(ctx, &transfer)?;
        Ok(transfer)
    }

    /// Loads touching the caller's scope, newest first
    pub async fn list(&self, ctx: &RequestContext, query: TransferListQuery) -> AppResult<Vec<Transfer>> {
        ctx.require(Capability::ViewStock)?;
        let ids = ctx.scope.ids();
        let (source_ids, destination_ids) = match query.direction {
            Some(TransferDirection::Inbound) => (Vec::new(), ids),
            Some(TransferDirection::Outbound) => (ids, Vec::new()),
            None => (ids.clone(), ids),
        };

        let sql = format!(
            r#"
            SELECT {} FROM transfers
            WHERE (source_branch_id = ANY($1) OR destination_branch_id = ANY($2))
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            "#,
            TRANSFER_COLUMNS
        );
        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(&source_ids)
            .bind(&destination_ids)
            .bind(query.status.map(|s| s.as_str()))
            .fetch_all(&mut *conn)
            .await?;

        let transfer_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = load_lines(&mut conn, &transfer_ids).await?;
        rows.into_iter()
            .map(|row| {
                let own = lines.remove(&row.id).unwrap_or_default();
                row.into_domain(own)
            })
            .collect()
    }

    /// Receive everything still outstanding on a load
    pub async fn receive(&self, ctx: &RequestContext, transfer_id: Uuid) -> AppResult<TransferReceipt> {
        self.apply_receipt(ctx, transfer_id, None).await
    }

    /// Receive only the named vehicles; the rest stay in transit
    pub async fn receive_partial(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
        receipt: PartialReceipt,
    ) -> AppResult<TransferReceipt> {
        self.apply_receipt(ctx, transfer_id, Some(receipt.chassis_numbers)).await
    }

    async fn apply_receipt(
        &self,
        ctx: &RequestContext,
        transfer_id: Uuid,
        chassis_numbers: Option<Vec<String>>,
    ) -> AppResult<TransferReceipt> {
        let clock = self.business.clock()?;
        let now = Utc::now();
        let business_date = clock.business_date(now);

        let mut tx = self.db.begin().await?;
        let mut transfer = find_transfer(&mut tx, &transfer_id.to_string(), true).await?;

        let mut vehicles = store::lock_vehicles(&mut tx, &transfer.vehicle_ids()).await?;
        let before: Vec<Option<chrono::DateTime<Utc>>> =
            transfer.lines.iter().map(|l| l.received_at).collect();
        let movements = match &chassis_numbers {
            None => transfer.receive(ctx, &mut vehicles, business_date, now),
            Some(chassis) => transfer.receive_partial(ctx, chassis, &mut vehicles, business_date, now),
        }?;

        let received: HashSet<Uuid> = movements.iter().map(|m| m.vehicle_id).collect();
        for vehicle in vehicles.iter().filter(|v| received.contains(&v.id)) {
            store::update_vehicle(&mut tx, vehicle).await?;
        }
        for (line, was) in transfer.lines.iter().zip(before) {
            if line.received_at != was {
                sqlx::query(
                    "UPDATE transfer_lines SET received_at = $3 WHERE transfer_id = $1 AND vehicle_id = $2",
                )
                .bind(transfer.id)
                .bind(line.vehicle_id)
                .bind(line.received_at)
                .execute(&mut *tx)
                .await?;
            }
        }
        update_transfer_status(&mut tx, &transfer).await?;
        store::insert_movements(&mut tx, &movements).await?;
        tx.commit().await?;

        tracing::info!(
            reference = %transfer.reference,
            received = movements.len(),
            status = %transfer.status,
            user_id = %ctx.user_id,
            "Transfer received"
        );
        Ok(transfer.into_receipt(&movements, vehicles))
    }

    /// Cancel a pending load; its vehicles return to the source's stock
    pub async fn cancel(&self, ctx: &RequestContext, transfer_id: Uuid) -> AppResult<Transfer> {
        let clock = self.business.clock()?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let mut transfer = find_transfer(&mut tx, &transfer_id.to_string(), true).await?;

        let mut vehicles = store::lock_vehicles(&mut tx, &transfer.vehicle_ids()).await?;
        let movements = transfer.cancel(ctx, &mut vehicles, clock.business_date(now), now)?;

        for vehicle in &vehicles {
            store::update_vehicle(&mut tx, vehicle).await?;
        }
        update_transfer_status(&mut tx, &transfer).await?;
        store::insert_movements(&mut tx, &movements).await?;
        tx.commit().await?;

        tracing::info!(reference = %transfer.reference, user_id = %ctx.user_id, "Transfer cancelled");
        Ok(transfer)
    }
}

fn ensure_party(ctx: &RequestContext, transfer: &Transfer) -> AppResult<()> {
    if ctx.scope.contains(transfer.source_branch_id) || ctx.scope.contains(transfer.destination_branch_id) {
        Ok(())
    } else {
        Err(DomainError::UnauthorizedScope(transfer.destination_branch_id).into())
    }
}

/// Per-branch, per-day counter behind load references
async fn next_load_sequence(
    conn: &mut PgConnection,
    branch_id: Uuid,
    business_date: chrono::NaiveDate,
) -> AppResult<i64> {
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO load_sequences (branch_id, business_date, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (branch_id, business_date)
        DO UPDATE SET last_value = load_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(branch_id)
    .bind(business_date)
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

async fn find_transfer(conn: &mut PgConnection, key: &str, lock: bool) -> AppResult<Transfer> {
    let lock_clause = if lock { " FOR UPDATE" } else { "" };
    let row = match Uuid::parse_str(key) {
        Ok(id) => {
            let sql = format!("SELECT {} FROM transfers WHERE id = $1{}", TRANSFER_COLUMNS, lock_clause);
            sqlx::query_as::<_, TransferRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        Err(_) => {
            let sql = format!(
                "SELECT {} FROM transfers WHERE reference = $1{}",
                TRANSFER_COLUMNS, lock_clause
            );
            sqlx::query_as::<_, TransferRow>(&sql)
                .bind(key.trim().to_uppercase())
                .fetch_optional(&mut *conn)
                .await?
        }
    }
    .ok_or_else(|| AppError::Domain(DomainError::TransferNotFound(key.to_string())))?;

    let mut lines = load_lines(conn, &[row.id]).await?;
    let own = lines.remove(&row.id).unwrap_or_default();
    row.into_domain(own)
}

async fn load_lines(
    conn: &mut PgConnection,
    transfer_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<TransferLineRow>>> {
    let rows = sqlx::query_as::<_, TransferLineRow>(
        r#"
        SELECT transfer_id, vehicle_id, chassis_no, model, variant, color, received_at
        FROM transfer_lines
        WHERE transfer_id = ANY($1)
        ORDER BY transfer_id, line_no
        "#,
    )
    .bind(transfer_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<TransferLineRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.transfer_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn insert_transfer(conn: &mut PgConnection, transfer: &Transfer) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transfers (id, reference, source_branch_id, destination_branch_id, status,
                               created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(transfer.id)
    .bind(&transfer.reference)
    .bind(transfer.source_branch_id)
    .bind(transfer.destination_branch_id)
    .bind(transfer.status.as_str())
    .bind(transfer.created_by)
    .bind(transfer.created_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, line) in transfer.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transfer_lines (transfer_id, line_no, vehicle_id, chassis_no, model,
                                        variant, color, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transfer.id)
        .bind(line_no as i32 + 1)
        .bind(line.vehicle_id)
        .bind(&line.chassis_no)
        .bind(&line.model)
        .bind(&line.variant)
        .bind(&line.color)
        .bind(line.received_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_transfer_status(conn: &mut PgConnection, transfer: &Transfer) -> AppResult<()> {
    sqlx::query(
        "UPDATE transfers SET status = $2, received_at = $3, cancelled_at = $4 WHERE id = $1",
    )
    .bind(transfer.id)
    .bind(transfer.status.as_str())
    .bind(transfer.received_at)
    .bind(transfer.cancelled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

//! Database row types and their conversion into domain models
//!
//! Status columns are stored as text; rows are parsed into the `shared` enums on load.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub use shared::models::*;

use crate::error::{AppError, AppResult};

fn parse_column<T: FromStr>(value: &str, column: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::Internal(format!("Unexpected value '{}' in column {}", value, column)))
}

#[derive(Debug, sqlx::FromRow)]
pub struct BranchRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            code: row.code,
            name: row.name,
            parent_id: row.parent_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub branch_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_domain(self) -> AppResult<User> {
        Ok(User {
            role: parse_column(&self.role, "users.role")?,
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            branch_id: self.branch_id,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct VehicleRow {
    pub id: Uuid,
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub branch_id: Uuid,
    pub status: String,
    pub dc_number: Option<String>,
    pub load_reference: Option<String>,
    pub sale_id: Option<Uuid>,
    pub date_received: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl VehicleRow {
    pub fn into_domain(self) -> AppResult<Vehicle> {
        Ok(Vehicle {
            status: parse_column(&self.status, "vehicles.status")?,
            id: self.id,
            chassis_no: self.chassis_no,
            engine_no: self.engine_no,
            model: self.model,
            variant: self.variant,
            color: self.color,
            branch_id: self.branch_id,
            dc_number: self.dc_number,
            load_reference: self.load_reference,
            sale_id: self.sale_id,
            date_received: self.date_received,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SalesRow {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub dc_number: Option<String>,
    pub branch_id: Uuid,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub pdi_status: String,
    pub assigned_mechanic_id: Option<Uuid>,
    pub sold_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SalesRow {
    pub fn into_domain(self) -> AppResult<SalesRecord> {
        Ok(SalesRecord {
            pdi_status: parse_column(&self.pdi_status, "sales_records.pdi_status")?,
            id: self.id,
            vehicle_id: self.vehicle_id,
            chassis_no: self.chassis_no,
            engine_no: self.engine_no,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            dc_number: self.dc_number,
            branch_id: self.branch_id,
            model: self.model,
            variant: self.variant,
            color: self.color,
            assigned_mechanic_id: self.assigned_mechanic_id,
            sold_at: self.sold_at,
            assigned_at: self.assigned_at,
            completed_at: self.completed_at,
            delivered_at: self.delivered_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TransferRow {
    pub id: Uuid,
    pub reference: String,
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TransferLineRow {
    pub transfer_id: Uuid,
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub received_at: Option<DateTime<Utc>>,
}

impl TransferRow {
    /// Attach lines (already ordered by line number) belonging to this transfer
    pub fn into_domain(self, lines: Vec<TransferLineRow>) -> AppResult<Transfer> {
        Ok(Transfer {
            status: parse_column(&self.status, "transfers.status")?,
            lines: lines
                .into_iter()
                .filter(|l| l.transfer_id == self.id)
                .map(|l| TransferLine {
                    vehicle_id: l.vehicle_id,
                    chassis_no: l.chassis_no,
                    model: l.model,
                    variant: l.variant,
                    color: l.color,
                    received_at: l.received_at,
                })
                .collect(),
            id: self.id,
            reference: self.reference,
            source_branch_id: self.source_branch_id,
            destination_branch_id: self.destination_branch_id,
            created_by: self.created_by,
            created_at: self.created_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub kind: String,
    pub branch_id: Uuid,
    pub counterpart_branch_id: Option<Uuid>,
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub reference: Option<String>,
    pub business_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

impl MovementRow {
    pub fn into_domain(self) -> AppResult<InventoryMovement> {
        Ok(InventoryMovement {
            kind: parse_column(&self.kind, "inventory_movements.kind")?,
            id: self.id,
            branch_id: self.branch_id,
            counterpart_branch_id: self.counterpart_branch_id,
            vehicle_id: self.vehicle_id,
            chassis_no: self.chassis_no,
            model: self.model,
            variant: self.variant,
            color: self.color,
            reference: self.reference,
            business_date: self.business_date,
            recorded_at: self.recorded_at,
        })
    }
}

/// Convert a batch of rows, failing on the first bad row
pub fn collect_domain<R, T>(rows: Vec<R>, convert: impl Fn(R) -> AppResult<T>) -> AppResult<Vec<T>> {
    rows.into_iter().map(convert).collect()
}

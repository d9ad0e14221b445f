//! Inventory movement ledger

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Vehicle;
use crate::error::DomainError;

/// An append-only record of one vehicle entering or leaving a branch's stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub kind: MovementKind,
    pub branch_id: Uuid,
    /// Destination for outward transfers, source for inward transfers
    pub counterpart_branch_id: Option<Uuid>,
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub model: String,
    pub variant: String,
    pub color: String,
    /// Load number or sale id the movement belongs to
    pub reference: Option<String>,
    pub business_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// Types of inventory movements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    InwardOem,
    InwardTransfer,
    OutwardTransfer,
    /// Cancelled transfer returning vehicles to the source branch
    TransferReversal,
    Sale,
    Delivery,
}

impl MovementKind {
    pub const ALL: [MovementKind; 6] = [
        MovementKind::InwardOem,
        MovementKind::InwardTransfer,
        MovementKind::OutwardTransfer,
        MovementKind::TransferReversal,
        MovementKind::Sale,
        MovementKind::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::InwardOem => "inward_oem",
            MovementKind::InwardTransfer => "inward_transfer",
            MovementKind::OutwardTransfer => "outward_transfer",
            MovementKind::TransferReversal => "transfer_reversal",
            MovementKind::Sale => "sale",
            MovementKind::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation("kind", format!("unknown movement kind '{}'", s)))
    }
}

impl InventoryMovement {
    pub fn record(
        kind: MovementKind,
        vehicle: &Vehicle,
        branch_id: Uuid,
        counterpart_branch_id: Option<Uuid>,
        reference: Option<String>,
        business_date: NaiveDate,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            branch_id,
            counterpart_branch_id,
            vehicle_id: vehicle.id,
            chassis_no: vehicle.chassis_no.clone(),
            model: vehicle.model.clone(),
            variant: vehicle.variant.clone(),
            color: vehicle.color.clone(),
            reference,
            business_date,
            recorded_at,
        }
    }

    pub fn model_variant(&self) -> String {
        format!("{}-{}", self.model, self.variant)
    }
}

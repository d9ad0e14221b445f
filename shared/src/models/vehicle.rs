//! Vehicle models and the per-vehicle status machine

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Capability, InventoryMovement, MovementKind, RequestContext};
use crate::error::{DomainError, DomainResult};
use crate::validation::{normalize_chassis, normalize_optional_code, require_text};

/// A physical vehicle owned by exactly one branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vehicle {
    pub id: Uuid,
    /// Unique, stored trimmed and uppercase
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub branch_id: Uuid,
    pub status: VehicleStatus,
    /// Delivery challan number, set at sale or PDI completion
    pub dc_number: Option<String>,
    /// Load number of the shipment that brought the vehicle in
    pub load_reference: Option<String>,
    pub sale_id: Option<Uuid>,
    pub date_received: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    InStock,
    InTransit,
    Sold,
    PdiAssigned,
    PdiComplete,
    Delivered,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 6] = [
        VehicleStatus::InStock,
        VehicleStatus::InTransit,
        VehicleStatus::Sold,
        VehicleStatus::PdiAssigned,
        VehicleStatus::PdiComplete,
        VehicleStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::InStock => "in_stock",
            VehicleStatus::InTransit => "in_transit",
            VehicleStatus::Sold => "sold",
            VehicleStatus::PdiAssigned => "pdi_assigned",
            VehicleStatus::PdiComplete => "pdi_complete",
            VehicleStatus::Delivered => "delivered",
        }
    }

    /// Legal edges of the vehicle lifecycle
    pub fn can_transition_to(&self, next: VehicleStatus) -> bool {
        use VehicleStatus::*;
        matches!(
            (self, next),
            (InStock, InTransit)
                | (InTransit, InStock)
                | (InStock, Sold)
                | (Sold, PdiAssigned)
                | (PdiAssigned, PdiComplete)
                | (PdiComplete, Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VehicleStatus::Delivered)
    }
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VehicleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation("status", format!("unknown vehicle status '{}'", s)))
    }
}

impl Vehicle {
    /// Check a status change without applying it
    pub fn check_transition(&self, next: VehicleStatus) -> DomainResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::transition(
                format!("vehicle {}", self.chassis_no),
                self.status,
                next,
            ))
        }
    }

    pub fn transition(&mut self, next: VehicleStatus, now: DateTime<Utc>) -> DomainResult<()> {
        self.check_transition(next)?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn model_variant(&self) -> String {
        format!("{}-{}", self.model, self.variant)
    }
}

/// One line of an OEM shipment manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub dc_number: Option<String>,
}

/// An OEM shipment arriving at a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InwardReceipt {
    pub branch_id: Uuid,
    pub load_reference: String,
    pub vehicles: Vec<NewVehicle>,
}

/// Register an OEM shipment: every vehicle enters stock at the receiving branch.
///
/// The batch is all-or-nothing. A chassis repeated inside the batch, or already present in
/// `known_chassis`, rejects the whole receipt.
pub fn receive_inward(
    ctx: &RequestContext,
    receipt: InwardReceipt,
    known_chassis: &HashSet<String>,
    received_on: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<(Vec<Vehicle>, Vec<InventoryMovement>)> {
    ctx.authorize(Capability::ReceiveInward, receipt.branch_id)?;
    let load_reference = require_text("load_reference", &receipt.load_reference)?;
    if receipt.vehicles.is_empty() {
        return Err(DomainError::validation("vehicles", "manifest has no vehicles"));
    }

    let mut seen = HashSet::with_capacity(receipt.vehicles.len());
    let mut vehicles = Vec::with_capacity(receipt.vehicles.len());
    for line in receipt.vehicles {
        let chassis_no = normalize_chassis(&line.chassis_no)?;
        if known_chassis.contains(&chassis_no) || !seen.insert(chassis_no.clone()) {
            return Err(DomainError::DuplicateChassis(chassis_no));
        }
        vehicles.push(Vehicle {
            id: Uuid::new_v4(),
            chassis_no,
            engine_no: normalize_optional_code("engine_no", line.engine_no.as_deref())?,
            model: require_text("model", &line.model)?,
            variant: require_text("variant", &line.variant)?,
            color: require_text("color", &line.color)?,
            branch_id: receipt.branch_id,
            status: VehicleStatus::InStock,
            dc_number: normalize_optional_code("dc_number", line.dc_number.as_deref())?,
            load_reference: Some(load_reference.clone()),
            sale_id: None,
            date_received: received_on,
            updated_at: now,
        });
    }

    let movements = vehicles
        .iter()
        .map(|v| {
            InventoryMovement::record(
                MovementKind::InwardOem,
                v,
                v.branch_id,
                None,
                Some(load_reference.clone()),
                received_on,
                now,
            )
        })
        .collect();

    Ok((vehicles, movements))
}

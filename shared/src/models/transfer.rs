//! Transfer (load) models
//!
//! A transfer moves a batch of vehicles from a source branch to a destination branch.
//! While pending, its vehicles are `in_transit` and still owned by the source, so they are
//! counted in neither branch's stock. Receipt hands them to the destination.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Capability, InventoryMovement, MovementKind, RequestContext, Vehicle, VehicleStatus};
use crate::error::{DomainError, DomainResult};
use crate::validation::normalize_chassis;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub id: Uuid,
    /// Load number (e.g. "TR-BLR01-20261019-0003")
    pub reference: String,
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub status: TransferStatus,
    pub lines: Vec<TransferLine>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// One vehicle on a load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferLine {
    pub vehicle_id: Uuid,
    pub chassis_no: String,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    PartiallyReceived,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::PartiallyReceived => "partially_received",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Lines may still be received
    pub fn is_open(&self) -> bool {
        matches!(self, TransferStatus::Pending | TransferStatus::PartiallyReceived)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "partially_received" => Ok(TransferStatus::PartiallyReceived),
            "received" => Ok(TransferStatus::Received),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown transfer status '{}'", other),
            )),
        }
    }
}

/// Outcome of a full or partial receipt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    /// Vehicles received by this call, now in stock at the destination
    pub vehicles: Vec<Vehicle>,
}

/// Input for creating a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub chassis_numbers: Vec<String>,
}

/// Generate a load reference
pub fn generate_load_reference(branch_code: &str, date: NaiveDate, sequence: i64) -> String {
    format!("TR-{}-{}-{:04}", branch_code, date.format("%Y%m%d"), sequence)
}

fn find_vehicle<'a>(vehicles: &'a [Vehicle], vehicle_id: Uuid) -> Option<&'a Vehicle> {
    vehicles.iter().find(|v| v.id == vehicle_id)
}

fn find_vehicle_mut<'a>(vehicles: &'a mut [Vehicle], vehicle_id: Uuid) -> Option<&'a mut Vehicle> {
    vehicles.iter_mut().find(|v| v.id == vehicle_id)
}

impl Transfer {
    /// Dispatch `vehicles` from source to destination.
    ///
    /// Every vehicle must be in stock at the source. A vehicle already on a pending load is
    /// rejected, which is what prevents double transfer. Nothing is mutated on error.
    /// The caller must manage transfers at the source.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        ctx: &RequestContext,
        reference: String,
        source_branch_id: Uuid,
        destination_branch_id: Uuid,
        vehicles: &mut [Vehicle],
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<(Transfer, Vec<InventoryMovement>)> {
        ctx.authorize(Capability::ManageTransfers, source_branch_id)?;
        if source_branch_id == destination_branch_id {
            return Err(DomainError::validation(
                "destination_branch_id",
                "source and destination must differ",
            ));
        }
        if vehicles.is_empty() {
            return Err(DomainError::validation("chassis_numbers", "transfer has no vehicles"));
        }

        let mut seen = HashSet::with_capacity(vehicles.len());
        for vehicle in vehicles.iter() {
            if !seen.insert(vehicle.id) {
                return Err(DomainError::validation(
                    "chassis_numbers",
                    format!("{} listed twice", vehicle.chassis_no),
                ));
            }
            if vehicle.status == VehicleStatus::InTransit {
                return Err(DomainError::VehicleAlreadyInTransfer {
                    chassis_no: vehicle.chassis_no.clone(),
                });
            }
            if vehicle.branch_id != source_branch_id {
                return Err(DomainError::validation(
                    "chassis_numbers",
                    format!("{} is not held by the source branch", vehicle.chassis_no),
                ));
            }
            vehicle.check_transition(VehicleStatus::InTransit)?;
        }

        let mut lines = Vec::with_capacity(vehicles.len());
        let mut movements = Vec::with_capacity(vehicles.len());
        for vehicle in vehicles.iter_mut() {
            vehicle.transition(VehicleStatus::InTransit, now)?;
            lines.push(TransferLine {
                vehicle_id: vehicle.id,
                chassis_no: vehicle.chassis_no.clone(),
                model: vehicle.model.clone(),
                variant: vehicle.variant.clone(),
                color: vehicle.color.clone(),
                received_at: None,
            });
            movements.push(InventoryMovement::record(
                MovementKind::OutwardTransfer,
                vehicle,
                source_branch_id,
                Some(destination_branch_id),
                Some(reference.clone()),
                business_date,
                now,
            ));
        }

        let transfer = Transfer {
            id: Uuid::new_v4(),
            reference,
            source_branch_id,
            destination_branch_id,
            status: TransferStatus::Pending,
            lines,
            created_by: ctx.user_id,
            created_at: now,
            received_at: None,
            cancelled_at: None,
        };
        Ok((transfer, movements))
    }

    pub fn vehicle_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.vehicle_id).collect()
    }

    pub fn outstanding_lines(&self) -> impl Iterator<Item = &TransferLine> {
        self.lines.iter().filter(|l| l.received_at.is_none())
    }

    pub fn received_count(&self) -> usize {
        self.lines.iter().filter(|l| l.received_at.is_some()).count()
    }

    /// Pair the load with the vehicles a receipt just handed to the destination
    pub fn into_receipt(self, movements: &[InventoryMovement], vehicles: Vec<Vehicle>) -> TransferReceipt {
        let received: HashSet<Uuid> = movements.iter().map(|m| m.vehicle_id).collect();
        TransferReceipt {
            transfer: self,
            vehicles: vehicles.into_iter().filter(|v| received.contains(&v.id)).collect(),
        }
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(DomainError::TransferNotPending {
                reference: self.reference.clone(),
                status: self.status,
            })
        }
    }

    /// Receive every outstanding line in one step; only the destination may receive
    pub fn receive(
        &mut self,
        ctx: &RequestContext,
        vehicles: &mut [Vehicle],
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InventoryMovement>> {
        ctx.authorize(Capability::ManageTransfers, self.destination_branch_id)?;
        self.ensure_open()?;
        let indices: Vec<usize> = (0..self.lines.len())
            .filter(|&i| self.lines[i].received_at.is_none())
            .collect();
        self.receive_lines(&indices, vehicles, business_date, now)
    }

    /// Receive an explicit subset of the load, identified by chassis number.
    ///
    /// Lines not named stay in transit. The transfer becomes `received` once no line is
    /// outstanding.
    pub fn receive_partial(
        &mut self,
        ctx: &RequestContext,
        chassis_numbers: &[String],
        vehicles: &mut [Vehicle],
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InventoryMovement>> {
        ctx.authorize(Capability::ManageTransfers, self.destination_branch_id)?;
        self.ensure_open()?;
        if chassis_numbers.is_empty() {
            return Err(DomainError::validation("chassis_numbers", "no vehicles selected"));
        }

        let mut indices = Vec::with_capacity(chassis_numbers.len());
        for raw in chassis_numbers {
            let chassis_no = normalize_chassis(raw)?;
            let index = self
                .lines
                .iter()
                .position(|l| l.chassis_no == chassis_no)
                .ok_or_else(|| DomainError::VehicleNotFound(chassis_no.clone()))?;
            if self.lines[index].received_at.is_some() {
                return Err(DomainError::transition(
                    format!("transfer line {}", chassis_no),
                    "received",
                    "received",
                ));
            }
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        self.receive_lines(&indices, vehicles, business_date, now)
    }

    fn receive_lines(
        &mut self,
        indices: &[usize],
        vehicles: &mut [Vehicle],
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InventoryMovement>> {
        for &i in indices {
            let line = &self.lines[i];
            let vehicle = find_vehicle(vehicles, line.vehicle_id)
                .ok_or_else(|| DomainError::VehicleNotFound(line.chassis_no.clone()))?;
            if vehicle.status != VehicleStatus::InTransit || vehicle.branch_id != self.source_branch_id {
                return Err(DomainError::transition(
                    format!("vehicle {}", vehicle.chassis_no),
                    vehicle.status,
                    VehicleStatus::InStock,
                ));
            }
        }

        let mut movements = Vec::with_capacity(indices.len());
        for &i in indices {
            let vehicle_id = self.lines[i].vehicle_id;
            let vehicle = find_vehicle_mut(vehicles, vehicle_id)
                .ok_or_else(|| DomainError::VehicleNotFound(self.lines[i].chassis_no.clone()))?;
            vehicle.transition(VehicleStatus::InStock, now)?;
            vehicle.branch_id = self.destination_branch_id;
            self.lines[i].received_at = Some(now);
            movements.push(InventoryMovement::record(
                MovementKind::InwardTransfer,
                vehicle,
                self.destination_branch_id,
                Some(self.source_branch_id),
                Some(self.reference.clone()),
                business_date,
                now,
            ));
        }

        if self.outstanding_lines().next().is_none() {
            self.status = TransferStatus::Received;
            self.received_at = Some(now);
        } else {
            self.status = TransferStatus::PartiallyReceived;
        }
        Ok(movements)
    }

    /// Cancel a load before anything was received; vehicles return to source stock
    pub fn cancel(
        &mut self,
        ctx: &RequestContext,
        vehicles: &mut [Vehicle],
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InventoryMovement>> {
        ctx.authorize(Capability::ManageTransfers, self.source_branch_id)?;
        if self.status != TransferStatus::Pending {
            return Err(DomainError::TransferNotPending {
                reference: self.reference.clone(),
                status: self.status,
            });
        }
        for line in &self.lines {
            let vehicle = find_vehicle(vehicles, line.vehicle_id)
                .ok_or_else(|| DomainError::VehicleNotFound(line.chassis_no.clone()))?;
            vehicle.check_transition(VehicleStatus::InStock)?;
        }

        let mut movements = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let vehicle = find_vehicle_mut(vehicles, line.vehicle_id)
                .ok_or_else(|| DomainError::VehicleNotFound(line.chassis_no.clone()))?;
            vehicle.transition(VehicleStatus::InStock, now)?;
            movements.push(InventoryMovement::record(
                MovementKind::TransferReversal,
                vehicle,
                self.source_branch_id,
                Some(self.destination_branch_id),
                Some(self.reference.clone()),
                business_date,
                now,
            ));
        }
        self.status = TransferStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(movements)
    }
}

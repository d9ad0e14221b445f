//! Sales records and the PDI workflow
//!
//! A sale binds one in-stock vehicle to a customer. From then on the vehicle status and the
//! record's PDI status move in lockstep:
//!
//! | PDI status    | Vehicle status |
//! |---------------|----------------|
//! | `pending`     | `sold`         |
//! | `in_progress` | `pdi_assigned` |
//! | `complete`    | `pdi_complete` |
//! | `delivered`   | `delivered`    |

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Capability, InventoryMovement, MovementKind, RequestContext, User, UserRole, Vehicle, VehicleStatus};
use crate::error::{DomainError, DomainResult};
use crate::validation::{normalize_optional_code, require_text, validate_phone};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesRecord {
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
    pub pdi_status: PdiStatus,
    pub assigned_mechanic_id: Option<Uuid>,
    pub sold_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PdiStatus {
    Pending,
    InProgress,
    Complete,
    Delivered,
}

impl PdiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdiStatus::Pending => "pending",
            PdiStatus::InProgress => "in_progress",
            PdiStatus::Complete => "complete",
            PdiStatus::Delivered => "delivered",
        }
    }

    /// Vehicle status that must accompany this PDI status
    pub fn vehicle_status(&self) -> VehicleStatus {
        match self {
            PdiStatus::Pending => VehicleStatus::Sold,
            PdiStatus::InProgress => VehicleStatus::PdiAssigned,
            PdiStatus::Complete => VehicleStatus::PdiComplete,
            PdiStatus::Delivered => VehicleStatus::Delivered,
        }
    }
}

impl std::fmt::Display for PdiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PdiStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PdiStatus::Pending),
            "in_progress" => Ok(PdiStatus::InProgress),
            "complete" => Ok(PdiStatus::Complete),
            "delivered" => Ok(PdiStatus::Delivered),
            other => Err(DomainError::validation(
                "pdi_status",
                format!("unknown PDI status '{}'", other),
            )),
        }
    }
}

/// Input for recording a sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub chassis_no: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub dc_number: Option<String>,
}

/// Details captured by the mechanic when signing off a PDI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdiCompletion {
    pub engine_no: Option<String>,
    pub dc_number: Option<String>,
}

/// Sell an in-stock vehicle; the record starts with PDI `pending`
pub fn record_sale(
    ctx: &RequestContext,
    vehicle: &mut Vehicle,
    sale: NewSale,
    business_date: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<(SalesRecord, InventoryMovement)> {
    ctx.authorize(Capability::RecordSales, vehicle.branch_id)?;
    vehicle.check_transition(VehicleStatus::Sold)?;
    let customer_name = require_text("customer_name", &sale.customer_name)?;
    let customer_phone = match sale.customer_phone.as_deref().map(str::trim) {
        Some(phone) if !phone.is_empty() => Some(validate_phone(phone)?),
        _ => None,
    };
    let dc_number = normalize_optional_code("dc_number", sale.dc_number.as_deref())?
        .or_else(|| vehicle.dc_number.clone());

    let record = SalesRecord {
        id: Uuid::new_v4(),
        vehicle_id: vehicle.id,
        chassis_no: vehicle.chassis_no.clone(),
        engine_no: vehicle.engine_no.clone(),
        customer_name,
        customer_phone,
        dc_number: dc_number.clone(),
        branch_id: vehicle.branch_id,
        model: vehicle.model.clone(),
        variant: vehicle.variant.clone(),
        color: vehicle.color.clone(),
        pdi_status: PdiStatus::Pending,
        assigned_mechanic_id: None,
        sold_at: now,
        assigned_at: None,
        completed_at: None,
        delivered_at: None,
        updated_at: now,
    };

    vehicle.transition(VehicleStatus::Sold, now)?;
    vehicle.sale_id = Some(record.id);
    vehicle.dc_number = dc_number;

    let movement = InventoryMovement::record(
        MovementKind::Sale,
        vehicle,
        vehicle.branch_id,
        None,
        Some(record.id.to_string()),
        business_date,
        now,
    );
    Ok((record, movement))
}

impl SalesRecord {
    /// The vehicle must be the one this record sold, in the matching status
    fn check_linked(&self, vehicle: &Vehicle) -> DomainResult<()> {
        if vehicle.id != self.vehicle_id || vehicle.sale_id != Some(self.id) {
            return Err(DomainError::validation(
                "vehicle_id",
                format!("vehicle {} is not linked to this sale", vehicle.chassis_no),
            ));
        }
        if vehicle.status != self.pdi_status.vehicle_status() {
            return Err(DomainError::transition(
                format!("vehicle {}", vehicle.chassis_no),
                vehicle.status,
                self.pdi_status.vehicle_status(),
            ));
        }
        Ok(())
    }

    fn check_status(&self, expected: PdiStatus, next: PdiStatus) -> DomainResult<()> {
        if self.pdi_status == expected {
            Ok(())
        } else {
            Err(DomainError::transition(
                format!("sale {}", self.chassis_no),
                self.pdi_status,
                next,
            ))
        }
    }

    fn check_mechanic(&self, ctx: &RequestContext, mechanic: &User) -> DomainResult<()> {
        if mechanic.role != UserRole::Mechanic || !mechanic.is_active {
            return Err(DomainError::validation(
                "mechanic_id",
                format!("{} is not an active mechanic", mechanic.username),
            ));
        }
        ctx.ensure_in_scope(mechanic.branch_id)
    }

    /// Hand the PDI to a mechanic: `sold -> pdi_assigned`
    pub fn assign_mechanic(
        &mut self,
        ctx: &RequestContext,
        vehicle: &mut Vehicle,
        mechanic: &User,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        ctx.authorize(Capability::AssignPdi, self.branch_id)?;
        self.check_status(PdiStatus::Pending, PdiStatus::InProgress)?;
        self.check_linked(vehicle)?;
        self.check_mechanic(ctx, mechanic)?;

        vehicle.transition(VehicleStatus::PdiAssigned, now)?;
        self.pdi_status = PdiStatus::InProgress;
        self.assigned_mechanic_id = Some(mechanic.id);
        self.assigned_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Rebind an in-progress PDI to another mechanic. Status and the original assignment
    /// time are kept, so turnaround still counts from the first assignment.
    pub fn reassign_mechanic(
        &mut self,
        ctx: &RequestContext,
        vehicle: &Vehicle,
        mechanic: &User,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        ctx.authorize(Capability::AssignPdi, self.branch_id)?;
        self.check_status(PdiStatus::InProgress, PdiStatus::InProgress)?;
        self.check_linked(vehicle)?;
        self.check_mechanic(ctx, mechanic)?;
        if self.assigned_mechanic_id == Some(mechanic.id) {
            return Err(DomainError::validation(
                "mechanic_id",
                format!("PDI is already assigned to {}", mechanic.username),
            ));
        }

        self.assigned_mechanic_id = Some(mechanic.id);
        self.updated_at = now;
        Ok(())
    }

    /// Mechanic sign-off: `pdi_assigned -> pdi_complete`
    pub fn complete_pdi(
        &mut self,
        ctx: &RequestContext,
        vehicle: &mut Vehicle,
        completion: PdiCompletion,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        ctx.authorize(Capability::CompletePdi, self.branch_id)?;
        self.check_status(PdiStatus::InProgress, PdiStatus::Complete)?;
        self.check_linked(vehicle)?;
        if self.assigned_mechanic_id != Some(ctx.user_id) {
            return Err(DomainError::NotAssignedMechanic);
        }
        let engine_no = normalize_optional_code("engine_no", completion.engine_no.as_deref())?;
        let dc_number = normalize_optional_code("dc_number", completion.dc_number.as_deref())?;

        vehicle.transition(VehicleStatus::PdiComplete, now)?;
        if let Some(engine_no) = engine_no {
            vehicle.engine_no = Some(engine_no.clone());
            self.engine_no = Some(engine_no);
        }
        if let Some(dc_number) = dc_number {
            vehicle.dc_number = Some(dc_number.clone());
            self.dc_number = Some(dc_number);
        }
        self.pdi_status = PdiStatus::Complete;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Hand-over to the customer: `pdi_complete -> delivered`. The record is frozen after.
    pub fn confirm_delivery(
        &mut self,
        ctx: &RequestContext,
        vehicle: &mut Vehicle,
        business_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryMovement> {
        ctx.authorize(Capability::ConfirmDelivery, self.branch_id)?;
        self.check_status(PdiStatus::Complete, PdiStatus::Delivered)?;
        self.check_linked(vehicle)?;

        vehicle.transition(VehicleStatus::Delivered, now)?;
        self.pdi_status = PdiStatus::Delivered;
        self.delivered_at = Some(now);
        self.updated_at = now;

        Ok(InventoryMovement::record(
            MovementKind::Delivery,
            vehicle,
            vehicle.branch_id,
            None,
            Some(self.id.to_string()),
            business_date,
            now,
        ))
    }

    /// Time from assignment to completion
    pub fn turnaround(&self) -> Option<Duration> {
        match (self.assigned_at, self.completed_at) {
            (Some(assigned), Some(completed)) if completed >= assigned => Some(completed - assigned),
            _ => None,
        }
    }

    pub fn model_variant(&self) -> String {
        format!("{}-{}", self.model, self.variant)
    }

    /// Shown in a mechanic's queue: open work, or work finished inside the window
    pub fn in_mechanic_queue(&self, mechanic_id: Uuid, now: DateTime<Utc>, window: Duration) -> bool {
        if self.assigned_mechanic_id != Some(mechanic_id) {
            return false;
        }
        match self.pdi_status {
            PdiStatus::InProgress => true,
            PdiStatus::Complete | PdiStatus::Delivered => {
                self.completed_at.map_or(false, |done| now - done <= window)
            }
            PdiStatus::Pending => false,
        }
    }
}

/// A mechanic's work queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MechanicQueue {
    pub in_progress: Vec<SalesRecord>,
    pub recently_completed: Vec<SalesRecord>,
}

impl MechanicQueue {
    pub fn build(
        mechanic_id: Uuid,
        records: impl IntoIterator<Item = SalesRecord>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let mut queue = MechanicQueue::default();
        for record in records {
            if !record.in_mechanic_queue(mechanic_id, now, window) {
                continue;
            }
            if record.pdi_status == PdiStatus::InProgress {
                queue.in_progress.push(record);
            } else {
                queue.recently_completed.push(record);
            }
        }
        queue.in_progress.sort_by_key(|r| r.assigned_at);
        queue
            .recently_completed
            .sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        queue
    }
}

/// Manager view: sales waiting for a mechanic and work in progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdiBoard {
    pub pending: Vec<SalesRecord>,
    pub in_progress: Vec<SalesRecord>,
}

impl PdiBoard {
    pub fn build(ctx: &RequestContext, records: impl IntoIterator<Item = SalesRecord>) -> Self {
        let mut board = PdiBoard::default();
        for record in records.into_iter().filter(|r| ctx.scope.contains(r.branch_id)) {
            match record.pdi_status {
                PdiStatus::Pending => board.pending.push(record),
                PdiStatus::InProgress => board.in_progress.push(record),
                _ => {}
            }
        }
        board.pending.sort_by_key(|r| r.sold_at);
        board.in_progress.sort_by_key(|r| r.assigned_at);
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, BranchTree};

    struct Fixture {
        tree: BranchTree,
        branch_id: Uuid,
        vehicle: Vehicle,
        mechanic: User,
    }

    fn fixture() -> Fixture {
        let branch = Branch {
            id: Uuid::new_v4(),
            code: "BLR01".to_string(),
            name: "Bengaluru".to_string(),
            parent_id: None,
            created_at: Utc::now(),
        };
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            chassis_no: "ME4JF50AAB1234567".to_string(),
            engine_no: None,
            model: "Activa".to_string(),
            variant: "STD".to_string(),
            color: "Red".to_string(),
            branch_id: branch.id,
            status: VehicleStatus::InStock,
            dc_number: None,
            load_reference: None,
            sale_id: None,
            date_received: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            updated_at: Utc::now(),
        };
        let mechanic = user("ravi", UserRole::Mechanic, branch.id);
        Fixture {
            branch_id: branch.id,
            tree: BranchTree::build(vec![branch]).unwrap(),
            vehicle,
            mechanic,
        }
    }

    fn user(name: &str, role: UserRole, branch_id: Uuid) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            display_name: name.to_string(),
            role,
            branch_id,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn ctx_for(f: &Fixture, user: &User) -> RequestContext {
        RequestContext::for_user(user, &f.tree).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn sell(f: &mut Fixture) -> SalesRecord {
        let staff = user("asha", UserRole::BranchStaff, f.branch_id);
        let ctx = ctx_for(f, &staff);
        let sale = NewSale {
            chassis_no: f.vehicle.chassis_no.clone(),
            customer_name: " Priya N ".to_string(),
            customer_phone: Some("+91 98450 12345".to_string()),
            dc_number: Some("dc-1001".to_string()),
        };
        record_sale(&ctx, &mut f.vehicle, sale, today(), Utc::now()).unwrap().0
    }

    #[test]
    fn test_full_lifecycle() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        assert_eq!(record.customer_name, "Priya N");
        assert_eq!(f.vehicle.status, VehicleStatus::Sold);
        assert_eq!(f.vehicle.sale_id, Some(record.id));

        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let mechanic = f.mechanic.clone();
        record
            .assign_mechanic(&ctx_for(&f, &manager), &mut f.vehicle, &mechanic, Utc::now())
            .unwrap();
        assert_eq!(f.vehicle.status, VehicleStatus::PdiAssigned);

        let completion = PdiCompletion {
            engine_no: Some("je12e9876".to_string()),
            dc_number: None,
        };
        record
            .complete_pdi(&ctx_for(&f, &mechanic), &mut f.vehicle, completion, Utc::now())
            .unwrap();
        assert_eq!(record.pdi_status, PdiStatus::Complete);
        assert_eq!(f.vehicle.engine_no.as_deref(), Some("JE12E9876"));
        assert!(record.turnaround().is_some());

        let movement = record
            .confirm_delivery(&ctx_for(&f, &manager), &mut f.vehicle, today(), Utc::now())
            .unwrap();
        assert_eq!(movement.kind, MovementKind::Delivery);
        assert_eq!(f.vehicle.status, VehicleStatus::Delivered);
        assert_eq!(record.pdi_status, PdiStatus::Delivered);
    }

    #[test]
    fn test_cannot_sell_vehicle_in_transit() {
        let mut f = fixture();
        f.vehicle.status = VehicleStatus::InTransit;
        let staff = user("asha", UserRole::BranchStaff, f.branch_id);
        let sale = NewSale {
            chassis_no: f.vehicle.chassis_no.clone(),
            customer_name: "Priya".to_string(),
            customer_phone: None,
            dc_number: None,
        };
        let err = record_sale(&ctx_for(&f, &staff), &mut f.vehicle, sale, today(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(f.vehicle.sale_id, None);
    }

    #[test]
    fn test_complete_before_assignment_is_rejected() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let mechanic = f.mechanic.clone();
        let err = record
            .complete_pdi(&ctx_for(&f, &mechanic), &mut f.vehicle, PdiCompletion::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(f.vehicle.status, VehicleStatus::Sold);
    }

    #[test]
    fn test_only_assigned_mechanic_completes() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let mechanic = f.mechanic.clone();
        record
            .assign_mechanic(&ctx_for(&f, &manager), &mut f.vehicle, &mechanic, Utc::now())
            .unwrap();

        let other = user("kiran", UserRole::Mechanic, f.branch_id);
        let err = record
            .complete_pdi(&ctx_for(&f, &other), &mut f.vehicle, PdiCompletion::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotAssignedMechanic);

        let err = record
            .complete_pdi(&ctx_for(&f, &manager), &mut f.vehicle, PdiCompletion::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::MissingCapability(Capability::CompletePdi));
    }

    #[test]
    fn test_assign_requires_active_mechanic() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let staff = user("asha", UserRole::BranchStaff, f.branch_id);
        assert!(record
            .assign_mechanic(&ctx_for(&f, &manager), &mut f.vehicle, &staff, Utc::now())
            .is_err());

        let mut inactive = f.mechanic.clone();
        inactive.is_active = false;
        assert!(record
            .assign_mechanic(&ctx_for(&f, &manager), &mut f.vehicle, &inactive, Utc::now())
            .is_err());
        assert_eq!(record.pdi_status, PdiStatus::Pending);
        assert_eq!(f.vehicle.status, VehicleStatus::Sold);
    }

    #[test]
    fn test_reassign_keeps_status_and_assignment_time() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let mechanic = f.mechanic.clone();
        let ctx = ctx_for(&f, &manager);
        record
            .assign_mechanic(&ctx, &mut f.vehicle, &mechanic, Utc::now())
            .unwrap();
        let assigned_at = record.assigned_at;

        let other = user("kiran", UserRole::Mechanic, f.branch_id);
        record
            .reassign_mechanic(&ctx, &f.vehicle, &other, Utc::now())
            .unwrap();
        assert_eq!(record.assigned_mechanic_id, Some(other.id));
        assert_eq!(record.pdi_status, PdiStatus::InProgress);
        assert_eq!(record.assigned_at, assigned_at);

        assert!(record.reassign_mechanic(&ctx, &f.vehicle, &other, Utc::now()).is_err());
    }

    #[test]
    fn test_delivered_record_is_frozen() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let mechanic = f.mechanic.clone();
        let mctx = ctx_for(&f, &manager);
        record.assign_mechanic(&mctx, &mut f.vehicle, &mechanic, Utc::now()).unwrap();
        record
            .complete_pdi(&ctx_for(&f, &mechanic), &mut f.vehicle, PdiCompletion::default(), Utc::now())
            .unwrap();
        record.confirm_delivery(&mctx, &mut f.vehicle, today(), Utc::now()).unwrap();

        let snapshot = record.clone();
        assert!(record.confirm_delivery(&mctx, &mut f.vehicle, today(), Utc::now()).is_err());
        assert!(record.reassign_mechanic(&mctx, &f.vehicle, &mechanic, Utc::now()).is_err());
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_unlinked_vehicle_is_rejected() {
        let mut f = fixture();
        let mut record = sell(&mut f);
        let manager = user("meena", UserRole::PdiManager, f.branch_id);
        let mechanic = f.mechanic.clone();
        let mut stranger = f.vehicle.clone();
        stranger.id = Uuid::new_v4();
        assert!(record
            .assign_mechanic(&ctx_for(&f, &manager), &mut stranger, &mechanic, Utc::now())
            .is_err());
    }

    #[test]
    fn test_mechanic_queue_window() {
        let mechanic_id = Uuid::new_v4();
        let now = Utc::now();
        let mut f = fixture();
        let base = sell(&mut f);

        let mut open = base.clone();
        open.pdi_status = PdiStatus::InProgress;
        open.assigned_mechanic_id = Some(mechanic_id);

        let mut recent = open.clone();
        recent.pdi_status = PdiStatus::Complete;
        recent.completed_at = Some(now - Duration::hours(5));

        let mut stale = recent.clone();
        stale.completed_at = Some(now - Duration::hours(72));

        let queue = MechanicQueue::build(mechanic_id, vec![open, recent, stale, base], now, Duration::hours(48));
        assert_eq!(queue.in_progress.len(), 1);
        assert_eq!(queue.recently_completed.len(), 1);
    }
}

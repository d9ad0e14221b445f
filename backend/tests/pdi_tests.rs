//! Sales and PDI workflow tests
//!
//! Tests for the per-vehicle lifecycle in_stock -> sold -> pdi_assigned -> pdi_complete ->
//! delivered:
//! - Only the next legal step is accepted, from any stage
//! - A rejected step changes neither the vehicle nor the sales record
//! - Completion is reserved for the assigned mechanic

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use shared::{
    record_sale, Branch, BranchTree, DomainError, MechanicQueue, NewSale, PdiCompletion, PdiStatus,
    RequestContext, SalesRecord, User, UserRole, Vehicle, VehicleStatus,
};
use uuid::Uuid;

fn business_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

struct Dealership {
    tree: BranchTree,
    branch_id: Uuid,
    staff: RequestContext,
    manager: RequestContext,
    mechanic: User,
    mechanic_ctx: RequestContext,
}

fn dealership() -> Dealership {
    let head = Branch {
        id: Uuid::new_v4(),
        code: "HQ".to_string(),
        name: "Head Office".to_string(),
        parent_id: None,
        created_at: Utc::now(),
    };
    let tree = BranchTree::build(vec![head.clone()]).unwrap();
    let mechanic = User {
        id: Uuid::new_v4(),
        username: "ravi".to_string(),
        display_name: "Ravi".to_string(),
        role: UserRole::Mechanic,
        branch_id: head.id,
        is_active: true,
        created_at: Utc::now(),
    };
    Dealership {
        staff: RequestContext::new(Uuid::new_v4(), "desk", UserRole::BranchStaff, head.id, &tree).unwrap(),
        manager: RequestContext::new(Uuid::new_v4(), "lead", UserRole::PdiManager, head.id, &tree).unwrap(),
        mechanic_ctx: RequestContext::for_user(&mechanic, &tree).unwrap(),
        mechanic,
        branch_id: head.id,
        tree,
    }
}

fn vehicle(branch_id: Uuid) -> Vehicle {
    Vehicle {
        id: Uuid::new_v4(),
        chassis_no: "ME4JF50AAB0001".to_string(),
        engine_no: None,
        model: "Shine".to_string(),
        variant: "DISC".to_string(),
        color: "Red".to_string(),
        branch_id,
        status: VehicleStatus::InStock,
        dc_number: None,
        load_reference: None,
        sale_id: None,
        date_received: business_date(),
        updated_at: Utc::now(),
    }
}

fn sale() -> NewSale {
    NewSale {
        chassis_no: "ME4JF50AAB0001".to_string(),
        customer_name: "Meena Iyer".to_string(),
        customer_phone: Some("9876543210".to_string()),
        dc_number: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Assign,
    Complete,
    Deliver,
}

const STEPS: [Step; 3] = [Step::Assign, Step::Complete, Step::Deliver];

fn apply(d: &Dealership, step: Step, record: &mut SalesRecord, v: &mut Vehicle) -> Result<(), DomainError> {
    let now = Utc::now();
    match step {
        Step::Assign => record.assign_mechanic(&d.manager, v, &d.mechanic, now),
        Step::Complete => record.complete_pdi(&d.mechanic_ctx, v, PdiCompletion::default(), now),
        Step::Deliver => record
            .confirm_delivery(&d.staff, v, business_date(), now)
            .map(|_| ()),
    }
}

/// Sell a vehicle and advance it `done` steps through the PDI workflow
fn advanced(d: &Dealership, done: usize) -> (SalesRecord, Vehicle) {
    let mut v = vehicle(d.branch_id);
    let (mut record, _) = record_sale(&d.staff, &mut v, sale(), business_date(), Utc::now()).unwrap();
    for &step in &STEPS[..done] {
        apply(d, step, &mut record, &mut v).unwrap();
    }
    (record, v)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let d = dealership();
        let (record, v) = advanced(&d, 3);
        assert_eq!(record.pdi_status, PdiStatus::Delivered);
        assert_eq!(v.status, VehicleStatus::Delivered);
        assert!(record.turnaround().is_some());
    }

    #[test]
    fn test_other_mechanic_cannot_complete() {
        let d = dealership();
        let (mut record, mut v) = advanced(&d, 1);
        let other = RequestContext::new(Uuid::new_v4(), "other", UserRole::Mechanic, d.branch_id, &d.tree).unwrap();

        let err = record
            .complete_pdi(&other, &mut v, PdiCompletion::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotAssignedMechanic);
        assert_eq!(v.status, VehicleStatus::PdiAssigned);
    }

    #[test]
    fn test_owner_cannot_complete_on_behalf() {
        let d = dealership();
        let (mut record, mut v) = advanced(&d, 1);
        let owner = RequestContext::new(Uuid::new_v4(), "owner", UserRole::Owner, d.branch_id, &d.tree).unwrap();

        assert!(matches!(
            record.complete_pdi(&owner, &mut v, PdiCompletion::default(), Utc::now()),
            Err(DomainError::MissingCapability(_))
        ));
    }

    #[test]
    fn test_completion_captures_engine_and_dc() {
        let d = dealership();
        let (mut record, mut v) = advanced(&d, 1);
        let completion = PdiCompletion {
            engine_no: Some(" jf50e1234567 ".to_string()),
            dc_number: Some("dc-0042".to_string()),
        };

        record.complete_pdi(&d.mechanic_ctx, &mut v, completion, Utc::now()).unwrap();
        assert_eq!(v.engine_no.as_deref(), Some("JF50E1234567"));
        assert_eq!(record.dc_number.as_deref(), Some("DC-0042"));
    }

    #[test]
    fn test_reassign_keeps_status_and_assignment_time() {
        let d = dealership();
        let (mut record, v) = advanced(&d, 1);
        let assigned_at = record.assigned_at;
        let replacement = User {
            id: Uuid::new_v4(),
            username: "kiran".to_string(),
            ..d.mechanic.clone()
        };

        record.reassign_mechanic(&d.manager, &v, &replacement, Utc::now()).unwrap();
        assert_eq!(record.assigned_mechanic_id, Some(replacement.id));
        assert_eq!(record.pdi_status, PdiStatus::InProgress);
        assert_eq!(record.assigned_at, assigned_at);
    }

    #[test]
    fn test_reassign_after_completion_rejected() {
        let d = dealership();
        let (mut record, v) = advanced(&d, 2);
        let replacement = User {
            id: Uuid::new_v4(),
            ..d.mechanic.clone()
        };
        assert!(record.reassign_mechanic(&d.manager, &v, &replacement, Utc::now()).is_err());
    }

    #[test]
    fn test_inactive_mechanic_cannot_be_assigned() {
        let d = dealership();
        let (mut record, mut v) = advanced(&d, 0);
        let retired = User {
            is_active: false,
            ..d.mechanic.clone()
        };
        assert!(record.assign_mechanic(&d.manager, &mut v, &retired, Utc::now()).is_err());
        assert_eq!(v.status, VehicleStatus::Sold);
    }

    #[test]
    fn test_sold_vehicle_cannot_be_sold_again() {
        let d = dealership();
        let (_, mut v) = advanced(&d, 0);
        assert!(matches!(
            record_sale(&d.staff, &mut v, sale(), business_date(), Utc::now()),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_mechanic_queue_drops_old_completions() {
        let d = dealership();
        let (mut record, _) = advanced(&d, 2);
        let now = Utc::now();
        let window = Duration::hours(48);

        let queue = MechanicQueue::build(d.mechanic.id, vec![record.clone()], now, window);
        assert_eq!(queue.recently_completed.len(), 1);

        record.completed_at = Some(now - Duration::hours(72));
        let queue = MechanicQueue::build(d.mechanic.id, vec![record], now, window);
        assert!(queue.recently_completed.is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// From any stage only the next step succeeds; every other step is rejected
        /// without touching the record or the vehicle
        #[test]
        fn prop_illegal_transitions_rejected(done in 0usize..=3, step in prop::sample::select(STEPS.to_vec())) {
            let d = dealership();
            let (mut record, mut v) = advanced(&d, done);
            let before = (record.clone(), v.clone());

            let legal = STEPS.get(done) == Some(&step);
            let result = apply(&d, step, &mut record, &mut v);

            prop_assert_eq!(result.is_ok(), legal);
            if !legal {
                prop_assert_eq!(before, (record.clone(), v.clone()));
            }
            prop_assert_eq!(record.pdi_status.vehicle_status(), v.status);
        }

        /// The vehicle status machine accepts exactly the six lifecycle edges
        #[test]
        fn prop_status_edges(
            from in prop::sample::select(VehicleStatus::ALL.to_vec()),
            to in prop::sample::select(VehicleStatus::ALL.to_vec()),
        ) {
            use VehicleStatus::*;
            let expected = matches!(
                (from, to),
                (InStock, InTransit)
                    | (InTransit, InStock)
                    | (InStock, Sold)
                    | (Sold, PdiAssigned)
                    | (PdiAssigned, PdiComplete)
                    | (PdiComplete, Delivered)
            );
            prop_assert_eq!(from.can_transition_to(to), expected);
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }
    }
}

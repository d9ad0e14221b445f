//! Transfer ledger tests
//!
//! Tests for inter-branch loads:
//! - Vehicles on a load are never counted in both source and destination stock
//! - Partial receipts never leave a vehicle both received and in transit
//! - Cancelling a load restores the exact prior branch
//! - A rejected batch leaves every vehicle unchanged

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use shared::{
    aggregate_stock, generate_load_reference, Branch, BranchScope, BranchTree, Capability, DomainError,
    MovementKind, RequestContext, StockFilter, Transfer, TransferStatus, UserRole, Vehicle, VehicleStatus,
};
use uuid::Uuid;

fn business_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn branch(code: &str, parent_id: Option<Uuid>) -> Branch {
    Branch {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: code.to_string(),
        parent_id,
        created_at: Utc::now(),
    }
}

fn vehicle(chassis: &str, branch_id: Uuid) -> Vehicle {
    Vehicle {
        id: Uuid::new_v4(),
        chassis_no: chassis.to_string(),
        engine_no: None,
        model: "Splendor".to_string(),
        variant: "DRUM".to_string(),
        color: "Black".to_string(),
        branch_id,
        status: VehicleStatus::InStock,
        dc_number: None,
        load_reference: None,
        sale_id: None,
        date_received: business_date(),
        updated_at: Utc::now(),
    }
}

/// Transfer desk covering both ends of a load
fn desk(source: &Branch, destination: &Branch) -> RequestContext {
    RequestContext {
        user_id: Uuid::new_v4(),
        username: "desk".to_string(),
        role: UserRole::BranchStaff,
        branch_id: source.id,
        scope: BranchScope::from_ids([source.id, destination.id]),
    }
}

fn dispatch(source: &Branch, destination: &Branch, vehicles: &mut [Vehicle]) -> Result<Transfer, DomainError> {
    dispatch_as(&desk(source, destination), source, destination, vehicles)
}

fn dispatch_as(
    ctx: &RequestContext,
    source: &Branch,
    destination: &Branch,
    vehicles: &mut [Vehicle],
) -> Result<Transfer, DomainError> {
    Transfer::dispatch(
        ctx,
        generate_load_reference(&source.code, business_date(), 1),
        source.id,
        destination.id,
        vehicles,
        business_date(),
        Utc::now(),
    )
    .map(|(transfer, _)| transfer)
}

fn stock_chassis(tree: &BranchTree, at: Uuid, vehicles: &[Vehicle]) -> Vec<String> {
    let scope = tree.resolve_scope(at).unwrap();
    aggregate_stock(&scope, &StockFilter::default(), vehicles, &[])
        .models
        .into_iter()
        .flat_map(|m| m.variants)
        .flat_map(|v| v.colors)
        .flat_map(|c| c.vehicles)
        .map(|v| v.chassis_no)
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Head A with child B; X123 moves from B up to A
    #[test]
    fn test_transfer_moves_vehicle_between_scopes() {
        let a = branch("A", None);
        let b = branch("B", Some(a.id));
        let tree = BranchTree::build(vec![a.clone(), b.clone()]).unwrap();
        let mut vehicles = vec![vehicle("X123", b.id)];

        // head branch sees the child's stock
        assert_eq!(stock_chassis(&tree, a.id, &vehicles), vec!["X123"]);
        assert_eq!(stock_chassis(&tree, b.id, &vehicles), vec!["X123"]);

        let mut transfer = dispatch(&b, &a, &mut vehicles).unwrap();
        assert!(stock_chassis(&tree, a.id, &vehicles).is_empty());
        assert!(stock_chassis(&tree, b.id, &vehicles).is_empty());

        transfer.receive(&desk(&b, &a), &mut vehicles, business_date(), Utc::now()).unwrap();
        assert!(stock_chassis(&tree, b.id, &vehicles).is_empty());
        assert_eq!(stock_chassis(&tree, a.id, &vehicles), vec!["X123"]);
        assert_eq!(vehicles[0].branch_id, a.id);
        assert_eq!(transfer.status, TransferStatus::Received);
    }

    #[test]
    fn test_vehicle_cannot_join_two_pending_loads() {
        let a = branch("A", None);
        let b = branch("B", None);
        let c = branch("C", None);
        let mut vehicles = vec![vehicle("X123", a.id)];

        dispatch(&a, &b, &mut vehicles).unwrap();
        let err = dispatch(&a, &c, &mut vehicles).unwrap_err();
        assert_eq!(
            err,
            DomainError::VehicleAlreadyInTransfer {
                chassis_no: "X123".to_string()
            }
        );
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        let a = branch("A", None);
        let mut vehicles = vec![vehicle("X123", a.id)];
        assert!(matches!(
            dispatch(&a, &a, &mut vehicles),
            Err(DomainError::Validation { .. })
        ));
        assert_eq!(vehicles[0].status, VehicleStatus::InStock);
    }

    #[test]
    fn test_receive_after_cancel_is_rejected() {
        let a = branch("A", None);
        let b = branch("B", None);
        let mut vehicles = vec![vehicle("X123", a.id)];
        let mut transfer = dispatch(&a, &b, &mut vehicles).unwrap();

        let reversals = transfer.cancel(&desk(&a, &b), &mut vehicles, business_date(), Utc::now()).unwrap();
        assert!(reversals.iter().all(|m| m.kind == MovementKind::TransferReversal));

        let err = transfer.receive(&desk(&a, &b), &mut vehicles, business_date(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::TransferNotPending { .. }));
        assert_eq!(vehicles[0].branch_id, a.id);
    }

    #[test]
    fn test_cancel_after_partial_receipt_is_rejected() {
        let a = branch("A", None);
        let b = branch("B", None);
        let mut vehicles = vec![vehicle("XA1", a.id), vehicle("XA2", a.id)];
        let mut transfer = dispatch(&a, &b, &mut vehicles).unwrap();

        transfer
            .receive_partial(&desk(&a, &b), &["xa1".to_string()], &mut vehicles, business_date(), Utc::now())
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::PartiallyReceived);
        assert!(transfer.cancel(&desk(&a, &b), &mut vehicles, business_date(), Utc::now()).is_err());

        // a full receive picks up the remaining line
        let movements = transfer.receive(&desk(&a, &b), &mut vehicles, business_date(), Utc::now()).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(transfer.status, TransferStatus::Received);
    }

    /// Head A with child B and an unrelated head C
    fn group() -> (Branch, Branch, Branch, BranchTree) {
        let a = branch("A", None);
        let b = branch("B", Some(a.id));
        let c = branch("C", None);
        let tree = BranchTree::build(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        (a, b, c, tree)
    }

    fn staff_at(branch: &Branch, tree: &BranchTree) -> RequestContext {
        RequestContext::new(Uuid::new_v4(), "staff", UserRole::BranchStaff, branch.id, tree).unwrap()
    }

    #[test]
    fn test_source_only_caller_cannot_receive() {
        let (a, b, _, tree) = group();
        let b_staff = staff_at(&b, &tree);
        let mut vehicles = vec![vehicle("XB1", b.id)];
        let mut transfer = dispatch_as(&b_staff, &b, &a, &mut vehicles).unwrap();
        assert_eq!(transfer.created_by, b_staff.user_id);

        // B sees only itself, so it cannot take delivery on A's behalf
        let err = transfer
            .receive(&b_staff, &mut vehicles, business_date(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::UnauthorizedScope(a.id));
        assert!(transfer
            .receive_partial(&b_staff, &["XB1".to_string()], &mut vehicles, business_date(), Utc::now())
            .is_err());
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(vehicles[0].status, VehicleStatus::InTransit);

        transfer
            .receive(&staff_at(&a, &tree), &mut vehicles, business_date(), Utc::now())
            .unwrap();
        assert_eq!(vehicles[0].branch_id, a.id);
    }

    #[test]
    fn test_out_of_scope_caller_cannot_dispatch_or_cancel() {
        let (a, b, c, tree) = group();
        let outsider = staff_at(&c, &tree);
        let mut vehicles = vec![vehicle("XA1", a.id)];

        let err = dispatch_as(&outsider, &a, &b, &mut vehicles).unwrap_err();
        assert_eq!(err, DomainError::UnauthorizedScope(a.id));
        assert_eq!(vehicles[0].status, VehicleStatus::InStock);

        let mut transfer = dispatch_as(&staff_at(&a, &tree), &a, &b, &mut vehicles).unwrap();
        let err = transfer
            .cancel(&outsider, &mut vehicles, business_date(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::UnauthorizedScope(a.id));
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(vehicles[0].status, VehicleStatus::InTransit);
    }

    #[test]
    fn test_mechanic_cannot_move_loads() {
        let (a, b, _, tree) = group();
        let mechanic = RequestContext::new(Uuid::new_v4(), "ravi", UserRole::Mechanic, a.id, &tree).unwrap();
        let mut vehicles = vec![vehicle("XA1", a.id)];

        assert_eq!(
            dispatch_as(&mechanic, &a, &b, &mut vehicles).unwrap_err(),
            DomainError::MissingCapability(Capability::ManageTransfers)
        );
        let mut transfer = dispatch_as(&staff_at(&a, &tree), &a, &b, &mut vehicles).unwrap();
        assert_eq!(
            transfer
                .receive(&mechanic, &mut vehicles, business_date(), Utc::now())
                .unwrap_err(),
            DomainError::MissingCapability(Capability::ManageTransfers)
        );
    }

    #[test]
    fn test_receipt_returns_updated_vehicles() {
        let a = branch("A", None);
        let b = branch("B", None);
        let mut vehicles = vec![vehicle("XA1", a.id), vehicle("XA2", a.id)];
        let mut transfer = dispatch(&a, &b, &mut vehicles).unwrap();

        let movements = transfer
            .receive_partial(&desk(&a, &b), &["XA2".to_string()], &mut vehicles, business_date(), Utc::now())
            .unwrap();
        let receipt = transfer.into_receipt(&movements, vehicles);

        assert_eq!(receipt.transfer.status, TransferStatus::PartiallyReceived);
        let received: Vec<(&str, Uuid, VehicleStatus)> = receipt
            .vehicles
            .iter()
            .map(|v| (v.chassis_no.as_str(), v.branch_id, v.status))
            .collect();
        assert_eq!(received, vec![("XA2", b.id, VehicleStatus::InStock)]);
    }

    #[test]
    fn test_load_reference_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(generate_load_reference("BLR01", date, 12), "TR-BLR01-20260307-0012");
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

        /// After any partial receipt every vehicle is in exactly one place
        #[test]
        fn prop_no_double_counting(
            load_size in 1usize..12,
            received in prop::collection::vec(any::<bool>(), 12),
        ) {
            let source = branch("SRC", None);
            let destination = branch("DST", None);
            let tree = BranchTree::build(vec![source.clone(), destination.clone()]).unwrap();
            let mut vehicles: Vec<Vehicle> = (0..load_size)
                .map(|i| vehicle(&format!("CH{:04}", i), source.id))
                .collect();

            let mut transfer = dispatch(&source, &destination, &mut vehicles).unwrap();
            let picked: Vec<String> = vehicles
                .iter()
                .zip(&received)
                .filter(|(_, take)| **take)
                .map(|(v, _)| v.chassis_no.clone())
                .collect();
            if !picked.is_empty() {
                transfer
                    .receive_partial(&desk(&source, &destination), &picked, &mut vehicles, business_date(), Utc::now())
                    .unwrap();
            }

            let at_source = stock_chassis(&tree, source.id, &vehicles);
            let at_destination = stock_chassis(&tree, destination.id, &vehicles);
            prop_assert!(at_source.is_empty());
            prop_assert_eq!(at_destination.len(), picked.len());

            for line in &transfer.lines {
                let v = vehicles.iter().find(|v| v.id == line.vehicle_id).unwrap();
                match line.received_at {
                    Some(_) => {
                        prop_assert_eq!(v.status, VehicleStatus::InStock);
                        prop_assert_eq!(v.branch_id, destination.id);
                    }
                    None => {
                        prop_assert_eq!(v.status, VehicleStatus::InTransit);
                        prop_assert_eq!(v.branch_id, source.id);
                    }
                }
            }
            prop_assert_eq!(transfer.received_count(), picked.len());
        }

        /// Cancelling returns every vehicle to its original branch and status
        #[test]
        fn prop_cancel_restores_prior_branch(load_size in 1usize..12) {
            let source = branch("SRC", None);
            let destination = branch("DST", None);
            let mut vehicles: Vec<Vehicle> = (0..load_size)
                .map(|i| vehicle(&format!("CH{:04}", i), source.id))
                .collect();
            let before: Vec<(Uuid, Uuid, VehicleStatus)> =
                vehicles.iter().map(|v| (v.id, v.branch_id, v.status)).collect();

            let mut transfer = dispatch(&source, &destination, &mut vehicles).unwrap();
            let movements = transfer.cancel(&desk(&source, &destination), &mut vehicles, business_date(), Utc::now()).unwrap();

            let after: Vec<(Uuid, Uuid, VehicleStatus)> =
                vehicles.iter().map(|v| (v.id, v.branch_id, v.status)).collect();
            prop_assert_eq!(before, after);
            prop_assert_eq!(movements.len(), load_size);
            prop_assert_eq!(transfer.status, TransferStatus::Cancelled);
        }

        /// One unavailable vehicle rejects the whole batch untouched
        #[test]
        fn prop_rejected_batch_leaves_vehicles_unchanged(
            load_size in 2usize..12,
            bad in any::<prop::sample::Index>(),
            bad_status in prop::sample::select(vec![
                VehicleStatus::InTransit,
                VehicleStatus::Sold,
                VehicleStatus::PdiAssigned,
                VehicleStatus::Delivered,
            ]),
        ) {
            let source = branch("SRC", None);
            let destination = branch("DST", None);
            let mut vehicles: Vec<Vehicle> = (0..load_size)
                .map(|i| vehicle(&format!("CH{:04}", i), source.id))
                .collect();
            vehicles[bad.index(load_size)].status = bad_status;
            let before = vehicles.clone();

            prop_assert!(dispatch(&source, &destination, &mut vehicles).is_err());
            prop_assert_eq!(before, vehicles);
        }
    }
}

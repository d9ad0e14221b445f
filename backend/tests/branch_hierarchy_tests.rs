//! Branch hierarchy tests
//!
//! Tests for scope resolution over the branch forest:
//! - No branch is ever its own ancestor
//! - Head branches see themselves and every descendant, sub-branches only themselves
//! - Cycles and unknown parents are rejected at build and re-parent time

use chrono::Utc;
use proptest::prelude::*;
use shared::{Branch, BranchTree, DomainError, RequestContext, UserRole};
use uuid::Uuid;

fn branch(code: &str, parent_id: Option<Uuid>) -> Branch {
    Branch {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: format!("{} Branch", code),
        parent_id,
        created_at: Utc::now(),
    }
}

/// Build a forest where each branch may only point at an earlier one
fn forest(shape: &[(bool, usize)]) -> Vec<Branch> {
    let mut branches: Vec<Branch> = Vec::with_capacity(shape.len());
    for (i, &(has_parent, pick)) in shape.iter().enumerate() {
        let parent_id = if i > 0 && has_parent {
            Some(branches[pick % i].id)
        } else {
            None
        };
        branches.push(branch(&format!("B{:02}", i), parent_id));
    }
    branches
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_head_branch_scope_includes_children() {
        let head = branch("HQ", None);
        let child = branch("SUB1", Some(head.id));
        let tree = BranchTree::build(vec![head.clone(), child.clone()]).unwrap();

        let scope = tree.resolve_scope(head.id).unwrap();
        assert!(scope.contains(head.id));
        assert!(scope.contains(child.id));
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_sub_branch_scope_is_itself() {
        let head = branch("HQ", None);
        let child = branch("SUB1", Some(head.id));
        let grandchild = branch("SUB2", Some(child.id));
        let tree = BranchTree::build(vec![head, child.clone(), grandchild]).unwrap();

        let scope = tree.resolve_scope(child.id).unwrap();
        assert_eq!(scope.ids(), vec![child.id]);
    }

    #[test]
    fn test_build_rejects_cycle() {
        let mut a = branch("A", None);
        let b = branch("B", Some(a.id));
        a.parent_id = Some(b.id);

        let result = BranchTree::build(vec![a, b]);
        assert!(matches!(result, Err(DomainError::BranchCycle(_))));
    }

    #[test]
    fn test_build_rejects_self_parent() {
        let mut a = branch("A", None);
        a.parent_id = Some(a.id);
        assert!(matches!(
            BranchTree::build(vec![a]),
            Err(DomainError::BranchCycle(_))
        ));
    }

    #[test]
    fn test_build_rejects_unknown_parent() {
        let missing = Uuid::new_v4();
        let orphan = branch("ORPHAN", Some(missing));
        assert_eq!(
            BranchTree::build(vec![orphan]).unwrap_err(),
            DomainError::BranchNotFound(missing)
        );
    }

    #[test]
    fn test_owner_sees_every_branch() {
        let north = branch("NORTH", None);
        let south = branch("SOUTH", None);
        let south_sub = branch("SOUTH1", Some(south.id));
        let tree = BranchTree::build(vec![north.clone(), south, south_sub]).unwrap();

        let owner = RequestContext::new(Uuid::new_v4(), "owner", UserRole::Owner, north.id, &tree).unwrap();
        assert_eq!(owner.scope.len(), 3);

        let staff =
            RequestContext::new(Uuid::new_v4(), "staff", UserRole::BranchStaff, north.id, &tree).unwrap();
        assert_eq!(staff.scope.ids(), vec![north.id]);
    }

    #[test]
    fn test_narrowing_outside_scope_is_rejected() {
        let north = branch("NORTH", None);
        let south = branch("SOUTH", None);
        let tree = BranchTree::build(vec![north.clone(), south.clone()]).unwrap();
        let ctx = RequestContext::new(Uuid::new_v4(), "m", UserRole::PdiManager, north.id, &tree).unwrap();

        assert!(ctx.narrowed_to(Some(north.id)).is_ok());
        assert_eq!(
            ctx.narrowed_to(Some(south.id)).unwrap_err(),
            DomainError::UnauthorizedScope(south.id)
        );
    }

    #[test]
    fn test_reparent_under_descendant_is_rejected() {
        let head = branch("HQ", None);
        let child = branch("SUB1", Some(head.id));
        let tree = BranchTree::build(vec![head.clone(), child.clone()]).unwrap();

        assert!(matches!(
            tree.validate_reparent(head.id, Some(child.id)),
            Err(DomainError::BranchCycle(_))
        ));
        assert!(tree.validate_reparent(child.id, None).is_ok());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn shape_strategy() -> impl Strategy<Value = Vec<(bool, usize)>> {
        prop::collection::vec((any::<bool>(), any::<usize>()), 1..25)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Resolving any branch never lists it among its own ancestors or descendants
        #[test]
        fn prop_branch_never_own_ancestor(shape in shape_strategy()) {
            let branches = forest(&shape);
            let tree = BranchTree::build(branches.clone()).unwrap();

            for b in &branches {
                let ancestors = tree.ancestors(b.id).unwrap();
                prop_assert!(!ancestors.contains(&b.id));
                prop_assert!(!tree.descendants(b.id).unwrap().contains(&b.id));
                // the chain always ends at a head branch
                if let Some(top) = ancestors.last() {
                    prop_assert!(tree.get(*top).unwrap().is_head());
                }
            }
        }

        /// Head scope is itself plus descendants; any other branch sees only itself
        #[test]
        fn prop_scope_matches_head_rule(shape in shape_strategy()) {
            let branches = forest(&shape);
            let tree = BranchTree::build(branches.clone()).unwrap();

            for b in &branches {
                let scope = tree.resolve_scope(b.id).unwrap();
                prop_assert!(scope.contains(b.id));
                if b.is_head() {
                    prop_assert_eq!(scope.len(), tree.descendants(b.id).unwrap().len() + 1);
                } else {
                    prop_assert_eq!(scope.len(), 1);
                }
            }
        }

        /// Every branch below a head appears in exactly one head's scope
        #[test]
        fn prop_head_scopes_partition_forest(shape in shape_strategy()) {
            let branches = forest(&shape);
            let tree = BranchTree::build(branches.clone()).unwrap();

            let mut covered = 0;
            for head in branches.iter().filter(|b| b.is_head()) {
                covered += tree.resolve_scope(head.id).unwrap().len();
            }
            prop_assert_eq!(covered, branches.len());
        }

        /// Moving a branch under itself or a descendant is always refused
        #[test]
        fn prop_reparent_never_creates_cycle(shape in shape_strategy(), pick in any::<usize>()) {
            let branches = forest(&shape);
            let tree = BranchTree::build(branches.clone()).unwrap();
            let moved = &branches[pick % branches.len()];

            prop_assert!(tree.validate_reparent(moved.id, Some(moved.id)).is_err());
            for below in tree.descendants(moved.id).unwrap() {
                prop_assert!(tree.validate_reparent(moved.id, Some(*below)).is_err());
            }
        }
    }
}

//! Request-scoped caller context

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BranchScope, BranchTree, Capability, User, UserRole};
use crate::error::{DomainError, DomainResult};

/// Who is calling and which branches they may touch.
///
/// Built once per request from the authenticated user and the current branch hierarchy,
/// then passed into every core operation. Owners oversee the whole group; every other role
/// gets the scope resolved from their home branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub branch_id: Uuid,
    pub scope: BranchScope,
}

impl RequestContext {
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        role: UserRole,
        branch_id: Uuid,
        tree: &BranchTree,
    ) -> DomainResult<Self> {
        let scope = match role {
            UserRole::Owner => tree.full_scope(),
            _ => tree.resolve_scope(branch_id)?,
        };
        Ok(Self {
            user_id,
            username: username.into(),
            role,
            branch_id,
            scope,
        })
    }

    pub fn for_user(user: &User, tree: &BranchTree) -> DomainResult<Self> {
        Self::new(user.id, user.username.clone(), user.role, user.branch_id, tree)
    }

    pub fn require(&self, capability: Capability) -> DomainResult<()> {
        if self.role.has(capability) {
            Ok(())
        } else {
            Err(DomainError::MissingCapability(capability))
        }
    }

    pub fn ensure_in_scope(&self, branch_id: Uuid) -> DomainResult<()> {
        self.scope.ensure_contains(branch_id)
    }

    /// Capability and scope check in one call
    pub fn authorize(&self, capability: Capability, branch_id: Uuid) -> DomainResult<()> {
        self.require(capability)?;
        self.ensure_in_scope(branch_id)
    }

    /// Narrow the scope to one branch the caller already manages
    pub fn narrowed_to(&self, branch_id: Option<Uuid>) -> DomainResult<BranchScope> {
        match branch_id {
            Some(id) => {
                self.ensure_in_scope(id)?;
                Ok(BranchScope::single(id))
            }
            None => Ok(self.scope.clone()),
        }
    }
}

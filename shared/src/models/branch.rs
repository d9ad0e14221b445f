//! Branch hierarchy models
//!
//! Branches form a forest through optional parent links. A branch without a parent is a
//! head branch and manages every branch below it. The hierarchy is held as an arena
//! indexed by position with descendant sets computed once at build time, so scope
//! resolution never walks pointers and can never loop.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// A dealership branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub id: Uuid,
    /// Short uppercase code printed on load references (e.g. "BLR01")
    pub code: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn is_head(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Set of branch ids an operation is allowed to read or mutate
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchScope(BTreeSet<Uuid>);

impl BranchScope {
    pub fn single(branch_id: Uuid) -> Self {
        Self(BTreeSet::from([branch_id]))
    }

    pub fn from_ids<I: IntoIterator<Item = Uuid>>(ids: I) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, branch_id: Uuid) -> bool {
        self.0.contains(&branch_id)
    }

    /// Reject a branch outside this scope
    pub fn ensure_contains(&self, branch_id: Uuid) -> DomainResult<()> {
        if self.contains(branch_id) {
            Ok(())
        } else {
            Err(DomainError::UnauthorizedScope(branch_id))
        }
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.0.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Arena-backed branch forest
#[derive(Debug, Clone, Default)]
pub struct BranchTree {
    nodes: Vec<Branch>,
    index: HashMap<Uuid, usize>,
    children: Vec<Vec<usize>>,
    descendants: Vec<BTreeSet<Uuid>>,
}

impl BranchTree {
    /// Build the hierarchy, rejecting unknown parents and cycles
    pub fn build(branches: Vec<Branch>) -> DomainResult<Self> {
        let mut index = HashMap::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            if index.insert(branch.id, i).is_some() {
                return Err(DomainError::validation(
                    "branch_id",
                    format!("branch {} listed twice", branch.id),
                ));
            }
        }

        let mut parent = Vec::with_capacity(branches.len());
        for branch in &branches {
            let p = match branch.parent_id {
                Some(pid) => Some(*index.get(&pid).ok_or(DomainError::BranchNotFound(pid))?),
                None => None,
            };
            parent.push(p);
        }

        Self::check_acyclic(&branches, &parent)?;

        let mut children = vec![Vec::new(); branches.len()];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        let descendants = (0..branches.len())
            .map(|i| {
                let mut found = BTreeSet::new();
                let mut stack = children[i].clone();
                while let Some(next) = stack.pop() {
                    if found.insert(branches[next].id) {
                        stack.extend(children[next].iter().copied());
                    }
                }
                found
            })
            .collect();

        Ok(Self {
            nodes: branches,
            index,
            children,
            descendants,
        })
    }

    /// Walk each parent chain once; revisiting a node still on the current path is a cycle
    fn check_acyclic(branches: &[Branch], parent: &[Option<usize>]) -> DomainResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; branches.len()];
        for start in 0..branches.len() {
            let mut path = Vec::new();
            let mut cursor = Some(start);
            while let Some(node) = cursor {
                match marks[node] {
                    Mark::Done => break,
                    Mark::OnPath => return Err(DomainError::BranchCycle(branches[node].id)),
                    Mark::Unvisited => {
                        marks[node] = Mark::OnPath;
                        path.push(node);
                        cursor = parent[node];
                    }
                }
            }
            for node in path {
                marks[node] = Mark::Done;
            }
        }
        Ok(())
    }

    pub fn get(&self, branch_id: Uuid) -> DomainResult<&Branch> {
        self.index
            .get(&branch_id)
            .map(|&i| &self.nodes[i])
            .ok_or(DomainError::BranchNotFound(branch_id))
    }

    pub fn branches(&self) -> &[Branch] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, branch_id: Uuid) -> DomainResult<Vec<&Branch>> {
        let i = self.position(branch_id)?;
        Ok(self.children[i].iter().map(|&c| &self.nodes[c]).collect())
    }

    /// All branches below `branch_id`, excluding itself
    pub fn descendants(&self, branch_id: Uuid) -> DomainResult<&BTreeSet<Uuid>> {
        let i = self.position(branch_id)?;
        Ok(&self.descendants[i])
    }

    /// Parent chain from the immediate parent up to the head branch
    pub fn ancestors(&self, branch_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let mut chain = Vec::new();
        let mut cursor = self.get(branch_id)?.parent_id;
        while let Some(id) = cursor {
            // acyclic by construction, the bound only guards against a corrupted arena
            if chain.len() > self.nodes.len() {
                return Err(DomainError::BranchCycle(branch_id));
            }
            chain.push(id);
            cursor = self.get(id)?.parent_id;
        }
        Ok(chain)
    }

    /// Branches the given branch may view and manage: itself, plus all descendants when it
    /// is a head branch
    pub fn resolve_scope(&self, branch_id: Uuid) -> DomainResult<BranchScope> {
        let branch = self.get(branch_id)?;
        let mut ids = BTreeSet::from([branch_id]);
        if branch.is_head() {
            ids.extend(self.descendants(branch_id)?.iter().copied());
        }
        Ok(BranchScope(ids))
    }

    /// Every branch, used for owners who oversee the whole dealership group
    pub fn full_scope(&self) -> BranchScope {
        BranchScope(self.nodes.iter().map(|b| b.id).collect())
    }

    /// Check that moving `branch_id` under `new_parent` keeps the hierarchy acyclic
    pub fn validate_reparent(&self, branch_id: Uuid, new_parent: Option<Uuid>) -> DomainResult<()> {
        self.get(branch_id)?;
        if let Some(parent_id) = new_parent {
            self.get(parent_id)?;
            if parent_id == branch_id || self.descendants(branch_id)?.contains(&parent_id) {
                return Err(DomainError::BranchCycle(branch_id));
            }
        }
        Ok(())
    }

    fn position(&self, branch_id: Uuid) -> DomainResult<usize> {
        self.index
            .get(&branch_id)
            .copied()
            .ok_or(DomainError::BranchNotFound(branch_id))
    }
}
